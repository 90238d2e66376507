use thiserror::Error;

use crate::habit::Habit;

#[derive(Debug, Error)]
#[error("missed-habit notice for `{habit}` not sent: {reason}")]
pub struct DispatchError {
    pub habit: String,
    pub reason: String,
}

/// Out-of-band reminder sent when the daily sweep finds a missed habit.
pub trait MissedHabitMailer: Send + Sync {
    fn send_missed_habit_notice(&self, habit: &Habit) -> Result<(), DispatchError>;
}

/// Stand-in mailer that only records the notice in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl MissedHabitMailer for LogMailer {
    fn send_missed_habit_notice(&self, habit: &Habit) -> Result<(), DispatchError> {
        tracing::info!(habit_id = %habit.id, title = %habit.title, "would send missed habit email");
        Ok(())
    }
}
