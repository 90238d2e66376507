use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::instrument;

use crate::{
    clock::{Clock, SystemClock},
    error::{RegistryError, Result},
    habit::{Habit, HabitDraft, HabitFrequency, HabitId},
    ids::{IdGenerator, UuidIds},
    mailer::{LogMailer, MissedHabitMailer},
    notifications::{NotificationCenter, NotificationSink},
    storage::{KeyValueStore, MemoryStore, StorageError, HABITS_KEY},
    streak::compute_streak,
};

pub const MILESTONE_INTERVAL: u32 = 7;

pub const COMPLETION_WINDOW_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub habit_id: HabitId,
    pub date: NaiveDate,
    pub completed: bool,
    pub streak: u32,
    pub milestone: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub flagged: Vec<HabitId>,
    pub dispatch_failures: Vec<HabitId>,
}

/// Owns the habit collection and is its only writer.
pub struct HabitRegistry {
    habits: Vec<Habit>,
    last_sweep: SweepReport,
    storage_key: String,
    store: Arc<dyn KeyValueStore>,
    notifications: Arc<dyn NotificationSink>,
    mailer: Arc<dyn MissedHabitMailer>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

pub struct HabitRegistryBuilder {
    storage_key: String,
    store: Arc<dyn KeyValueStore>,
    notifications: Arc<dyn NotificationSink>,
    mailer: Arc<dyn MissedHabitMailer>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl HabitRegistryBuilder {
    pub fn new() -> Self {
        Self {
            storage_key: HABITS_KEY.to_string(),
            store: Arc::new(MemoryStore::new()),
            notifications: Arc::new(NotificationCenter::new()),
            mailer: Arc::new(LogMailer),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidIds),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = sink;
        self
    }

    pub fn with_notification_center(self, center: NotificationCenter) -> Self {
        self.with_notifications(Arc::new(center))
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn MissedHabitMailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// A failed save during the startup sweep is logged and queued as an
    /// error notice; the loaded habits are kept either way.
    pub fn build(self) -> HabitRegistry {
        let mut registry = HabitRegistry {
            habits: Vec::new(),
            last_sweep: SweepReport::default(),
            storage_key: self.storage_key,
            store: self.store,
            notifications: self.notifications,
            mailer: self.mailer,
            clock: self.clock,
            ids: self.ids,
        };
        if let Err(err) = registry.initialize() {
            tracing::warn!(%err, "startup sweep not saved, continuing with loaded habits");
        }
        registry
    }
}

impl Default for HabitRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitRegistry {
    pub fn builder() -> HabitRegistryBuilder {
        HabitRegistryBuilder::new()
    }

    #[instrument(skip(self), fields(key = %self.storage_key))]
    pub fn initialize(&mut self) -> Result<SweepReport> {
        self.habits = self.load_snapshot();
        tracing::info!(habits = self.habits.len(), "habit registry loaded");
        self.sweep()
    }

    pub fn sweep(&mut self) -> Result<SweepReport> {
        let now = self.clock.now();
        self.check_missed_habits(now)
    }

    #[instrument(skip(self, draft), fields(title = %draft.title, frequency = %draft.frequency))]
    pub fn create(&mut self, draft: HabitDraft) -> Result<HabitId> {
        draft.validate()?;
        let id = self.unused_id()?;
        let habit = draft.into_habit(id.clone(), self.clock.now());
        self.habits.push(habit);
        if let Err(source) = self.save() {
            tracing::warn!(habit_id = %id, err = %source, "created habit not saved");
            self.notifications.error("Failed to create habit", None);
            return Err(RegistryError::CreatedUnsaved { id, source });
        }
        tracing::info!(habit_id = %id, "habit created");
        self.notifications.success("Habit created successfully!", None);
        Ok(id)
    }

    /// Unknown ids are a no-op and return `Ok(None)`.
    #[instrument(skip(self))]
    pub fn toggle_completion(
        &mut self,
        habit_id: &HabitId,
        date: Option<NaiveDate>,
    ) -> Result<Option<ToggleOutcome>> {
        let today = self.clock.today();
        let date = date.unwrap_or(today);
        let Some(habit) = self.habits.iter_mut().find(|habit| &habit.id == habit_id) else {
            tracing::debug!(%habit_id, "toggle ignored for unknown habit");
            return Ok(None);
        };

        let completed = if habit.completed_dates.remove(&date) {
            false
        } else {
            habit.completed_dates.insert(date);
            true
        };
        let streak = compute_streak(&habit.completed_dates, habit.frequency, today);
        habit.set_streak(streak);
        let outcome = ToggleOutcome {
            habit_id: habit.id.clone(),
            date,
            completed,
            streak,
            milestone: completed && streak > 0 && streak % MILESTONE_INTERVAL == 0,
        };
        let unit = match habit.frequency {
            HabitFrequency::Daily => "day",
            HabitFrequency::Weekly => "week",
        };
        tracing::debug!(%habit_id, %date, completed, streak, "completion toggled");

        self.persist()?;

        if !outcome.completed {
            self.notifications.info("Habit marked as incomplete", None);
        } else {
            self.notifications.success("Habit completed! Keep it up!", None);
            if outcome.milestone {
                self.notifications.success(
                    &format!("{streak} {unit} streak! Amazing work!"),
                    Some("Streak Achievement"),
                );
            }
        }
        Ok(Some(outcome))
    }

    pub fn toggle_completion_at(
        &mut self,
        habit_id: &HabitId,
        at: DateTime<Utc>,
    ) -> Result<Option<ToggleOutcome>> {
        let date = self.clock.date_of(at);
        self.toggle_completion(habit_id, Some(date))
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, habit_id: &HabitId) -> Result<bool> {
        let Some(idx) = self.habits.iter().position(|habit| &habit.id == habit_id) else {
            return Ok(false);
        };
        let removed = self.habits.remove(idx);
        self.persist()?;
        tracing::info!(%habit_id, title = %removed.title, "habit deleted");
        self.notifications.success("Habit deleted successfully", None);
        Ok(true)
    }

    #[instrument(skip(self))]
    pub fn check_missed_habits(&mut self, now: DateTime<Utc>) -> Result<SweepReport> {
        let today = self.clock.date_of(now);
        let yesterday = today.pred_opt();
        let mut report = SweepReport::default();

        for habit in self.habits.iter_mut() {
            let missed = habit.frequency == HabitFrequency::Daily
                && yesterday.is_some_and(|day| !habit.is_completed_on(day));
            let checked_today = habit
                .last_checked
                .is_some_and(|at| self.clock.date_of(at) == today);

            if missed && !checked_today {
                self.notifications.warning(
                    &format!("You missed your habit: {}", habit.title),
                    Some("Missed Habit"),
                );
                report.flagged.push(habit.id.clone());
                if let Err(err) = self.mailer.send_missed_habit_notice(habit) {
                    tracing::warn!(habit_id = %habit.id, %err, "missed habit notice failed");
                    report.dispatch_failures.push(habit.id.clone());
                }
            }

            habit.set_streak(compute_streak(&habit.completed_dates, habit.frequency, today));
            habit.last_checked = Some(now);
        }

        tracing::info!(
            %today,
            flagged = report.flagged.len(),
            failures = report.dispatch_failures.len(),
            "missed habit sweep finished"
        );
        self.last_sweep = report.clone();
        self.persist()?;
        Ok(report)
    }

    pub fn last_sweep(&self) -> &SweepReport {
        &self.last_sweep
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn get(&self, habit_id: &HabitId) -> Option<&Habit> {
        self.habits.iter().find(|habit| &habit.id == habit_id)
    }

    pub fn habits_by_frequency(&self, frequency: HabitFrequency) -> Vec<&Habit> {
        self.habits
            .iter()
            .filter(|habit| habit.frequency == frequency)
            .collect()
    }

    pub fn daily_habits(&self) -> Vec<&Habit> {
        self.habits_by_frequency(HabitFrequency::Daily)
    }

    pub fn weekly_habits(&self) -> Vec<&Habit> {
        self.habits_by_frequency(HabitFrequency::Weekly)
    }

    pub fn completion_rate(&self) -> u32 {
        self.completion_rate_on(self.clock.today())
    }

    /// Daily habits can score seven times in the window, weekly habits once.
    pub fn completion_rate_on(&self, today: NaiveDate) -> u32 {
        let daily = self.daily_habits().len() as u64;
        let weekly = self.weekly_habits().len() as u64;
        let possible = COMPLETION_WINDOW_DAYS * daily + weekly;
        if possible == 0 {
            return 0;
        }

        let start = today
            .checked_sub_days(Days::new(COMPLETION_WINDOW_DAYS - 1))
            .unwrap_or(NaiveDate::MIN);
        let completed: u64 = self
            .habits
            .iter()
            .map(|habit| habit.completed_dates.range(start..=today).count() as u64)
            .sum();
        (100.0 * completed as f64 / possible as f64).round() as u32
    }
}

impl HabitRegistry {
    fn unused_id(&self) -> Result<HabitId> {
        let attempts = self.habits.len() + 1;
        for _ in 0..attempts {
            let id = HabitId::new(self.ids.next_id());
            if self.get(&id).is_none() {
                return Ok(id);
            }
            tracing::debug!(habit_id = %id, "generated id already taken");
        }
        Err(RegistryError::IdsExhausted { attempts })
    }

    fn load_snapshot(&self) -> Vec<Habit> {
        let raw = match self.store.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(%err, "unable to read habit snapshot, starting empty");
                return Vec::new();
            }
        };

        let habits: Vec<Habit> = match serde_json::from_str(&raw) {
            Ok(habits) => habits,
            Err(err) => {
                tracing::warn!(%err, "discarding corrupt habit snapshot");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        habits
            .into_iter()
            .filter(|habit| {
                let fresh = seen.insert(habit.id.clone());
                if !fresh {
                    tracing::warn!(habit_id = %habit.id, "dropping duplicate habit record");
                }
                fresh
            })
            .collect()
    }

    fn save(&self) -> std::result::Result<(), StorageError> {
        let payload = serde_json::to_string(&self.habits)?;
        self.store.set(&self.storage_key, &payload)
    }

    fn persist(&self) -> Result<()> {
        if let Err(err) = self.save() {
            tracing::warn!(%err, key = %self.storage_key, "habit snapshot not saved");
            self.notifications.error("Failed to save changes", None);
            return Err(RegistryError::Storage(err));
        }
        Ok(())
    }
}
