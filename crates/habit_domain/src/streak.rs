//! Streak derivation from a set of completion dates.
//!
//! Daily habits count consecutive calendar days ending today, or yesterday
//! when today is not yet done. Weekly habits count completions that each sit
//! within seven days of the previously counted one, starting from today.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

use crate::habit::HabitFrequency;

/// Largest gap in days between two counted completions of a weekly habit.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

pub fn compute_streak(
    completed: &BTreeSet<NaiveDate>,
    frequency: HabitFrequency,
    today: NaiveDate,
) -> u32 {
    if completed.is_empty() {
        return 0;
    }
    match frequency {
        HabitFrequency::Daily => daily_streak(completed, today),
        HabitFrequency::Weekly => weekly_streak(completed, today),
    }
}

fn daily_streak(completed: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let anchor = if completed.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if completed.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    let mut cursor = Some(anchor);
    while let Some(day) = cursor {
        if !completed.contains(&day) {
            break;
        }
        streak += 1;
        cursor = day.checked_sub_days(Days::new(1));
    }
    streak
}

fn weekly_streak(completed: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut previous = today;
    for date in completed.iter().rev() {
        let gap = (previous - *date).num_days().abs();
        if gap > WEEKLY_WINDOW_DAYS {
            break;
        }
        streak += 1;
        previous = *date;
    }
    streak
}
