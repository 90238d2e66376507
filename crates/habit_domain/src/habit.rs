use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque identifier assigned to a habit when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HabitId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HabitFrequency {
    Daily,
    Weekly,
}

impl fmt::Display for HabitFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HabitFrequency::Daily => f.write_str("daily"),
            HabitFrequency::Weekly => f.write_str("weekly"),
        }
    }
}

/// A tracked habit as persisted in the storage snapshot.
///
/// `streak` and `longest_streak` are caches derived from `completed_dates`;
/// only the registry writes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub frequency: HabitFrequency,
    #[serde(default)]
    pub completed_dates: BTreeSet<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl Habit {
    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completed_dates.contains(&date)
    }

    /// Completion dates, most recent first.
    pub fn dates_by_recency(&self) -> impl Iterator<Item = &NaiveDate> {
        self.completed_dates.iter().rev()
    }

    pub(crate) fn set_streak(&mut self, streak: u32) {
        self.streak = streak;
        self.longest_streak = self.longest_streak.max(streak);
    }
}

/// Caller-supplied fields for a new habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitDraft {
    pub title: String,
    pub description: Option<String>,
    pub frequency: HabitFrequency,
}

impl HabitDraft {
    pub fn new(title: impl Into<String>, frequency: HabitFrequency) -> Self {
        Self {
            title: title.into(),
            description: None,
            frequency,
        }
    }

    pub fn daily(title: impl Into<String>) -> Self {
        Self::new(title, HabitFrequency::Daily)
    }

    pub fn weekly(title: impl Into<String>) -> Self {
        Self::new(title, HabitFrequency::Weekly)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        let trimmed = description.trim();
        self.description = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(())
    }

    pub(crate) fn into_habit(self, id: HabitId, now: DateTime<Utc>) -> Habit {
        Habit {
            id,
            title: self.title.trim().to_string(),
            description: self.description,
            frequency: self.frequency,
            completed_dates: BTreeSet::new(),
            created_at: now,
            streak: 0,
            longest_streak: 0,
            last_checked: Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn serializes_with_snapshot_field_names() {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let mut habit = HabitDraft::daily("  Read  ")
            .with_description("ten pages")
            .into_habit(HabitId::new("h-1"), created);
        habit.completed_dates.insert(date(2025, 3, 2));
        habit.completed_dates.insert(date(2025, 3, 1));

        let value = serde_json::to_value(&habit).unwrap();
        assert_eq!(value["id"], "h-1");
        assert_eq!(value["title"], "Read");
        assert_eq!(value["frequency"], "daily");
        assert_eq!(
            value["completedDates"],
            serde_json::json!(["2025-03-01", "2025-03-02"])
        );
        assert_eq!(value["createdAt"], "2025-03-01T08:30:00Z");
        assert_eq!(value["longestStreak"], 0);
        assert_eq!(value["lastChecked"], "2025-03-01T08:30:00Z");
    }

    #[test]
    fn parses_records_without_optional_fields() {
        let raw = r#"{
            "id": "abc",
            "title": "Stretch",
            "frequency": "weekly",
            "completedDates": ["2025-01-05", "2025-01-05"],
            "createdAt": "2025-01-01T00:00:00.000Z",
            "streak": 1,
            "longestStreak": 3
        }"#;
        let habit: Habit = serde_json::from_str(raw).unwrap();
        assert_eq!(habit.frequency, HabitFrequency::Weekly);
        assert_eq!(habit.completed_dates.len(), 1);
        assert!(habit.description.is_none());
        assert!(habit.last_checked.is_none());
    }

    #[test]
    fn blank_title_fails_validation() {
        assert_eq!(
            HabitDraft::daily("   ").validate(),
            Err(ValidationError::EmptyTitle)
        );
        assert!(HabitDraft::weekly("Run").validate().is_ok());
    }

    #[test]
    fn longest_streak_keeps_high_water_mark() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let mut habit = HabitDraft::daily("Walk").into_habit(HabitId::new("w"), now);
        habit.set_streak(4);
        habit.set_streak(1);
        assert_eq!(habit.streak, 1);
        assert_eq!(habit.longest_streak, 4);
    }

    #[test]
    fn dates_by_recency_is_descending() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let mut habit = HabitDraft::daily("Walk").into_habit(HabitId::new("w"), now);
        habit.completed_dates.insert(date(2025, 2, 1));
        habit.completed_dates.insert(date(2025, 2, 3));
        let ordered: Vec<_> = habit.dates_by_recency().copied().collect();
        assert_eq!(ordered, vec![date(2025, 2, 3), date(2025, 2, 1)]);
    }
}
