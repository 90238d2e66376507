use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use habit_domain::{
    notifications::DEFAULT_DURATION,
    storage::{FileStore, HABITS_KEY},
    HabitDraft, HabitFrequency, HabitId, HabitRegistry, NotificationCenter,
};
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) notification_duration: Duration,
    pub(crate) storage_key: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup("HABIT_DATA_DIR") {
            let dir = dir.trim();
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Some(ms) = lookup("HABIT_NOTIFICATION_MS") {
            if let Ok(value) = ms.trim().parse::<u64>() {
                config.notification_duration = Duration::from_millis(value);
            }
        }
        if let Some(key) = lookup("HABIT_STORAGE_KEY") {
            let key = key.trim();
            if !key.is_empty() {
                config.storage_key = key.to_string();
            }
        }
        debug!(?config, "resolved configuration");
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("habit-data"),
            notification_duration: DEFAULT_DURATION,
            storage_key: HABITS_KEY.to_string(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "habit_tracker", version, about = "Track daily and weekly habits")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List habits with their current streaks
    List {
        #[arg(long, value_enum)]
        frequency: Option<FrequencyArg>,
    },
    /// Create a habit
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        weekly: bool,
    },
    /// Mark a day done, or undo it if it already is
    Toggle {
        id: String,
        /// Calendar date as YYYY-MM-DD; defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Delete {
        id: String,
    },
    /// Show what today's missed-habit check flagged
    Sweep,
    /// Show totals and the seven-day completion rate
    Stats,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    Daily,
    Weekly,
}

impl From<FrequencyArg> for HabitFrequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Daily => HabitFrequency::Daily,
            FrequencyArg::Weekly => HabitFrequency::Weekly,
        }
    }
}

pub fn run(config: AppConfig, cli: Cli) -> Result<()> {
    info!(data_dir = %config.data_dir.display(), "opening habit store");
    let center = NotificationCenter::with_default_duration(config.notification_duration);
    let mut registry = HabitRegistry::builder()
        .with_store(Arc::new(FileStore::new(&config.data_dir)))
        .with_storage_key(config.storage_key.clone())
        .with_notification_center(center.clone())
        .build();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&mut registry, cli.command, &mut out)?;
    print_notifications(&center, &mut out)?;
    Ok(())
}

pub fn execute(
    registry: &mut HabitRegistry,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::List { frequency } => {
            let habits = match frequency {
                Some(frequency) => registry.habits_by_frequency(frequency.into()),
                None => registry.habits().iter().collect(),
            };
            if habits.is_empty() {
                writeln!(out, "No habits yet.")?;
            }
            for habit in habits {
                writeln!(
                    out,
                    "{}  {} [{}] streak {} (best {})",
                    habit.id, habit.title, habit.frequency, habit.streak, habit.longest_streak
                )?;
            }
        }
        Command::Add {
            title,
            description,
            weekly,
        } => {
            let frequency = if weekly {
                HabitFrequency::Weekly
            } else {
                HabitFrequency::Daily
            };
            let mut draft = HabitDraft::new(title, frequency);
            if let Some(description) = description {
                draft = draft.with_description(description);
            }
            let id = registry.create(draft)?;
            writeln!(out, "Created habit {id}")?;
        }
        Command::Toggle { id, date } => {
            let id = HabitId::new(id);
            let toggled = registry
                .toggle_completion(&id, date)
                .with_context(|| format!("failed to toggle habit {id}"))?;
            match toggled {
                Some(outcome) => {
                    let state = if outcome.completed {
                        "complete"
                    } else {
                        "incomplete"
                    };
                    writeln!(
                        out,
                        "Marked {} {state} (streak {})",
                        outcome.date, outcome.streak
                    )?;
                }
                None => writeln!(out, "No habit with id {id}")?,
            }
        }
        Command::Delete { id } => {
            let id = HabitId::new(id);
            let deleted = registry
                .delete(&id)
                .with_context(|| format!("failed to delete habit {id}"))?;
            if deleted {
                writeln!(out, "Deleted {id}")?;
            } else {
                writeln!(out, "No habit with id {id}")?;
            }
        }
        Command::Sweep => {
            // The check already ran while the registry was built.
            let report = registry.last_sweep();
            writeln!(out, "{} missed habit(s) flagged", report.flagged.len())?;
            for failed in &report.dispatch_failures {
                writeln!(out, "reminder for {failed} could not be sent")?;
            }
        }
        Command::Stats => {
            let daily = registry.daily_habits().len();
            let weekly = registry.weekly_habits().len();
            writeln!(
                out,
                "Habits: {} ({daily} daily, {weekly} weekly)",
                daily + weekly
            )?;
            writeln!(
                out,
                "Completion rate (7 days): {}%",
                registry.completion_rate()
            )?;
        }
    }
    Ok(())
}

fn print_notifications(center: &NotificationCenter, out: &mut impl Write) -> io::Result<()> {
    for notification in center.notifications() {
        writeln!(
            out,
            "[{:?}] {}: {}",
            notification.kind, notification.title, notification.message
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use habit_domain::storage::MemoryStore;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn output_of(registry: &mut HabitRegistry, command: Command) -> String {
        let mut buffer = Vec::new();
        execute(registry, command, &mut buffer).expect("command runs");
        String::from_utf8(buffer).unwrap()
    }

    fn registry() -> (HabitRegistry, NotificationCenter) {
        let center = NotificationCenter::with_default_duration(Duration::ZERO);
        let registry = HabitRegistry::builder()
            .with_store(Arc::new(MemoryStore::new()))
            .with_notification_center(center.clone())
            .build();
        (registry, center)
    }

    #[test]
    fn config_defaults_without_env() {
        let config = AppConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.data_dir, PathBuf::from("habit-data"));
        assert_eq!(config.notification_duration, Duration::from_millis(5000));
        assert_eq!(config.storage_key, "habits");
    }

    #[test]
    fn config_reads_overrides_and_ignores_garbage() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("HABIT_DATA_DIR", "/tmp/habits"),
            ("HABIT_NOTIFICATION_MS", "not-a-number"),
            ("HABIT_STORAGE_KEY", "  mine "),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/habits"));
        assert_eq!(config.notification_duration, DEFAULT_DURATION);
        assert_eq!(config.storage_key, "mine");

        let config = AppConfig::from_lookup(lookup_from(&[("HABIT_NOTIFICATION_MS", "0")]));
        assert_eq!(config.notification_duration, Duration::ZERO);
    }

    #[test]
    fn cli_parses_toggle_with_date() {
        let cli = Cli::try_parse_from(["habit_tracker", "toggle", "abc", "--date", "2025-02-03"])
            .unwrap();
        match cli.command {
            Command::Toggle { id, date } => {
                assert_eq!(id, "abc");
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 3));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["habit_tracker", "toggle", "abc", "--date", "soon"]).is_err());
    }

    #[test]
    fn add_toggle_list_and_stats() {
        let (mut registry, center) = registry();
        let created = output_of(
            &mut registry,
            Command::Add {
                title: "Read".into(),
                description: None,
                weekly: false,
            },
        );
        let id = created.trim().trim_start_matches("Created habit ").to_string();

        let toggled = output_of(&mut registry, Command::Toggle { id: id.clone(), date: None });
        assert!(toggled.contains("complete (streak 1)"));

        let listed = output_of(&mut registry, Command::List { frequency: None });
        assert!(listed.contains("Read [daily] streak 1 (best 1)"));
        let weekly = output_of(
            &mut registry,
            Command::List {
                frequency: Some(FrequencyArg::Weekly),
            },
        );
        assert_eq!(weekly, "No habits yet.\n");

        let stats = output_of(&mut registry, Command::Stats);
        assert!(stats.contains("Habits: 1 (1 daily, 0 weekly)"));
        assert!(stats.contains("Completion rate (7 days): 14%"));

        let mut rendered = Vec::new();
        print_notifications(&center, &mut rendered).unwrap();
        let rendered = String::from_utf8(rendered).unwrap();
        assert!(rendered.contains("[Success] Success: Habit created successfully!"));
    }

    #[test]
    fn unknown_ids_are_reported_not_errors() {
        let (mut registry, _center) = registry();
        let toggled = output_of(
            &mut registry,
            Command::Toggle {
                id: "ghost".into(),
                date: None,
            },
        );
        assert_eq!(toggled, "No habit with id ghost\n");
        let deleted = output_of(&mut registry, Command::Delete { id: "ghost".into() });
        assert_eq!(deleted, "No habit with id ghost\n");
    }

    #[test]
    fn sweep_reports_flagged_count() {
        let (mut registry, _center) = registry();
        let swept = output_of(&mut registry, Command::Sweep);
        assert_eq!(swept, "0 missed habit(s) flagged\n");
    }

    #[test]
    fn sweep_prints_what_startup_flagged() {
        let snapshot = r#"[{"id": "h-1", "title": "Journal", "frequency": "daily",
            "completedDates": [], "createdAt": "2020-01-01T08:00:00Z",
            "streak": 0, "longestStreak": 0, "lastChecked": "2020-01-01T08:00:00Z"}]"#;
        let center = NotificationCenter::with_default_duration(Duration::ZERO);
        let mut registry = HabitRegistry::builder()
            .with_store(Arc::new(MemoryStore::with_entry(HABITS_KEY, snapshot)))
            .with_notification_center(center.clone())
            .build();

        let swept = output_of(&mut registry, Command::Sweep);
        assert_eq!(swept, "1 missed habit(s) flagged\n");
        assert_eq!(center.len(), 1);
    }

    #[test]
    fn empty_title_is_an_error() {
        let (mut registry, _center) = registry();
        let mut buffer = Vec::new();
        let err = execute(
            &mut registry,
            Command::Add {
                title: " ".into(),
                description: None,
                weekly: true,
            },
            &mut buffer,
        )
        .unwrap_err();
        assert!(err.to_string().contains("title"));
        assert!(buffer.is_empty());
    }
}
