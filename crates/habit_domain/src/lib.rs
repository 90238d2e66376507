pub mod clock;
pub mod error;
pub mod habit;
pub mod ids;
pub mod mailer;
pub mod notifications;
pub mod service;
pub mod storage;
pub mod streak;

pub use crate::error::{RegistryError, ValidationError};
pub use crate::habit::{Habit, HabitDraft, HabitFrequency, HabitId};
pub use crate::notifications::{NotificationCenter, NotificationKind, NotificationSink};
pub use crate::service::{HabitRegistry, HabitRegistryBuilder, SweepReport, ToggleOutcome};
