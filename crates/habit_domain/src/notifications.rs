//! Transient user-facing messages with optional auto-dismiss.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use uuid::Uuid;

pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn default_title(self) -> &'static str {
        match self {
            NotificationKind::Info => "Info",
            NotificationKind::Success => "Success",
            NotificationKind::Warning => "Warning",
            NotificationKind::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Milliseconds before auto-dismiss; `0` stays until dismissed.
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub duration: Option<Duration>,
}

impl NotificationRequest {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

pub trait NotificationSink: Send + Sync {
    fn push(&self, request: NotificationRequest) -> NotificationId;

    fn success(&self, message: &str, title: Option<&str>) -> NotificationId {
        self.push(typed(NotificationKind::Success, message, title))
    }

    fn error(&self, message: &str, title: Option<&str>) -> NotificationId {
        self.push(typed(NotificationKind::Error, message, title))
    }

    fn warning(&self, message: &str, title: Option<&str>) -> NotificationId {
        self.push(typed(NotificationKind::Warning, message, title))
    }

    fn info(&self, message: &str, title: Option<&str>) -> NotificationId {
        self.push(typed(NotificationKind::Info, message, title))
    }
}

fn typed(kind: NotificationKind, message: &str, title: Option<&str>) -> NotificationRequest {
    NotificationRequest::new(kind, title.unwrap_or(kind.default_title()), message)
}

/// Cloning yields another handle to the same queue. Outside a tokio runtime,
/// expired entries are dropped whenever the queue is read.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

struct Inner {
    default_duration: Duration,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    entries: Vec<Entry>,
    timers: HashMap<NotificationId, AbortHandle>,
}

struct Entry {
    notification: Notification,
    expires_at: Option<Instant>,
}

impl QueueState {
    fn prune(&mut self, now: Instant) {
        let timers = &mut self.timers;
        self.entries.retain(|entry| match entry.expires_at {
            Some(deadline) if deadline <= now => {
                if let Some(timer) = timers.remove(&entry.notification.id) {
                    timer.abort();
                }
                false
            }
            _ => true,
        });
    }

    fn remove(&mut self, id: &NotificationId) -> bool {
        let Some(idx) = self
            .entries
            .iter()
            .position(|entry| &entry.notification.id == id)
        else {
            return false;
        };
        self.entries.remove(idx);
        true
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("default_duration", &self.inner.default_duration)
            .field("len", &self.inner.state.lock().entries.len())
            .finish()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::with_default_duration(DEFAULT_DURATION)
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                default_duration,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    pub fn default_duration(&self) -> Duration {
        self.inner.default_duration
    }

    pub fn enqueue(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        duration: Option<Duration>,
    ) -> NotificationId {
        let mut request = NotificationRequest::new(kind, title, message);
        request.duration = duration;
        self.push(request)
    }

    pub fn dismiss(&self, id: &NotificationId) -> bool {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.timers.remove(id) {
            timer.abort();
        }
        let removed = state.remove(id);
        if removed {
            tracing::debug!(%id, "notification dismissed");
        }
        removed
    }

    pub fn notifications(&self) -> Vec<Notification> {
        let mut state = self.inner.state.lock();
        state.prune(Instant::now());
        state
            .entries
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.prune(Instant::now());
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expire(inner: &Inner, id: &NotificationId) {
        let mut state = inner.state.lock();
        state.timers.remove(id);
        if state.remove(id) {
            tracing::debug!(%id, "notification expired");
        }
    }

    fn schedule_expiry(&self, id: NotificationId, deadline: Instant) -> Option<AbortHandle> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = inner.upgrade() {
                NotificationCenter::expire(&inner, &id);
            }
        });
        Some(task.abort_handle())
    }
}

impl NotificationSink for NotificationCenter {
    fn push(&self, request: NotificationRequest) -> NotificationId {
        let duration = request.duration.unwrap_or(self.inner.default_duration);
        let id = NotificationId::fresh();
        let now = Instant::now();
        let expires_at = (!duration.is_zero()).then(|| now + duration);
        let notification = Notification {
            id: id.clone(),
            kind: request.kind,
            title: request.title,
            message: request.message,
            duration: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        };

        // The timer is registered under the lock so an early expiry cannot
        // run before its handle is recorded.
        let mut state = self.inner.state.lock();
        state.prune(now);
        state.entries.push(Entry {
            notification,
            expires_at,
        });
        if let Some(deadline) = expires_at {
            if let Some(timer) = self.schedule_expiry(id.clone(), deadline) {
                state.timers.insert(id.clone(), timer);
            }
        }
        tracing::debug!(%id, kind = ?request.kind, ?duration, "notification queued");
        id
    }
}
