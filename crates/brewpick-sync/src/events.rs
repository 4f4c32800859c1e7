use chrono::{DateTime, Utc};
use serde::Serialize;

/// Broadcast after every sync run that reaches an end state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SyncEvent {
    Complete {
        count: usize,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        at: DateTime<Utc>,
    },
    Error {
        error: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        at: DateTime<Utc>,
    },
}

impl SyncEvent {
    /// Event name as sent on the event stream.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::Complete { .. } => "sync-complete",
            SyncEvent::Error { .. } => "sync-error",
        }
    }
}
