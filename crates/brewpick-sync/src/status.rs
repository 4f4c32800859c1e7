use chrono::{DateTime, Utc};
use serde::Serialize;

/// Process-lifetime record of the most recent sync runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub in_progress: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_count: usize,
}

/// Result of one [`crate::SyncService::run`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Written { count: usize },
    Skipped { reason: String },
    /// Another run held the guard; nothing was done.
    AlreadyRunning,
}
