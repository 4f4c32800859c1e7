pub mod error;
pub mod events;
mod retry;
pub mod service;
pub mod status;

pub use error::SyncError;
pub use events::SyncEvent;
pub use service::{SyncService, EMPTY_UPSTREAM_ERROR, EMPTY_UPSTREAM_REASON};
pub use status::{SyncOutcome, SyncStatus};
