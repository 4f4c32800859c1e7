use brewpick_catalog::CatalogError;
use brewpick_youzan::YouzanError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Youzan(#[from] YouzanError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl SyncError {
    /// Only upstream auth, listing and network failures are worth retrying.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            SyncError::Youzan(e) => e.is_retriable(),
            SyncError::Catalog(_) => false,
        }
    }
}
