//! Persisted catalog file: atomic writes and the served-catalog fallback chain.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use brewpick_core::{CatalogDocument, CatalogEntry};

use crate::archive::write_atomic;
use crate::error::CatalogError;

/// Reason recorded when a write is refused because nothing survived filtering.
pub const NO_VALID_PRODUCTS: &str = "no valid products to write";

/// Catalog shipped with the binary, served until the first successful sync.
const BUNDLED_SAMPLE: &str = include_str!("../data/sample_catalog.json");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { count: usize },
    Skipped { reason: String },
}

/// Which source [`CatalogStore::load_served_catalog`] ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    Persisted,
    BundledSample,
    Empty,
}

/// The single catalog JSON file.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the catalog with `entries`.
    ///
    /// An empty list never overwrites the existing file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the directory or file cannot be
    /// written, or [`CatalogError::Serialize`] if serialization fails.
    pub async fn write(&self, entries: Vec<CatalogEntry>) -> Result<WriteOutcome, CatalogError> {
        if entries.is_empty() {
            tracing::warn!(path = %self.path.display(), "{NO_VALID_PRODUCTS}; keeping existing catalog");
            return Ok(WriteOutcome::Skipped {
                reason: NO_VALID_PRODUCTS.to_string(),
            });
        }

        let count = entries.len();
        let document = CatalogDocument { products: entries };
        let json = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CatalogError::io(parent, e))?;
        }
        write_atomic(&self.path, &json).await?;

        tracing::info!(path = %self.path.display(), count, "catalog written");
        Ok(WriteOutcome::Written { count })
    }

    /// Reads the persisted catalog, if present, parseable and non-empty.
    pub async fn load_persisted(&self) -> Option<CatalogDocument> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read catalog");
                return None;
            }
        };
        match serde_json::from_str::<CatalogDocument>(&raw) {
            Ok(mut document) => {
                let before = document.products.len();
                document
                    .products
                    .retain(|entry| !entry.image_url.trim().is_empty());
                let dropped = before - document.products.len();
                if dropped > 0 {
                    tracing::warn!(
                        path = %self.path.display(),
                        dropped,
                        "skipped catalog entries without imageUrl"
                    );
                }
                Some(document).filter(|doc| !doc.is_empty())
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "catalog file is not valid JSON");
                None
            }
        }
    }

    /// Catalog to serve: persisted, else bundled sample, else empty.
    pub async fn load_served_catalog(&self) -> (CatalogDocument, CatalogSource) {
        if let Some(document) = self.load_persisted().await {
            return (document, CatalogSource::Persisted);
        }
        match bundled_sample() {
            Some(sample) => (sample, CatalogSource::BundledSample),
            None => (CatalogDocument::default(), CatalogSource::Empty),
        }
    }

    /// Modification time of the catalog file, if it exists.
    pub async fn last_modified(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .ok()
    }
}

fn bundled_sample() -> Option<CatalogDocument> {
    serde_json::from_str::<CatalogDocument>(BUNDLED_SAMPLE)
        .ok()
        .filter(|doc| !doc.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_sample_parses_and_is_not_empty() {
        let sample = bundled_sample().expect("bundled sample should parse");
        assert!(sample
            .products
            .iter()
            .all(|p| !p.image_url.is_empty() && !p.title.is_empty()));
    }
}
