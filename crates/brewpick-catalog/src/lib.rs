pub mod archive;
pub mod error;
pub mod filename;
pub mod store;

pub use archive::{ArchiveOutcome, ImageArchiver};
pub use error::CatalogError;
pub use filename::{archive_filename, infer_extension, sanitize_filename};
pub use store::{CatalogSource, CatalogStore, WriteOutcome, NO_VALID_PRODUCTS};
