pub mod app_config;
pub mod config;
pub mod products;

pub use app_config::{
    AiSettings, AppConfig, AuthStyle, Environment, LinkEndpoints, SyncSettings, YouzanSettings,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{CatalogDocument, CatalogEntry, Product, ProductId, PLACEHOLDER_TITLE};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
