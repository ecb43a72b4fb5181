use thiserror::Error;

pub mod app_config;
pub mod categories;
pub mod config;
pub mod product;
pub mod source;

pub use app_config::AppConfig;
pub use categories::{flatten_category_export, CategoryExport, FlatCategory};
pub use config::{load_app_config, load_app_config_from_env};
pub use product::{
    Availability, NormalizedColor, NormalizedImage, NormalizedProduct, NormalizedSize,
    NormalizedStock,
};
pub use source::Source;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
