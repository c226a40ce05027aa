//! Settings for the three backflow services
//!
//! One document carries a section per service plus shared telemetry
//! settings. It can come from TOML, YAML or JSON, every field has a default
//! at the reference sizing, and `BACKFLOW__SECTION__KEY` environment
//! variables override file values. [`validate_config`] reports every bad
//! field at once.

mod config;
mod loader;
mod validation;

pub use config::*;
pub use loader::*;
pub use validation::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot load configuration: {0}")]
    LoadError(String),

    #[error("invalid configuration: {0}")]
    ValidationError(String),

    #[error("cannot read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("cannot merge configuration sources: {0}")]
    ConfigLibError(#[from] ::config::ConfigError),

    #[error("malformed TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("malformed YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("malformed JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
