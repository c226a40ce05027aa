//! Configuration loading from multiple sources

use crate::{ConfigError, PipelineConfig, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;

/// Default prefix for environment overrides
pub const ENV_PREFIX: &str = "BACKFLOW";

/// Separator between prefix, section and key in environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Supports TOML, YAML, and JSON formats based on file extension
    pub fn from_file(path: &Path) -> Result<PipelineConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let content = std::fs::read_to_string(path)?;

        match extension {
            "toml" => Self::from_toml(&content),
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}",
                extension
            ))),
        }
    }

    pub fn from_toml(content: &str) -> Result<PipelineConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_yaml(content: &str) -> Result<PipelineConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<PipelineConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from environment variables, falling back to defaults
    ///
    /// Uses the default prefix `BACKFLOW`
    pub fn from_env() -> Result<PipelineConfig> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load configuration from environment variables with custom prefix
    ///
    /// Variables look like `PREFIX__SECTION__KEY`, for example
    /// `BACKFLOW__SERVICE_B__FAULT_PROBABILITY=0`
    pub fn from_env_with_prefix(prefix: &str) -> Result<PipelineConfig> {
        Self::builder().add_env(prefix).build()
    }

    /// Load a file, then overlay environment variables with the given prefix
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<PipelineConfig> {
        if !path.exists() {
            return Err(ConfigError::LoadError(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        Self::builder().add_file(path, true).add_env(env_prefix).build()
    }

    /// Build configuration using the config crate's builder pattern
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }
}

/// Builder for layered configuration loading
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Add a configuration file source
    pub fn add_file(mut self, path: &Path, required: bool) -> Self {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };

        self.builder = self
            .builder
            .add_source(File::from(path).format(format).required(required));
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix(prefix)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );
        self
    }

    /// Set a default value for a dotted key such as `service_a.queue_capacity`
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    /// Override a dotted key regardless of other sources
    pub fn set_override(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let config = self.builder.build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogFormat;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
            [telemetry]
            log_level = "debug"
            log_format = "json"

            [service_a]
            listen_addr = "127.0.0.1:9000"
            service_b_url = "http://localhost:9001"
            queue_capacity = 8

            [service_a.retry]
            max_retries = 3
            max_delay_ms = 10000

            [service_b]
            token_limit = 10
            fault_probability = 0.0

            [service_c]
            work_delay_ms = 50
        "#;

        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(config.service_a.queue_capacity, 8);
        assert_eq!(config.service_a.retry.max_retries, 3);
        assert_eq!(config.service_a.retry.max_delay_ms, Some(10_000));
        assert_eq!(config.service_b.token_limit, 10);
        assert_eq!(config.service_b.fault_probability, 0.0);
        assert_eq!(config.service_c.work_delay_ms, 50);

        // Unspecified fields keep their defaults
        assert_eq!(config.service_a.webhook_permits, 5);
        assert_eq!(config.service_b.replenishment_period_ms, 2000);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ConfigLoader::from_toml("").unwrap(), PipelineConfig::default());
        assert_eq!(ConfigLoader::from_json("{}").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
service_a:
  webhook_permits: 2
  webhook_queue_limit: 4
service_b:
  tokens_per_period: 2
"#;

        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.service_a.webhook_permits, 2);
        assert_eq!(config.service_a.webhook_queue_limit, 4);
        assert_eq!(config.service_b.tokens_per_period, 2);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{ "service_c": { "service_a_url": "http://a:8080", "work_delay_ms": 0 } }"#;

        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.service_c.service_a_url, "http://a:8080");
        assert_eq!(config.service_c.work_delay_ms, 0);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[service_a]\nqueue_capacity = 3").unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.service_a.queue_capacity, 3);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            ConfigLoader::from_file(file.path()),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[service_b]\ntoken_limit = 7\nfault_probability = 0.5").unwrap();

        std::env::set_var("BACKFLOW_LOADER_TEST__SERVICE_B__FAULT_PROBABILITY", "0");
        let config = ConfigLoader::from_file_with_env(file.path(), "BACKFLOW_LOADER_TEST").unwrap();
        std::env::remove_var("BACKFLOW_LOADER_TEST__SERVICE_B__FAULT_PROBABILITY");

        assert_eq!(config.service_b.token_limit, 7);
        assert_eq!(config.service_b.fault_probability, 0.0);
    }

    #[test]
    fn test_builder_defaults_and_overrides() {
        let config = ConfigLoader::builder()
            .set_default("service_a.queue_capacity", "9")
            .unwrap()
            .set_override("service_c.work_delay_ms", "1")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.service_a.queue_capacity, 9);
        assert_eq!(config.service_c.work_delay_ms, 1);
    }

    #[test]
    fn test_missing_file_with_env() {
        let result = ConfigLoader::from_file_with_env(Path::new("/nonexistent/backflow.toml"), ENV_PREFIX);
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
