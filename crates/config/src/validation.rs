//! Configuration validation

use crate::{ConfigError, PipelineConfig, Result, RetryConfig};
use std::net::SocketAddr;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire pipeline configuration, reporting every problem at once
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_log_level(&config.telemetry.log_level) {
        errors.push(e);
    }

    // Service A
    let a = &config.service_a;
    check_listen_addr(&mut errors, "service_a.listen_addr", &a.listen_addr);
    check_url(&mut errors, "service_a.service_b_url", &a.service_b_url);
    check_positive(&mut errors, "service_a.queue_capacity", a.queue_capacity as u64);
    check_positive(&mut errors, "service_a.webhook_permits", a.webhook_permits as u64);
    check_positive(&mut errors, "service_a.request_timeout_ms", a.request_timeout_ms);
    validate_retry(&mut errors, &a.retry);

    // Service B
    let b = &config.service_b;
    check_listen_addr(&mut errors, "service_b.listen_addr", &b.listen_addr);
    check_url(&mut errors, "service_b.service_c_url", &b.service_c_url);
    check_positive(&mut errors, "service_b.token_limit", b.token_limit as u64);
    check_positive(&mut errors, "service_b.tokens_per_period", b.tokens_per_period as u64);
    check_positive(
        &mut errors,
        "service_b.replenishment_period_ms",
        b.replenishment_period_ms,
    );
    check_positive(&mut errors, "service_b.request_timeout_ms", b.request_timeout_ms);

    if b.tokens_per_period > b.token_limit {
        errors.push(ValidationError::new(
            "service_b.tokens_per_period",
            "must not exceed token_limit",
        ));
    }

    if !(0.0..=1.0).contains(&b.fault_probability) {
        errors.push(ValidationError::new(
            "service_b.fault_probability",
            "must be between 0 and 1",
        ));
    }

    // Service C
    let c = &config.service_c;
    check_listen_addr(&mut errors, "service_c.listen_addr", &c.listen_addr);
    check_url(&mut errors, "service_c.service_a_url", &c.service_a_url);
    check_positive(&mut errors, "service_c.request_timeout_ms", c.request_timeout_ms);

    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

fn validate_retry(errors: &mut Vec<ValidationError>, retry: &RetryConfig) {
    check_positive(errors, "service_a.retry.base_delay_ms", retry.base_delay_ms);

    if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
        errors.push(ValidationError::new(
            "service_a.retry.multiplier",
            "must be at least 1",
        ));
    }

    if let Some(max) = retry.max_delay_ms {
        if max < retry.base_delay_ms {
            errors.push(ValidationError::new(
                "service_a.retry.max_delay_ms",
                "must not be smaller than base_delay_ms",
            ));
        }
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than 0"));
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, url: &str) {
    if let Err(e) = validate_url(url) {
        errors.push(ValidationError::new(field, e));
    }
}

fn check_listen_addr(errors: &mut Vec<ValidationError>, field: &str, addr: &str) {
    if addr.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{addr}' is not a valid socket address"),
        ));
    }
}

/// Validate a service base URL
pub fn validate_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err("URL must start with http:// or https://".to_string());
    }

    Ok(())
}

/// Validate log level
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "telemetry.log_level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&PipelineConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = PipelineConfig::default();
        config.telemetry.log_level = "verbose".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("telemetry.log_level"));
    }

    #[test]
    fn test_zero_capacities_rejected() {
        let mut config = PipelineConfig::default();
        config.service_a.queue_capacity = 0;
        config.service_a.webhook_permits = 0;
        config.service_b.token_limit = 0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("service_a.queue_capacity"));
        assert!(err.contains("service_a.webhook_permits"));
        assert!(err.contains("service_b.token_limit"));
    }

    #[test]
    fn test_zero_webhook_queue_is_allowed() {
        let mut config = PipelineConfig::default();
        config.service_a.webhook_queue_limit = 0;
        config.service_a.enqueue_timeout_ms = 0;

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_fault_probability_range() {
        let mut config = PipelineConfig::default();

        config.service_b.fault_probability = 1.0;
        assert!(validate_config(&config).is_ok());

        config.service_b.fault_probability = 1.5;
        assert!(validate_config(&config).is_err());

        config.service_b.fault_probability = -0.1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_tokens_per_period_bounded_by_limit() {
        let mut config = PipelineConfig::default();
        config.service_b.tokens_per_period = 6;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("service_b.tokens_per_period"));
    }

    #[test]
    fn test_retry_settings() {
        let mut config = PipelineConfig::default();
        config.service_a.retry.multiplier = 0.5;
        config.service_a.retry.max_delay_ms = Some(10);

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("service_a.retry.multiplier"));
        assert!(err.contains("service_a.retry.max_delay_ms"));

        config.service_a.retry.multiplier = f64::NAN;
        config.service_a.retry.max_delay_ms = None;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_urls_and_addresses() {
        let mut config = PipelineConfig::default();
        config.service_a.service_b_url = "service-b:80".to_string();
        config.service_c.listen_addr = "localhost".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("service_a.service_b_url"));
        assert!(err.contains("service_c.listen_addr"));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("http://service-b").is_ok());
        assert!(validate_url("https://example.com:8443").is_ok());
        assert!(validate_url("").is_err());
        assert!(validate_url("ftp://example.com").is_err());
    }
}
