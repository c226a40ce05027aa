//! Core configuration structures for the backflow pipeline

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by all three services.
///
/// Each process reads the whole document and uses the section for the service it runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub service_a: ServiceAConfig,

    #[serde(default)]
    pub service_b: ServiceBConfig,

    #[serde(default)]
    pub service_c: ServiceCConfig,
}

/// Logging and metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Expose `/metrics` on every service
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Front service: trigger endpoint, webhook endpoint, bounded queue and dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAConfig {
    #[serde(default = "default_service_a_addr")]
    pub listen_addr: String,

    /// Base URL of service B
    #[serde(default = "default_service_b_url")]
    pub service_b_url: String,

    /// Capacity of the bounded work queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long an HTTP caller may wait for a queue slot; 0 waits without a deadline
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,

    /// Concurrent webhook handlers
    #[serde(default = "default_webhook_permits")]
    pub webhook_permits: u32,

    /// Webhooks allowed to wait for a handler slot
    #[serde(default = "default_webhook_queue_limit")]
    pub webhook_queue_limit: usize,

    /// Per-request timeout for calls to service B
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Process buffered items on shutdown instead of discarding them
    #[serde(default = "default_true")]
    pub drain_on_shutdown: bool,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry behaviour for A's calls to B
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry `n` waits `base_delay_ms * multiplier^n`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Optional cap on exponential delays; unbounded when absent
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Wait for the server's `Retry-After` on 429 responses
    #[serde(default = "default_true")]
    pub honor_retry_after: bool,
}

/// Middle service: token-bucket admission, fault injection, forwarding to C
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBConfig {
    #[serde(default = "default_service_b_addr")]
    pub listen_addr: String,

    /// Base URL of service C
    #[serde(default = "default_service_c_url")]
    pub service_c_url: String,

    /// Maximum tokens in the bucket
    #[serde(default = "default_token_limit")]
    pub token_limit: u32,

    /// Tokens added each replenishment period
    #[serde(default = "default_tokens_per_period")]
    pub tokens_per_period: u32,

    #[serde(default = "default_replenishment_period_ms")]
    pub replenishment_period_ms: u64,

    /// Probability of answering 500 without forwarding
    #[serde(default = "default_fault_probability")]
    pub fault_probability: f64,

    /// Per-request timeout for calls to service C
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Slow service: delayed work followed by a webhook back to A
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCConfig {
    #[serde(default = "default_service_c_addr")]
    pub listen_addr: String,

    /// Base URL of service A
    #[serde(default = "default_service_a_url")]
    pub service_a_url: String,

    /// Artificial work duration
    #[serde(default = "default_work_delay_ms")]
    pub work_delay_ms: u64,

    /// Per-request timeout for the webhook call to service A
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServiceAConfig {
    pub fn enqueue_timeout(&self) -> Option<Duration> {
        (self.enqueue_timeout_ms > 0).then(|| Duration::from_millis(self.enqueue_timeout_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ServiceBConfig {
    pub fn replenishment_period(&self) -> Duration {
        Duration::from_millis(self.replenishment_period_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ServiceCConfig {
    pub fn work_delay(&self) -> Duration {
        Duration::from_millis(self.work_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_service_a_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_service_b_addr() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_service_c_addr() -> String {
    "0.0.0.0:8082".to_string()
}

fn default_service_a_url() -> String {
    "http://service-a".to_string()
}

fn default_service_b_url() -> String {
    "http://service-b".to_string()
}

fn default_service_c_url() -> String {
    "http://service-c".to_string()
}

fn default_queue_capacity() -> usize {
    5
}

fn default_enqueue_timeout_ms() -> u64 {
    10_000
}

fn default_webhook_permits() -> u32 {
    5
}

fn default_webhook_queue_limit() -> usize {
    10
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_token_limit() -> u32 {
    5
}

fn default_tokens_per_period() -> u32 {
    1
}

fn default_replenishment_period_ms() -> u64 {
    2000
}

fn default_fault_probability() -> f64 {
    0.2
}

fn default_work_delay_ms() -> u64 {
    3000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_enabled: default_true(),
        }
    }
}

impl Default for ServiceAConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_service_a_addr(),
            service_b_url: default_service_b_url(),
            queue_capacity: default_queue_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            webhook_permits: default_webhook_permits(),
            webhook_queue_limit: default_webhook_queue_limit(),
            request_timeout_ms: default_request_timeout_ms(),
            drain_on_shutdown: default_true(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: None,
            honor_retry_after: default_true(),
        }
    }
}

impl Default for ServiceBConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_service_b_addr(),
            service_c_url: default_service_c_url(),
            token_limit: default_token_limit(),
            tokens_per_period: default_tokens_per_period(),
            replenishment_period_ms: default_replenishment_period_ms(),
            fault_probability: default_fault_probability(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for ServiceCConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_service_c_addr(),
            service_a_url: default_service_a_url(),
            work_delay_ms: default_work_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
