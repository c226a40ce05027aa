//! Metrics and logging for the backflow services
//!
//! # Features
//!
//! - Prometheus counters for queueing, admission, retries and worker outcomes
//! - `/metrics` and `/health` routes merged into every service router
//! - Tracing subscriber setup driven by [`backflow_config::TelemetryConfig`]

pub mod collector;
pub mod http;
pub mod metrics;
pub mod tracing;

pub use collector::{
    AdmissionOutcome, DispatchOutcome, Gate, MetricsCollector, MetricsError, QueueSource,
};
pub use http::{telemetry_router, MetricsHandlerError};
pub use self::tracing::{init_tracing, LogMetricsLayer, TracingError};
