use backflow_config::{LogFormat, TelemetryConfig};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::metrics::LOG_EVENTS;

/// Initialize tracing for a service process
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(telemetry: &TelemetryConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(&telemetry.log_level)))
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(LogMetricsLayer);

    match telemetry.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().with_target(true).with_level(true).json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init(),
    }
    .map_err(|e| TracingError::InitError(e.to_string()))
}

fn default_directive(level: &str) -> String {
    format!("{level},tower_http=info,hyper=warn,reqwest=warn")
}

/// Tracing layer that counts warning and error events
pub struct LogMetricsLayer;

impl<S> Layer<S> for LogMetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            Level::ERROR => LOG_EVENTS.with_label_values(&["error"]).inc(),
            Level::WARN => LOG_EVENTS.with_label_values(&["warn"]).inc(),
            _ => {}
        }
    }
}

/// Tracing error types
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(EnvFilter::try_new(default_directive(level)).is_ok());
        }
    }

    #[test]
    fn test_default_directive_keeps_request_traces() {
        assert_eq!(
            default_directive("warn"),
            "warn,tower_http=info,hyper=warn,reqwest=warn"
        );
        assert!(default_directive("debug").starts_with("debug,"));
    }

    #[test]
    fn test_log_metrics_layer_counts_warnings() {
        let before = LOG_EVENTS.with_label_values(&["warn"]).get();
        let subscriber = tracing_subscriber::registry().with(LogMetricsLayer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("first");
            tracing::info!("ignored");
            tracing::warn!("second");
        });

        assert!(LOG_EVENTS.with_label_values(&["warn"]).get() >= before + 2);
    }
}
