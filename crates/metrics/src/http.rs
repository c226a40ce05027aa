use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::collector::{MetricsCollector, MetricsError};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Routes every service exposes next to its own endpoints
///
/// `/health` is always present; `/metrics` only when enabled.
pub fn telemetry_router(metrics_enabled: bool) -> Router {
    let health = Router::new().route("/health", get(health_check));

    if metrics_enabled {
        health.merge(
            Router::new()
                .route("/metrics", get(scrape))
                .with_state(MetricsCollector::new()),
        )
    } else {
        health
    }
}

async fn scrape(State(collector): State<MetricsCollector>) -> Result<Response, MetricsHandlerError> {
    let body = collector.export_metrics()?;
    Ok(([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response())
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsHandlerError {
    #[error("metrics scrape failed: {0}")]
    Export(#[from] MetricsError),
}

impl IntoResponse for MetricsHandlerError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
