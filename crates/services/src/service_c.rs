//! Service C: slow worker that reports completion to service A

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use backflow_config::ServiceCConfig;
use backflow_metrics::{telemetry_router, MetricsCollector};
use backflow_types::{WorkDone, WorkItem, DO_WORK_PATH, WEBHOOK_PATH};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::downstream::{Downstream, HttpDownstream};
use crate::error::ServiceError;

#[derive(Clone)]
pub struct WorkerState {
    callback: Arc<dyn Downstream>,
    work_delay: Duration,
    metrics: MetricsCollector,
}

impl WorkerState {
    pub fn new(callback: Arc<dyn Downstream>, work_delay: Duration) -> Self {
        Self {
            callback,
            work_delay,
            metrics: MetricsCollector::new(),
        }
    }
}

pub struct ServiceC;

impl ServiceC {
    /// Router calling back to the real service A named in `config`
    pub fn build(config: &ServiceCConfig, metrics_enabled: bool) -> Result<Router, ServiceError> {
        let callback = HttpDownstream::new(&config.service_a_url, config.request_timeout())?;

        info!(
            work_delay_ms = config.work_delay_ms,
            service_a = %config.service_a_url,
            "Service C configured"
        );

        Ok(router(
            WorkerState::new(Arc::new(callback), config.work_delay()),
            metrics_enabled,
        ))
    }
}

pub fn router(state: WorkerState, metrics_enabled: bool) -> Router {
    Router::new()
        .route(DO_WORK_PATH, post(do_work_handler))
        .with_state(state)
        .merge(telemetry_router(metrics_enabled))
        .layer(TraceLayer::new_for_http())
}

/// Holds the caller for the whole work delay, then reports back once.
/// A failed callback is logged and not retried.
async fn do_work_handler(State(state): State<WorkerState>, body: String) -> Json<WorkDone> {
    let item = WorkItem::from(body);
    info!(item = %item, "Working");

    tokio::time::sleep(state.work_delay).await;

    let completion = item.completed();
    match state
        .callback
        .post(WEBHOOK_PATH, completion.payload().to_string())
        .await
    {
        Ok(response) if response.is_success() => {
            info!(item = %completion, status = response.status, "Webhook delivered to service A");
            state.metrics.record_callback(true);
        }
        Ok(response) => {
            warn!(item = %completion, status = response.status, "Service A refused webhook");
            state.metrics.record_callback(false);
        }
        Err(e) => {
            warn!(item = %completion, error = %e, "Webhook to service A failed");
            state.metrics.record_callback(false);
        }
    }

    Json(WorkDone { done: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::DownstreamResponse;
    use crate::error::TransportError;
    use crate::testing::ScriptedDownstream;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::time::Instant;
    use tower::ServiceExt;

    fn app(callback: &Arc<ScriptedDownstream>) -> Router {
        router(
            WorkerState::new(callback.clone(), Duration::from_secs(3)),
            false,
        )
    }

    fn do_work(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(DO_WORK_PATH)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_back_after_delay() {
        let callback = Arc::new(ScriptedDownstream::always(DownstreamResponse::new(200)));
        let started = Instant::now();

        let response = app(&callback).oneshot(do_work("task:42")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(started.elapsed() >= Duration::from_secs(3));

        let calls = callback.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, WEBHOOK_PATH);
        assert_eq!(calls[0].body, "done:task:42");
        assert!(calls[0].at - started >= Duration::from_secs(3));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], br#"{"done":true}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_prefix_stacks() {
        let callback = Arc::new(ScriptedDownstream::always(DownstreamResponse::new(200)));

        app(&callback).oneshot(do_work("done:task:42")).await.unwrap();

        assert_eq!(callback.bodies(), vec!["done:done:task:42"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_callback_is_not_retried() {
        let callback = Arc::new(ScriptedDownstream::always(DownstreamResponse::new(429)));

        let response = app(&callback).oneshot(do_work("task:1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(callback.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_callback_still_completes() {
        let callback = Arc::new(ScriptedDownstream::new(
            vec![Err(TransportError::Connect("refused".into()))],
            DownstreamResponse::new(200),
        ));

        let response = app(&callback).oneshot(do_work("task:1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(callback.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_served_concurrently() {
        let callback = Arc::new(ScriptedDownstream::always(DownstreamResponse::new(200)));
        let app = app(&callback);
        let started = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|i| tokio::spawn(app.clone().oneshot(do_work(&format!("task:{i}")))))
            .collect();
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(callback.call_count(), 3);
    }
}
