//! Service B: rate-limited, fault-injecting relay in front of service C

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use backflow_config::ServiceBConfig;
use backflow_metrics::{telemetry_router, AdmissionOutcome, Gate, MetricsCollector};
use backflow_ratelimit::TokenBucket;
use backflow_types::{Forwarded, DO_WORK_PATH, PROCESS_PATH};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::downstream::{Downstream, HttpDownstream};
use crate::error::ServiceError;
use crate::fault::FaultInjector;

#[derive(Clone)]
pub struct ProcessState {
    forward: Arc<dyn Downstream>,
    faults: FaultInjector,
    metrics: MetricsCollector,
}

impl ProcessState {
    pub fn new(forward: Arc<dyn Downstream>, faults: FaultInjector) -> Self {
        Self {
            forward,
            faults,
            metrics: MetricsCollector::new(),
        }
    }
}

pub struct ServiceB;

impl ServiceB {
    /// Router forwarding to the real service C named in `config`
    pub fn build(config: &ServiceBConfig, metrics_enabled: bool) -> Result<Router, ServiceError> {
        let forward = HttpDownstream::new(&config.service_c_url, config.request_timeout())?;
        Self::with_parts(
            config,
            Arc::new(forward),
            FaultInjector::random(config.fault_probability),
            metrics_enabled,
        )
    }

    pub fn with_parts(
        config: &ServiceBConfig,
        forward: Arc<dyn Downstream>,
        faults: FaultInjector,
        metrics_enabled: bool,
    ) -> Result<Router, ServiceError> {
        let bucket = TokenBucket::new(
            config.token_limit,
            config.tokens_per_period,
            config.replenishment_period(),
        )?;

        info!(
            token_limit = config.token_limit,
            tokens_per_period = config.tokens_per_period,
            replenishment_period_ms = config.replenishment_period_ms,
            fault_probability = faults.probability(),
            service_c = %config.service_c_url,
            "Service B configured"
        );

        Ok(router(
            ProcessState::new(forward, faults),
            Arc::new(bucket),
            metrics_enabled,
        ))
    }
}

/// Routes of service B, with `/api/process` behind the token bucket
pub fn router(state: ProcessState, bucket: Arc<TokenBucket>, metrics_enabled: bool) -> Router {
    Router::new()
        .route(PROCESS_PATH, post(process_handler))
        .route_layer(middleware::from_fn_with_state(bucket, token_bucket_gate))
        .with_state(state)
        .merge(telemetry_router(metrics_enabled))
        .layer(TraceLayer::new_for_http())
}

async fn token_bucket_gate(
    State(bucket): State<Arc<TokenBucket>>,
    request: Request,
    next: Next,
) -> Response {
    let metrics = MetricsCollector::new();

    match bucket.acquire() {
        Ok(()) => {
            metrics.record_admission(Gate::ProcessTokenBucket, AdmissionOutcome::Admitted);
            next.run(request).await
        }
        Err(e) => {
            metrics.record_admission(Gate::ProcessTokenBucket, AdmissionOutcome::Rejected);
            debug!(error = %e, "Rejected by token bucket");
            ServiceError::from(e).into_response()
        }
    }
}

async fn process_handler(
    State(state): State<ProcessState>,
    body: String,
) -> Result<Json<Forwarded>, ServiceError> {
    if state.faults.should_fail() {
        info!(payload = %body, "Simulating transient failure");
        state.metrics.record_fault_injected();
        return Err(ServiceError::InjectedFault);
    }

    info!(payload = %body, "Forwarding to service C");
    let response = state
        .forward
        .post(DO_WORK_PATH, body)
        .await
        .map_err(|e| {
            warn!(error = %e, "Call to service C failed");
            ServiceError::from(e)
        })?;

    info!(status = response.status, "Service C answered");
    Ok(Json(Forwarded {
        forwarded: response.status,
    }))
}
