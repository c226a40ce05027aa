//! Service A: trigger and webhook endpoints in front of the work queue

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use backflow_config::ServiceAConfig;
use backflow_metrics::{telemetry_router, AdmissionOutcome, Gate, MetricsCollector, QueueSource};
use backflow_ratelimit::{Admission, AdmissionError, ConcurrencyLimiter};
use backflow_types::{Started, WebhookReceived, WorkItem, START_PATH, WEBHOOK_PATH};
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::client::{retry_policy, RetryingClient};
use crate::downstream::{Downstream, HttpDownstream};
use crate::error::ServiceError;
use crate::queue::{work_queue, Dispatcher, DispatcherHandle, WorkQueue};

const WEBHOOK_BROADCAST_CAPACITY: usize = 256;

/// Shared state of service A's handlers
#[derive(Clone)]
pub struct AppState {
    queue: WorkQueue,
    enqueue_timeout: Option<Duration>,
    webhooks: broadcast::Sender<WorkItem>,
    metrics: MetricsCollector,
}

impl AppState {
    pub fn new(queue: WorkQueue, enqueue_timeout: Option<Duration>) -> Self {
        let (webhooks, _) = broadcast::channel(WEBHOOK_BROADCAST_CAPACITY);
        Self {
            queue,
            enqueue_timeout,
            webhooks,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Observe every payload accepted on `/webhook`
    pub fn subscribe_webhooks(&self) -> broadcast::Receiver<WorkItem> {
        self.webhooks.subscribe()
    }

    async fn enqueue(&self, item: WorkItem, source: QueueSource) -> Result<(), ServiceError> {
        self.queue
            .enqueue_within(item, source, self.enqueue_timeout)
            .await
            .map_err(|e| {
                self.metrics.record_queue_rejected(e.as_str());
                ServiceError::from(e)
            })
    }
}

/// A running service A: its router and the dispatcher behind it
pub struct ServiceA {
    router: Router,
    state: AppState,
    dispatcher: DispatcherHandle,
}

impl ServiceA {
    /// Wire service A against the real service B named in `config`
    pub fn build(config: &ServiceAConfig, metrics_enabled: bool) -> Result<Self, ServiceError> {
        let downstream = HttpDownstream::new(&config.service_b_url, config.request_timeout())?;
        Ok(Self::with_downstream(config, Arc::new(downstream), metrics_enabled))
    }

    /// Wire service A against any downstream; spawns the dispatcher
    pub fn with_downstream(
        config: &ServiceAConfig,
        downstream: Arc<dyn Downstream>,
        metrics_enabled: bool,
    ) -> Self {
        let (queue, receiver) = work_queue(config.queue_capacity);
        let client = RetryingClient::new(downstream, retry_policy(&config.retry));
        let dispatcher = Dispatcher::new(receiver, client)
            .drain_on_shutdown(config.drain_on_shutdown)
            .spawn();

        let gate = ConcurrencyLimiter::new(config.webhook_permits, config.webhook_queue_limit);
        let state = AppState::new(queue, config.enqueue_timeout());

        info!(
            queue_capacity = config.queue_capacity,
            webhook_permits = config.webhook_permits,
            webhook_queue_limit = config.webhook_queue_limit,
            service_b = %config.service_b_url,
            "Service A configured"
        );

        Self {
            router: router(state.clone(), gate, metrics_enabled),
            state,
            dispatcher,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn into_parts(self) -> (Router, DispatcherHandle) {
        (self.router, self.dispatcher)
    }
}

/// Routes of service A, with `/webhook` behind the concurrency gate
pub fn router(state: AppState, gate: ConcurrencyLimiter, metrics_enabled: bool) -> Router {
    let webhook = Router::new()
        .route(WEBHOOK_PATH, post(webhook_handler))
        .route_layer(middleware::from_fn_with_state(gate, concurrency_gate));

    Router::new()
        .route(START_PATH, post(start_handler))
        .merge(webhook)
        .with_state(state)
        .merge(telemetry_router(metrics_enabled))
        .layer(TraceLayer::new_for_http())
}

async fn concurrency_gate(
    State(gate): State<ConcurrencyLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let metrics = MetricsCollector::new();

    let _permit = match gate.attempt() {
        Admission::Admitted(permit) => {
            metrics.record_admission(Gate::WebhookConcurrency, AdmissionOutcome::Admitted);
            permit
        }
        Admission::Queued(waiter) => {
            metrics.record_admission(Gate::WebhookConcurrency, AdmissionOutcome::Queued);
            debug!(queued = gate.queued(), "Webhook waiting for a handler slot");
            match waiter.admitted().await {
                Ok(permit) => permit,
                Err(e) => return ServiceError::from(e).into_response(),
            }
        }
        Admission::Rejected => {
            metrics.record_admission(Gate::WebhookConcurrency, AdmissionOutcome::Rejected);
            debug!("Webhook rejected, handlers and wait queue are full");
            return ServiceError::from(AdmissionError::Rejected).into_response();
        }
    };

    next.run(request).await
}

async fn start_handler(State(state): State<AppState>) -> Result<Json<Started>, ServiceError> {
    let (id, item) = WorkItem::new_task();
    state.enqueue(item, QueueSource::Start).await?;

    info!(task = %id, depth = state.queue.depth(), "Started task");
    Ok(Json(Started { started: id }))
}

async fn webhook_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<WebhookReceived>, ServiceError> {
    let item = WorkItem::from(body);
    info!(item = %item, "Webhook received");

    state.enqueue(item.clone(), QueueSource::Webhook).await?;
    debug!(item = %item, depth = state.queue.depth(), "Webhook queued");
    // Nobody listening is fine
    let _ = state.webhooks.send(item);

    Ok(Json(WebhookReceived { received: true }))
}
