use prometheus::{Encoder, TextEncoder};

use crate::metrics::*;

/// Metrics collector for the backflow services
///
/// Counters are process-wide, so collectors are cheap handles that can be
/// copied into every component that records.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUEUE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_enqueued(&self, source: QueueSource) {
        QUEUE_ENQUEUED.with_label_values(&[source.as_str()]).inc();
        QUEUE_DEPTH.inc();
    }

    pub fn record_dequeued(&self) {
        QUEUE_DEPTH.dec();
    }

    pub fn record_queue_rejected(&self, reason: &str) {
        QUEUE_REJECTED.with_label_values(&[reason]).inc();
    }

    /// Items discarded at shutdown; they already left the depth gauge when dequeued
    pub fn record_abandoned(&self, count: u64) {
        ITEMS_ABANDONED.inc_by(count);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OUTBOUND CALL METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_dispatch(&self, outcome: DispatchOutcome) {
        let outcome = match outcome {
            DispatchOutcome::Success => "success",
            DispatchOutcome::FailedResponse => "failed_response",
            DispatchOutcome::TransportError => "transport_error",
        };
        DISPATCH_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn record_retry(&self, reason: &str) {
        RETRIES_TOTAL.with_label_values(&[reason]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMISSION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_admission(&self, gate: Gate, outcome: AdmissionOutcome) {
        let gate = match gate {
            Gate::WebhookConcurrency => "webhook_concurrency",
            Gate::ProcessTokenBucket => "process_token_bucket",
        };
        let outcome = match outcome {
            AdmissionOutcome::Admitted => "admitted",
            AdmissionOutcome::Queued => "queued",
            AdmissionOutcome::Rejected => "rejected",
        };
        ADMISSION_TOTAL.with_label_values(&[gate, outcome]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WORKER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_fault_injected(&self) {
        FAULTS_INJECTED.inc();
    }

    pub fn record_callback(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        CALLBACKS_TOTAL.with_label_values(&[outcome]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export all metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

/// Producer that put an item on the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSource {
    Start,
    Webhook,
}

impl QueueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueSource::Start => "start",
            QueueSource::Webhook => "webhook",
        }
    }
}

/// Final outcome of one dispatched item, after retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    FailedResponse,
    TransportError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    WebhookConcurrency,
    ProcessTokenBucket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Admitted,
    Queued,
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to encode metrics: {0}")]
    EncodingError(String),
}
