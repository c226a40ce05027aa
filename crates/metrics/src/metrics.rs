use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

lazy_static! {
    // ═══════════════════════════════════════════════════════════════════════════
    // QUEUE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Work items accepted into the bounded queue, by producer
    pub static ref QUEUE_ENQUEUED: IntCounterVec = register_int_counter_vec!(
        "backflow_queue_enqueued_total",
        "Work items accepted into the bounded queue",
        &["source"]
    )
    .unwrap();

    /// Enqueue attempts that were turned away
    pub static ref QUEUE_REJECTED: IntCounterVec = register_int_counter_vec!(
        "backflow_queue_rejected_total",
        "Enqueue attempts rejected at the HTTP boundary",
        &["reason"]
    )
    .unwrap();

    /// Items currently buffered
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        "backflow_queue_depth",
        "Work items waiting in the bounded queue"
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // OUTBOUND CALL METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Final outcome of each dispatched item
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "backflow_dispatch_total",
        "Dispatched work items by final outcome",
        &["outcome"]
    )
    .unwrap();

    /// Retries performed by the retrying client
    pub static ref RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "backflow_retries_total",
        "Outbound call retries by triggering reason",
        &["reason"]
    )
    .unwrap();

    /// Items dropped without processing during shutdown
    pub static ref ITEMS_ABANDONED: IntCounter = register_int_counter!(
        "backflow_items_abandoned_total",
        "Buffered work items discarded at shutdown"
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMISSION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Admission decisions per gate
    pub static ref ADMISSION_TOTAL: IntCounterVec = register_int_counter_vec!(
        "backflow_admission_total",
        "Admission decisions by gate and outcome",
        &["gate", "outcome"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // WORKER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Simulated server errors returned by the unreliable worker
    pub static ref FAULTS_INJECTED: IntCounter = register_int_counter!(
        "backflow_faults_injected_total",
        "Simulated transient faults"
    )
    .unwrap();

    /// Webhook callbacks issued by the slow worker
    pub static ref CALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "backflow_callbacks_total",
        "Completion callbacks by outcome",
        &["outcome"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // LOG METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Warning and error log events
    pub static ref LOG_EVENTS: IntCounterVec = register_int_counter_vec!(
        "backflow_log_events_total",
        "Warning and error log events",
        &["level"]
    )
    .unwrap();
}
