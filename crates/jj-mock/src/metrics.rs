//! Prometheus metrics for jj-mock.
//!
//! Tracks dispatched traffic, control-plane registrations and the size of the
//! in-memory stores.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total number of dispatched requests
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "jj_requests_total",
        "Total number of requests dispatched",
        &["outcome", "status"]  // outcome: mock|control|unmatched|error
    )
    .unwrap();

    /// Dispatch duration
    pub static ref REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "jj_request_duration_ms",
        "Request duration from resolution to response in milliseconds",
        &["outcome"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();

    /// Control-plane operations
    pub static ref REGISTRATIONS_TOTAL: CounterVec = register_counter_vec!(
        "jj_registrations_total",
        "Total number of control-plane operations",
        &["operation", "result"]  // operation: register|deregister|reset, result: ok|invalid
    )
    .unwrap();

    /// Remote handlers currently installed
    pub static ref REMOTE_HANDLERS: Gauge = register_gauge!(
        "jj_remote_handlers",
        "Number of remote mock handlers currently registered"
    )
    .unwrap();

    /// Items held by the history repository
    pub static ref HISTORY_ITEMS: Gauge = register_gauge!(
        "jj_history_items",
        "Number of request/response pairs held in history"
    )
    .unwrap();
}

/// `result` label of a control-plane operation that was applied.
pub const RESULT_OK: &str = "ok";
/// `result` label of a control-plane operation rejected for a bad payload.
pub const RESULT_INVALID: &str = "invalid";

/// Render every registered metric in the Prometheus text format.
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(outcome: &str, status: u16, duration_ms: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[outcome, &status.to_string()])
        .inc();
    REQUEST_DURATION_MS
        .with_label_values(&[outcome])
        .observe(duration_ms);
}

pub fn record_registration(operation: &str, result: &str) {
    REGISTRATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

pub fn set_remote_handlers(count: usize) {
    REMOTE_HANDLERS.set(count as f64);
}

pub fn set_history_items(count: usize) {
    HISTORY_ITEMS.set(count as f64);
}
