//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Tasks enqueued and processed, by kind and outcome
//! - Task apply latency histograms
//! - Dead letters by failure stage
//! - Reconciliation runs and counter corrections
//! - HTTP request counts and latency

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "chat_system";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Tasks pushed onto the queue, by kind
pub static TASKS_ENQUEUED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tasks_enqueued_total", "Total number of tasks enqueued").namespace(NAMESPACE),
        &["kind"],
    )
    .expect("Failed to create TASKS_ENQUEUED_TOTAL metric")
});

/// Tasks that reached a terminal state, by kind and outcome
pub static TASKS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tasks_processed_total", "Total number of tasks processed")
            .namespace(NAMESPACE),
        &["kind", "outcome"], // outcome: "applied", "duplicate", "dead_lettered"
    )
    .expect("Failed to create TASKS_PROCESSED_TOTAL metric")
});

/// Time from dequeue to terminal state, in seconds
pub static TASK_APPLY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "task_apply_duration_seconds",
            "Task processing latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["kind"],
    )
    .expect("Failed to create TASK_APPLY_DURATION_SECONDS metric")
});

/// Tasks parked in the dead-letter list, by stage
pub static DEAD_LETTERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dead_letters_total", "Total number of dead-lettered tasks").namespace(NAMESPACE),
        &["stage"],
    )
    .expect("Failed to create DEAD_LETTERS_TOTAL metric")
});

/// Reconciliation runs, by outcome
pub static RECONCILE_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reconcile_runs_total", "Total number of counter reconciliation runs")
            .namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create RECONCILE_RUNS_TOTAL metric")
});

/// Rows whose counter had drifted and was overwritten
pub static RECONCILE_CORRECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reconcile_corrections_total",
            "Total number of drifted counters corrected",
        )
        .namespace(NAMESPACE),
        &["counter"], // "chats_count", "messages_count", "sequence"
    )
    .expect("Failed to create RECONCILE_CORRECTIONS_TOTAL metric")
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(TASKS_ENQUEUED_TOTAL.clone()))
        .expect("Failed to register TASKS_ENQUEUED_TOTAL");
    registry
        .register(Box::new(TASKS_PROCESSED_TOTAL.clone()))
        .expect("Failed to register TASKS_PROCESSED_TOTAL");
    registry
        .register(Box::new(TASK_APPLY_DURATION_SECONDS.clone()))
        .expect("Failed to register TASK_APPLY_DURATION_SECONDS");
    registry
        .register(Box::new(DEAD_LETTERS_TOTAL.clone()))
        .expect("Failed to register DEAD_LETTERS_TOTAL");
    registry
        .register(Box::new(RECONCILE_RUNS_TOTAL.clone()))
        .expect("Failed to register RECONCILE_RUNS_TOTAL");
    registry
        .register(Box::new(RECONCILE_CORRECTIONS_TOTAL.clone()))
        .expect("Failed to register RECONCILE_CORRECTIONS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_enqueued(kind: &str) {
    TASKS_ENQUEUED_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper to record a task reaching a terminal state
pub fn record_processed(kind: &str, outcome: &str, duration_secs: f64) {
    TASKS_PROCESSED_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
    TASK_APPLY_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration_secs);
}

pub fn record_dead_letter(stage: &str) {
    DEAD_LETTERS_TOTAL.with_label_values(&[stage]).inc();
}

/// Helper to record one reconciliation run
pub fn record_reconcile(outcome: &str, chats_count: u64, messages_count: u64, sequences: u64) {
    RECONCILE_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    RECONCILE_CORRECTIONS_TOTAL
        .with_label_values(&["chats_count"])
        .inc_by(chats_count);
    RECONCILE_CORRECTIONS_TOTAL
        .with_label_values(&["messages_count"])
        .inc_by(messages_count);
    RECONCILE_CORRECTIONS_TOTAL
        .with_label_values(&["sequence"])
        .inc_by(sequences);
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}
