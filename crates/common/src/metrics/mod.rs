//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all OCR Studio metrics
pub const METRICS_PREFIX: &str = "ocrstudio";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.075,  // 75ms
    0.100,  // 100ms
    0.150,  // 150ms - P99 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for document uploads, which are bounded by disk throughput
pub const UPLOAD_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Task lifecycle metrics
    describe_counter!(
        format!("{}_tasks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total tasks created"
    );

    describe_counter!(
        format!("{}_tasks_deleted_total", METRICS_PREFIX),
        Unit::Count,
        "Total tasks deleted"
    );

    // Document metrics
    describe_counter!(
        format!("{}_documents_uploaded_total", METRICS_PREFIX),
        Unit::Count,
        "Total input documents uploaded"
    );

    describe_counter!(
        format!("{}_documents_removed_total", METRICS_PREFIX),
        Unit::Count,
        "Total input documents removed"
    );

    describe_histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document upload batch latency in seconds"
    );

    // Storage metrics
    describe_counter!(
        format!("{}_storage_faults_total", METRICS_PREFIX),
        Unit::Count,
        "Total blob store failures"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_task_created() {
    counter!(format!("{}_tasks_created_total", METRICS_PREFIX)).increment(1);
}

pub fn record_task_deleted() {
    counter!(format!("{}_tasks_deleted_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a completed upload batch
pub fn record_documents_uploaded(count: usize, duration_secs: f64) {
    counter!(format!("{}_documents_uploaded_total", METRICS_PREFIX)).increment(count as u64);

    histogram!(format!("{}_upload_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

pub fn record_documents_removed(count: usize) {
    counter!(format!("{}_documents_removed_total", METRICS_PREFIX)).increment(count as u64);
}

/// Helper to record a blob store failure by operation
pub fn record_storage_fault(operation: &str) {
    counter!(
        format!("{}_storage_faults_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}
