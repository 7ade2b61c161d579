//! Prometheus metrics for the registry.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};

lazy_static! {
    // HTTP Request Metrics

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "eo_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "eo_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    /// In-flight HTTP requests
    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "eo_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    // Certificate Metrics

    /// Certificate list/search queries by mode (list, search)
    pub static ref CERTIFICATE_QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "eo_certificate_queries_total",
        "Total number of certificate list/search queries",
        &["mode"]
    )
    .expect("Failed to register CERTIFICATE_QUERIES_TOTAL");

    /// Matching rows reported by certificate queries
    pub static ref CERTIFICATE_QUERY_TOTAL_ROWS: HistogramVec = register_histogram_vec!(
        "eo_certificate_query_total_rows",
        "Number of rows matching a certificate query",
        &["mode"],
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]
    )
    .expect("Failed to register CERTIFICATE_QUERY_TOTAL_ROWS");

    /// Certificate writes by operation and outcome
    pub static ref CERTIFICATE_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "eo_certificate_writes_total",
        "Total number of certificate writes",
        &["operation", "status"]
    )
    .expect("Failed to register CERTIFICATE_WRITES_TOTAL");

    // Import Metrics

    /// Imported spreadsheet rows by outcome (success, error)
    pub static ref IMPORT_ROWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "eo_import_rows_total",
        "Total number of spreadsheet rows processed by bulk import",
        &["outcome"]
    )
    .expect("Failed to register IMPORT_ROWS_TOTAL");

    /// Bulk import duration
    pub static ref IMPORT_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "eo_import_duration_seconds",
        "Bulk import duration in seconds",
        &["status"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register IMPORT_DURATION_SECONDS");

    // Rate Limiting

    /// Requests rejected by the rate limiter
    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "eo_rate_limited_total",
        "Total number of requests rejected by the rate limiter",
        &["path"]
    )
    .expect("Failed to register RATE_LIMITED_TOTAL");
}

/// Replace numeric path segments with `:id` to keep label cardinality bounded.
pub fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn record_import_rows(success: usize, errors: usize) {
    IMPORT_ROWS_TOTAL
        .with_label_values(&["success"])
        .inc_by(success as u64);
    IMPORT_ROWS_TOTAL
        .with_label_values(&["error"])
        .inc_by(errors as u64);
}
