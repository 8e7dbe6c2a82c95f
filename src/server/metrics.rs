use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all ingest server metrics
const PREFIX: &str = "voice_ingest";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Upload Metrics
    pub static ref UPLOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_uploads_total"), "Uploads by outcome"),
        &["outcome"]
    ).expect("Failed to create uploads_total metric");

    pub static ref UPLOADED_BYTES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_uploaded_bytes_total"),
        "Total bytes persisted to storage"
    ).expect("Failed to create uploaded_bytes_total metric");

    // Conversion Metrics
    pub static ref CONVERSION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_conversion_duration_seconds"),
            "Audio conversion duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0]),
        &["result"]
    ).expect("Failed to create conversion_duration_seconds metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(UPLOADS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(UPLOADED_BYTES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CONVERSION_DURATION_SECONDS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of an upload
///
/// `outcome` is one of normalized, fallback, bad_request, internal.
pub fn record_upload(outcome: &str, stored_bytes: usize) {
    UPLOADS_TOTAL.with_label_values(&[outcome]).inc();
    UPLOADED_BYTES_TOTAL.inc_by(stored_bytes as f64);
}

/// Record one conversion attempt
pub fn record_conversion(success: bool, duration: Duration) {
    let result = if success { "success" } else { "failure" };
    CONVERSION_DURATION_SECONDS
        .with_label_values(&[result])
        .observe(duration.as_secs_f64());
}

/// Collapse dynamic path segments so label cardinality stays bounded
pub fn categorize_endpoint(path: &str) -> &'static str {
    if path.starts_with("/static/") {
        "/static"
    } else if path == "/upload" {
        "/upload"
    } else if path == "/" {
        "/"
    } else {
        "other"
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
