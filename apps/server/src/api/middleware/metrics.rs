//! Metrics middleware - tracks HTTP request metrics

use axum::{extract::Request, middleware::Next, response::Response};
use prometheus::IntGauge;
use std::time::Instant;

use crate::metrics::{
    sanitize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS,
};

/// Requests slower than this are logged at warn level.
const SLOW_REQUEST_SECONDS: f64 = 5.0;

/// Decrements the in-flight gauge when dropped, including on cancellation.
struct InFlight(IntGauge);

impl InFlight {
    fn start(gauge: IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Metrics middleware - request count, latency and in-flight gauge per route.
///
/// Numeric path segments are collapsed to `:id` to bound label cardinality.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = sanitize_path(req.uri().path());

    let _in_flight = InFlight::start(HTTP_REQUESTS_IN_FLIGHT.with_label_values(&[&method, &path]));

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    if duration > SLOW_REQUEST_SECONDS {
        tracing::warn!(method = %method, path = %path, duration_s = duration, "Slow request");
    }

    response
}
