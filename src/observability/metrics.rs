//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by method, status, branch
//! - `edge_request_duration_seconds` (histogram): latency distribution
//! - `edge_errors_total` (counter): pipeline failures by kind
//! - `edge_policy_reloads_total` (counter): reload attempts by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, branch: &'static str, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();

    metrics::counter!(
        "edge_requests_total",
        "method" => method.clone(),
        "status" => status.clone(),
        "branch" => branch
    )
    .increment(1);
    metrics::histogram!(
        "edge_request_duration_seconds",
        "method" => method,
        "status" => status,
        "branch" => branch
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a pipeline failure.
pub fn record_error(kind: &'static str) {
    metrics::counter!("edge_errors_total", "kind" => kind).increment(1);
}

/// Record a policy reload attempt.
pub fn record_reload(ok: bool) {
    let outcome = if ok { "applied" } else { "rejected" };
    metrics::counter!("edge_policy_reloads_total", "outcome" => outcome).increment(1);
}
