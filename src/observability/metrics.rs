//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, finally failures, connections)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `restkit_requests_total` (counter): requests by method, status
//! - `restkit_request_duration_seconds` (histogram): pipeline latency by method
//! - `restkit_finally_failures_total` (counter): contained finally-stage failures
//! - `restkit_active_connections` (gauge): current connection count
//! - `restkit_endpoints_bound_total` (counter): endpoints started in this process
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Only the binary installs the exporter, libraries never do

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    metrics::counter!(
        "restkit_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("restkit_request_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_finally_failure() {
    metrics::counter!("restkit_finally_failures_total").increment(1);
}

pub fn connection_opened() {
    metrics::gauge!("restkit_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("restkit_active_connections").decrement(1.0);
}

pub fn record_endpoint_bound() {
    metrics::counter!("restkit_endpoints_bound_total").increment(1);
}
