//! Prometheus metrics endpoint
//!
//! Exposes bridge metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    let _ = &*PROMETHEUS_HANDLE;
    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "dify_bridge_requests_total",
        "Total number of chat completion requests processed"
    );
    metrics::describe_histogram!(
        "dify_bridge_request_duration_seconds",
        "Time until the backend answered (blocking) or the stream was opened (streaming)"
    );
    metrics::describe_counter!(
        "dify_bridge_tokens_total",
        "Tokens reported by the backend"
    );
    metrics::describe_counter!(
        "dify_bridge_stream_events_total",
        "Backend stream events by outcome"
    );
    metrics::describe_counter!(
        "dify_bridge_json_repairs_total",
        "Malformed backend event payloads passed to the repair heuristic"
    );
    metrics::describe_counter!(
        "dify_bridge_registry_updates_total",
        "Conversation registry writes"
    );
    metrics::describe_counter!(
        "dify_bridge_registry_evictions_total",
        "Conversation registry evictions by cause"
    );
    metrics::describe_counter!(
        "dify_bridge_streams_closed_total",
        "Relayed streams by close reason"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a completed request
pub fn record_request(mode: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "dify_bridge_requests_total",
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("dify_bridge_request_duration_seconds", "mode" => mode.to_string())
        .record(duration_secs);
}

/// Record tokens reported by the backend
pub fn record_tokens(token_type: &str, count: u64) {
    metrics::counter!("dify_bridge_tokens_total", "type" => token_type.to_string())
        .increment(count);
}

/// Record one backend stream event: `translated`, `ignored` or `dropped`
pub fn record_stream_event(outcome: &str) {
    metrics::counter!("dify_bridge_stream_events_total", "outcome" => outcome.to_string())
        .increment(1);
}

/// Record a repair attempt: `repaired` or `failed`
pub fn record_json_repair(result: &str) {
    metrics::counter!("dify_bridge_json_repairs_total", "result" => result.to_string())
        .increment(1);
}

pub fn record_registry_update() {
    metrics::counter!("dify_bridge_registry_updates_total").increment(1);
}

/// Record a registry eviction: `capacity` or `expired`
pub fn record_registry_eviction(cause: &str) {
    metrics::counter!("dify_bridge_registry_evictions_total", "cause" => cause.to_string())
        .increment(1);
}

pub fn record_stream_closed(reason: &str) {
    metrics::counter!("dify_bridge_streams_closed_total", "reason" => reason.to_string())
        .increment(1);
}
