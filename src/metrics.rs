//! Prometheus metrics HTTP server.
//!
//! Exposes watcher statistics in Prometheus text format.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use crate::stats::WatchStats;

/// Start the Prometheus metrics HTTP server.
///
/// Serves `/metrics` and `/health` until the task is dropped.
/// Returns an error if the server fails to bind to the port.
pub async fn start_metrics_server(
    port: u16,
    stats: Arc<WatchStats>,
) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(stats);

    let listener = TcpListener::bind(addr).await?;
    info!("Prometheus metrics server listening on http://{}/metrics", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler(State(stats): State<Arc<WatchStats>>) -> impl IntoResponse {
    let output = format_prometheus_metrics(&stats);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

fn push_metric(
    output: &mut String,
    name: &str,
    kind: &str,
    help: &str,
    value: impl std::fmt::Display,
) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} {}\n", name, kind));
    output.push_str(&format!("{} {}\n", name, value));
}

/// Format statistics as Prometheus text format.
fn format_prometheus_metrics(stats: &WatchStats) -> String {
    let summary = stats.summary();
    let mut output = String::with_capacity(2048);

    push_metric(
        &mut output,
        "vatsim_watch_uptime_seconds",
        "gauge",
        "Time since the watcher started",
        format!("{:.3}", summary.elapsed_secs),
    );
    push_metric(
        &mut output,
        "vatsim_watch_polls_total",
        "counter",
        "Completed feed polling cycles",
        summary.polls,
    );
    push_metric(
        &mut output,
        "vatsim_watch_poll_failures_total",
        "counter",
        "Polling cycles whose feed fetch failed",
        summary.poll_failures,
    );
    push_metric(
        &mut output,
        "vatsim_watch_requests_total",
        "counter",
        "Successful upstream HTTP requests",
        summary.requests,
    );
    push_metric(
        &mut output,
        "vatsim_watch_request_failures_total",
        "counter",
        "Failed upstream HTTP requests",
        summary.request_failures,
    );
    push_metric(
        &mut output,
        "vatsim_watch_metars_decoded_total",
        "counter",
        "METAR reports decoded",
        summary.metars_decoded,
    );
    push_metric(
        &mut output,
        "vatsim_watch_known_entities",
        "gauge",
        "Clients currently remembered by the watcher",
        summary.known_entities,
    );

    output.push_str("# HELP vatsim_watch_announcements_total Announcements by client kind\n");
    output.push_str("# TYPE vatsim_watch_announcements_total counter\n");
    let mut kinds: Vec<_> = summary.announcements_by_kind.iter().collect();
    kinds.sort();
    for (kind, count) in kinds {
        output.push_str(&format!(
            "vatsim_watch_announcements_total{{kind=\"{}\"}} {}\n",
            kind, count
        ));
    }
    if summary.announcements_by_kind.is_empty() {
        output.push_str(&format!(
            "vatsim_watch_announcements_total {}\n",
            summary.announcements
        ));
    }

    if let Some(ref latency) = summary.latency_percentiles {
        output.push_str("# HELP vatsim_watch_request_latency_ms Upstream request latency in milliseconds\n");
        output.push_str("# TYPE vatsim_watch_request_latency_ms summary\n");
        output.push_str(&format!(
            "vatsim_watch_request_latency_ms{{quantile=\"0.5\"}} {}\n",
            latency.p50
        ));
        output.push_str(&format!(
            "vatsim_watch_request_latency_ms{{quantile=\"0.9\"}} {}\n",
            latency.p90
        ));
        output.push_str(&format!(
            "vatsim_watch_request_latency_ms{{quantile=\"0.99\"}} {}\n",
            latency.p99
        ));
        output.push_str(&format!(
            "vatsim_watch_request_latency_ms_count {}\n",
            summary.requests
        ));
    }

    output
}
