//! Status HTTP server: /health, /status and /metrics.

use axum::extract::Extension;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::state::{RecentMap, WorkerState};

const RECENT_IN_STATUS: usize = 20;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub uptime_secs: u64,
    pub events_received: u64,
    pub gribs_processed: u64,
    pub grib_failures: u64,
    pub maps_rendered: u64,
    pub placeholder_maps: u64,
    pub map_failures: u64,
    pub maps_deleted: u64,
    pub bytes_uploaded: u64,
    pub recent: Vec<RecentMap>,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "map-worker".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn status_snapshot(state: &WorkerState) -> StatusResponse {
    StatusResponse {
        name: state.name.clone(),
        uptime_secs: state.uptime_secs(),
        events_received: state.events_received.load(Ordering::Relaxed),
        gribs_processed: state.gribs_processed.load(Ordering::Relaxed),
        grib_failures: state.grib_failures.load(Ordering::Relaxed),
        maps_rendered: state.maps_rendered.load(Ordering::Relaxed),
        placeholder_maps: state.placeholder_maps.load(Ordering::Relaxed),
        map_failures: state.map_failures.load(Ordering::Relaxed),
        maps_deleted: state.maps_deleted.load(Ordering::Relaxed),
        bytes_uploaded: state.bytes_uploaded.load(Ordering::Relaxed),
        recent: state.recent_maps(RECENT_IN_STATUS).await,
    }
}

pub async fn status_handler(Extension(state): Extension<Arc<WorkerState>>) -> Json<StatusResponse> {
    Json(status_snapshot(&state).await)
}

fn push_counter(output: &mut String, name: &str, help: &str, value: u64) {
    output.push_str(&format!(
        "# HELP {0} {1}\n# TYPE {0} counter\n{0} {2}\n",
        name, help, value
    ));
}

fn render_metrics(state: &WorkerState) -> String {
    let mut output = String::new();

    push_counter(
        &mut output,
        "worker_events_received_total",
        "Events claimed from the event stream",
        state.events_received.load(Ordering::Relaxed),
    );
    push_counter(
        &mut output,
        "worker_gribs_processed_total",
        "GRIB files processed successfully",
        state.gribs_processed.load(Ordering::Relaxed),
    );
    push_counter(
        &mut output,
        "worker_grib_failures_total",
        "GRIB files that failed processing",
        state.grib_failures.load(Ordering::Relaxed),
    );
    push_counter(
        &mut output,
        "worker_maps_rendered_total",
        "Maps rendered and published",
        state.maps_rendered.load(Ordering::Relaxed),
    );
    push_counter(
        &mut output,
        "worker_placeholder_maps_total",
        "Placeholder cards published in place of maps",
        state.placeholder_maps.load(Ordering::Relaxed),
    );
    push_counter(
        &mut output,
        "worker_map_failures_total",
        "Product/region combinations that failed entirely",
        state.map_failures.load(Ordering::Relaxed),
    );
    push_counter(
        &mut output,
        "worker_maps_deleted_total",
        "Maps removed from object storage",
        state.maps_deleted.load(Ordering::Relaxed),
    );
    push_counter(
        &mut output,
        "worker_bytes_uploaded_total",
        "PNG bytes written to object storage",
        state.bytes_uploaded.load(Ordering::Relaxed),
    );

    output.push_str(&format!(
        "# HELP worker_uptime_seconds Seconds since the worker started\n# TYPE worker_uptime_seconds gauge\nworker_uptime_seconds {}\n",
        state.uptime_secs()
    ));

    output
}

pub async fn metrics_handler(
    Extension(state): Extension<Arc<WorkerState>>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(&state),
    )
}

pub fn build_router(state: Arc<WorkerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
}

pub async fn run_server(state: Arc<WorkerState>, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting status server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RecentMap;
    use chrono::Utc;

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.service, "map-worker");
        assert!(!response.version.is_empty());
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let state = WorkerState::new("worker-test");
        state.events_received.fetch_add(5, Ordering::Relaxed);
        state.maps_rendered.fetch_add(3, Ordering::Relaxed);
        state
            .record_map(RecentMap {
                url: "http://minio:9000/weather-maps/gfs/20250101/00/t2m/024_israel.png"
                    .to_string(),
                product: "t2m".to_string(),
                region: "israel".to_string(),
                run: "GFS 20250101 00Z +024H".to_string(),
                placeholder: false,
                duration_ms: 250,
                completed_at: Utc::now(),
            })
            .await;

        let status = status_snapshot(&state).await;
        assert_eq!(status.name, "worker-test");
        assert_eq!(status.events_received, 5);
        assert_eq!(status.maps_rendered, 3);
        assert_eq!(status.recent.len(), 1);
        assert_eq!(status.recent[0].product, "t2m");
    }

    #[tokio::test]
    async fn test_render_metrics() {
        let state = WorkerState::new("worker-test");
        state.maps_rendered.fetch_add(3, Ordering::Relaxed);

        let output = render_metrics(&state);
        assert!(output.contains("worker_maps_rendered_total 3"));
        assert!(output.contains("# TYPE worker_events_received_total counter"));
        assert!(output.contains("# TYPE worker_uptime_seconds gauge"));
    }
}
