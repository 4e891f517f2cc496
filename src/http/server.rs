use crate::collector::{MetricsCollector, StatusSnapshot};
use crate::error::{DashboardError, Result};
use crate::export::prometheus::PrometheusExporter;
use crate::http::ws::ws_handler;
use crate::metrics::types::DashboardEvent;
use crate::stage::StageController;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<MetricsCollector>,
    pub stages: Arc<StageController>,
    pub prometheus: PrometheusExporter,
}

impl AppState {
    pub fn new(collector: Arc<MetricsCollector>, stages: Arc<StageController>) -> Self {
        let prometheus = PrometheusExporter::new(Arc::clone(&collector));
        Self {
            collector,
            stages,
            prometheus,
        }
    }
}

pub struct HttpServer {
    addr: SocketAddr,
    state: AppState,
}

impl HttpServer {
    pub fn new(host: &str, port: u16, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| DashboardError::Config(format!("Invalid listen address: {e}")))?;

        Ok(Self { addr, state })
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let app = router(self.state);

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| DashboardError::Http(e.to_string()))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| DashboardError::Http(e.to_string()))?;

        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/metrics", get(metrics_api_handler))
        .route("/api/status", get(status_handler))
        .route("/api/stage/{stage}", post(stage_handler))
        .route("/api/debug/consumer-group", get(debug_consumer_group_handler))
        .route("/ws", get(ws_handler))
        .route("/metrics", get(prometheus_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Runs a fresh collection cycle, waiting for one already in flight.
async fn metrics_api_handler(State(state): State<AppState>) -> Json<Option<DashboardEvent>> {
    Json(
        state
            .collector
            .collect_once()
            .await
            .map(DashboardEvent::Metrics),
    )
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.collector.status().await)
}

#[derive(Debug, Serialize)]
struct StageResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StageResponse {
    fn failure(status: StatusCode, error: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                success: false,
                stage: None,
                error: Some(error.into()),
            }),
        )
            .into_response()
    }
}

async fn stage_handler(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Ok(id) = raw.parse::<u32>() else {
        return StageResponse::failure(StatusCode::BAD_REQUEST, "Invalid stage");
    };

    match state.stages.activate(id).await {
        Ok(activated) => Json(StageResponse {
            success: true,
            stage: Some(activated.stage),
            error: None,
        })
        .into_response(),
        Err(DashboardError::UnknownStage(_)) => {
            StageResponse::failure(StatusCode::BAD_REQUEST, "Invalid stage")
        }
        Err(e) => {
            warn!(stage = id, error = %e, "Stage activation failed");
            StageResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct DebugResponse {
    success: bool,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn debug_consumer_group_handler(State(state): State<AppState>) -> Json<DebugResponse> {
    let output = state.collector.debug_consumer_group().await;
    let error = (!output.success).then_some(output.stderr);
    Json(DebugResponse {
        success: output.success,
        output: output.stdout,
        error,
    })
}

async fn prometheus_handler(State(state): State<AppState>) -> Response {
    let metrics = state.prometheus.render_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics,
    )
        .into_response()
}

async fn health_handler(State(state): State<AppState>) -> Response {
    if state.collector.is_healthy() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Unhealthy").into_response()
    }
}
