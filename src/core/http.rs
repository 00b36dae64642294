//! Read-only HTTP API: health, metrics, composite signals, latest batch.

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::core::scheduler::LatestBatch;
use crate::db::Repository;
use crate::metrics::Metrics;
use crate::models::CompositeSignal;

const DEFAULT_SIGNAL_LIMIT: usize = 20;
const MAX_SIGNAL_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub repository: Option<Arc<dyn Repository>>,
    pub latest_batch: LatestBatch,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>, repository: Option<Arc<dyn Repository>>) -> Self {
        Self {
            health: Arc::new(RwLock::new(HealthStatus::default())),
            metrics,
            start_time: Arc::new(Instant::now()),
            repository,
            latest_batch: Arc::new(RwLock::new(None)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let health = state.health.read().await;
    Json(json!({
        "status": health.status,
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "database": state.repository.is_some(),
        "service": "stocksignal"
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    state.metrics.http_requests_in_flight.dec();

    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis() as u64,
            "HTTP request error"
        );
    }
    response
}

#[derive(Debug, Deserialize)]
struct SignalQuery {
    symbol: Option<String>,
    limit: Option<usize>,
}

/// Newest composites for `?symbol=`, or the newest one per symbol.
async fn list_signals(
    State(state): State<AppState>,
    Query(params): Query<SignalQuery>,
) -> Result<Json<Vec<CompositeSignal>>, StatusCode> {
    let repo = state
        .repository
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SIGNAL_LIMIT)
        .clamp(1, MAX_SIGNAL_LIMIT);
    let symbol = params
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_uppercase);

    let signals = repo
        .latest_composites(symbol.as_deref(), limit)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to load composite signals");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(signals))
}

async fn latest_batch(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let latest = state.latest_batch.read().await;
    let summary = latest.as_ref().ok_or(StatusCode::NOT_FOUND)?;
    serde_json::to_value(summary)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/signals", get(list_signals))
        .route("/api/batches/latest", get(latest_batch))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!(port = port, "HTTP server listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
