use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Instant;
use utoipa::ToSchema;

use crate::{handlers::AppState, ApiResponse};

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub database: ComponentStatus,
    pub uptime_secs: u64,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map_or(0, |start| start.elapsed().as_secs())
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    summary = "Health check",
    responses(
        (status = 200, description = "Service healthy", body = ApiResponse<HealthResponse>),
        (status = 503, description = "Database unreachable", body = ApiResponse<HealthResponse>),
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Response {
    // Without a database handle the service runs on the in-memory repository.
    let database = match &state.db {
        Some(db) => match crate::db::check_connection(db).await {
            Ok(()) => ComponentStatus::Up,
            Err(err) => {
                tracing::error!(error = %err, "database health check failed");
                ComponentStatus::Down
            }
        },
        None => ComponentStatus::Up,
    };

    let body = HealthResponse {
        status: database,
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        uptime_secs: uptime_secs(),
    };

    let status = match database {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(ApiResponse::new(status, "health", body))).into_response()
}
