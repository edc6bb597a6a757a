//! Health check endpoints for liveness and readiness probes.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::{AppError, ApiResponse};
use crate::AppState;

/// Readiness probe detail.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub pattern_store: BackendStatus,
    pub counter_store: BackendStatus,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub backend: &'static str,
    pub state: String,
}

fn probe(backend: &'static str, result: Result<(), AppError>) -> BackendStatus {
    let state = match result {
        Ok(()) => "connected".to_string(),
        Err(e) => {
            tracing::warn!(backend, error = %e, "Backend health check failed");
            format!("error: {e}")
        }
    };
    BackendStatus { backend, state }
}

/// Liveness probe: always returns OK if the process is running.
pub async fn live() -> &'static str {
    "OK"
}

/// Readiness probe: pings the pattern and counter stores.
pub async fn ready(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let patterns = state.allocator.patterns().store();
    let counters = state.allocator.counters();

    let pattern_store = probe(patterns.name(), patterns.ping().await);
    let counter_store = probe(counters.name(), counters.ping().await);

    let status = if pattern_store.state == "connected" && counter_store.state == "connected" {
        "ok"
    } else {
        "degraded"
    };

    ApiResponse::success(HealthStatus {
        status: status.to_string(),
        pattern_store,
        counter_store,
    })
}
