//! Liveness and store connectivity

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub version: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.auth_service.store();

    let (status, store_status) = match store.health_check().await {
        Ok(()) => ("healthy", format!("{}: connected", store.backend_name())),
        Err(e) => {
            tracing::error!(error = %e, backend = store.backend_name(), "Store health check failed");
            ("unhealthy", format!("{}: unavailable", store.backend_name()))
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        store: store_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /
pub async fn root() -> &'static str {
    "Wallet Auth Server"
}
