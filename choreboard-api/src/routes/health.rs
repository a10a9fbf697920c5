/// Health check endpoint
///
/// Reports process liveness and a database round-trip. Returns 200 with
/// degraded status rather than failing, so load balancers can distinguish
/// "up but unhealthy" from "down".

use axum::{extract::State, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "ok" or "degraded"
    pub status: &'static str,

    /// Database connectivity: "up" or "down"
    pub database: &'static str,

    /// Server version
    pub version: &'static str,
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match choreboard_shared::db::pool::health_check(&state.db).await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!("Health check database probe failed: {}", e);
            "down"
        }
    };

    Json(HealthResponse {
        status: if database == "up" { "ok" } else { "degraded" },
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}
