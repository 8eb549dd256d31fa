use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{db, models::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
}

/// Liveness check; reports the database separately instead of failing.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match db::health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            false
        }
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
    })
}
