use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod calendar_routes;
pub mod client_routes;
pub mod dog_routes;
pub mod health_routes;
pub mod pending_routes;

/// Back-office resources; every handler requires a staff session.
fn admin_router() -> Router<AppState> {
    Router::new()
        .merge(client_routes::router())
        .merge(dog_routes::router())
        .merge(appointment_routes::router())
        .merge(calendar_routes::router())
        .merge(pending_routes::router())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1", admin_router())
        .merge(health_routes::router())
        .with_state(state)
}
