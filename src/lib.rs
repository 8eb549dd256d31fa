//! Back-office API for a dog-grooming business: clients, dogs and
//! appointments, a calendar with WhatsApp booking reminders, and a list of
//! appointments still waiting for a time slot.

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod middleware;
pub mod models;
pub mod repo;
pub mod routes;

use axum::http::header;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::AppState;

/// Full application: routes plus CORS and request tracing.
pub fn build_app(state: AppState) -> Router {
    // The admin UI is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
