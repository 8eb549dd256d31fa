//! Shared helpers for the HTTP integration tests.
#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

use zagadogs_admin::auth::hash_password;
use zagadogs_admin::config::Config;
use zagadogs_admin::domain::ReminderSettings;
use zagadogs_admin::models::AppState;

pub const STAFF_USERNAME: &str = "desk";
pub const STAFF_PASSWORD: &str = "correct horse battery";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused@127.0.0.1:1/unused".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        session_ttl_hours: 24,
        db_max_connections: 2,
        pending_poll_seconds: 5,
        reminder: ReminderSettings::default(),
    }
}

pub fn build_test_app(pool: PgPool) -> Router {
    zagadogs_admin::build_app(AppState::new(pool, &test_config()))
}

/// App over a pool that never connects; for requests rejected before any query.
pub fn build_offline_app() -> Router {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(300))
        .connect_lazy(&test_config().database_url)
        .expect("lazy pool");
    build_test_app(pool)
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(req.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str, token: Option<&str>) -> Response<Body> {
    send(app, Method::GET, uri, token, None).await
}

pub async fn post_json(app: Router, uri: &str, token: Option<&str>, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, token, Some(body)).await
}

pub async fn patch_json(app: Router, uri: &str, token: Option<&str>, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PATCH, uri, token, Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Insert the test staff account.
pub async fn seed_staff(pool: &PgPool) {
    let hash = hash_password(STAFF_PASSWORD).unwrap();
    sqlx::query("INSERT INTO staff_user (username, display_name, password_hash) VALUES ($1, $2, $3)")
        .bind(STAFF_USERNAME)
        .bind("Front Desk")
        .bind(hash)
        .execute(pool)
        .await
        .unwrap();
}

/// Seed staff and log in; returns the bearer token.
pub async fn login(app: Router, pool: &PgPool) -> String {
    seed_staff(pool).await;
    let response = post_json(
        app,
        "/api/v1/auth/login",
        None,
        serde_json::json!({ "username": STAFF_USERNAME, "password": STAFF_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), 200);
    let json = body_json(response).await;
    json["data"]["access_token"].as_str().unwrap().to_string()
}
