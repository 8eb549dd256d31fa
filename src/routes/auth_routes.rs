use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use crate::{
    auth::{generate_access_token, hash_access_token, session_expiry, verify_password},
    error::ApiError,
    middleware::auth_context::StaffContext,
    models::*,
};

const DEVICE_NAME_MAX: usize = 255;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

/// Normalize the optional device label sent at login.
fn device_label(raw: Option<&str>) -> Option<String> {
    clean_optional(raw).map(|s| s.chars().take(DEVICE_NAME_MAX).collect())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "BAD_REQUEST",
            "username and password are required".into(),
        ));
    }

    // 1) Load staff_user
    let staff: StaffRow = sqlx::query_as::<_, StaffRow>(
        r#"
        SELECT user_id, username, display_name, password_hash, is_active
        FROM staff_user
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(ApiError::invalid_credentials)?;

    // 2) Verify password before revealing anything about the account
    if !verify_password(&req.password, &staff.password_hash) {
        tracing::info!(username, "login rejected: bad credentials");
        return Err(ApiError::invalid_credentials());
    }

    if !staff.is_active {
        return Err(ApiError::Forbidden("FORBIDDEN", "Account is disabled".into()));
    }

    // 3) Create session_token
    let access_token = generate_access_token();
    let token_hash = hash_access_token(&access_token);
    let expires_at = session_expiry(Utc::now(), state.session_ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token (user_id, session_token_hash, device_name, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(staff.user_id)
    .bind(&token_hash)
    .bind(device_label(req.device_name.as_deref()))
    .bind(expires_at)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = %staff.user_id,
        session_token_id = %session.session_token_id,
        "staff logged in"
    );

    Ok(Json(ApiOk {
        data: LoginResponseData {
            access_token,
            expires_at: session.expires_at,
            staff: staff.profile(),
            business_name: state.reminder.business_name.clone(),
        },
    }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: StaffContext,
) -> Result<Json<ApiOk<MeResponseData>>, ApiError> {
    let staff: StaffRow = sqlx::query_as::<_, StaffRow>(
        r#"
        SELECT user_id, username, display_name, password_hash, is_active
        FROM staff_user
        WHERE user_id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .filter(|s| s.is_active)
    .ok_or_else(ApiError::session_expired)?;

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        SELECT session_token_id, expires_at
        FROM session_token
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk {
        data: MeResponseData {
            staff: staff.profile(),
            business_name: state.reminder.business_name.clone(),
            session: SessionInfo {
                session_token_id: session.session_token_id,
                expires_at: session.expires_at,
            },
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: StaffContext,
) -> Result<Json<OkResponse>, ApiError> {
    let rows = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    tracing::info!(user_id = %auth.user_id, "staff logged out");
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_label_is_trimmed_and_capped() {
        assert_eq!(device_label(Some("  front desk ")), Some("front desk".into()));
        assert_eq!(device_label(Some("")), None);
        let long = "x".repeat(DEVICE_NAME_MAX + 10);
        assert_eq!(device_label(Some(&long)).map(|s| s.len()), Some(DEVICE_NAME_MAX));
    }
}
