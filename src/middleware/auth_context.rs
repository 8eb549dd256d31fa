use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::AppState;

/// Authenticated staff member behind the current request.
///
/// Every admin route takes this extractor; requests without a live
/// bearer session are rejected with `SESSION_EXPIRED` before the handler runs.
#[derive(Debug, Clone)]
pub struct StaffContext {
    pub user_id: Uuid,
    pub session_token_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    user_id: Uuid,
}

impl FromRequestParts<AppState> for StaffContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
            TypedHeader::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::session_expired())?;

        let token_hash = hash_access_token(authz.token());

        let row = sqlx::query_as::<_, SessionLookupRow>(
            r#"
            SELECT st.session_token_id, st.user_id
            FROM session_token st
            JOIN staff_user u ON u.user_id = st.user_id
            WHERE st.session_token_hash = $1
              AND st.revoked_at IS NULL
              AND st.expires_at > now()
              AND u.is_active = true
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(ApiError::session_expired)?;

        // best-effort
        if let Err(e) = sqlx::query("UPDATE session_token SET last_seen_at = now() WHERE session_token_id = $1")
            .bind(row.session_token_id)
            .execute(&state.db)
            .await
        {
            tracing::warn!(error = %e, "failed to touch session last_seen_at");
        }

        Ok(StaffContext {
            user_id: row.user_id,
            session_token_id: row.session_token_id,
        })
    }
}
