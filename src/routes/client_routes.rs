// src/routes/client_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::auth_context::StaffContext,
    models::{clean_optional, ApiOk, AppState, ClientRow, DogRow, OkResponse},
    repo::{AppointmentRepo, ClientInput, ClientRepo, DogRepo},
    routes::appointment_routes::AppointmentListItem,
};

const NAME_MAX: usize = 255;
const PHONE_MAX: usize = 50;
const EMAIL_MAX: usize = 255;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/{client_id}",
            get(get_client).patch(patch_client).delete(delete_client),
        )
        .route("/clients/{client_id}/dogs", get(list_client_dogs))
        .route("/clients/{client_id}/appointments", get(list_client_appointments))
}

/* ============================================================
   Field validation (shared with dogs)
   ============================================================ */

pub(crate) fn required_text(field: &'static str, value: &str, max: usize) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::validation(field, format!("{field} is required")));
    }
    if v.chars().count() > max {
        return Err(ApiError::validation(field, format!("{field} must be at most {max} characters")));
    }
    Ok(v.to_string())
}

pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ApiError> {
    let v = clean_optional(value);
    if let Some(s) = &v {
        if s.chars().count() > max {
            return Err(ApiError::validation(field, format!("{field} must be at most {max} characters")));
        }
    }
    Ok(v)
}

fn optional_email(value: Option<&str>) -> Result<Option<String>, ApiError> {
    let v = optional_text("email", value, EMAIL_MAX)?;
    if let Some(s) = &v {
        if !s.contains('@') {
            return Err(ApiError::validation("email", "email is not valid"));
        }
    }
    Ok(v)
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl CreateClientRequest {
    fn validate(&self) -> Result<ClientInput, ApiError> {
        Ok(ClientInput {
            first_name: required_text("first_name", &self.first_name, NAME_MAX)?,
            last_name: required_text("last_name", &self.last_name, NAME_MAX)?,
            phone: optional_text("phone", self.phone.as_deref(), PHONE_MAX)?,
            email: optional_email(self.email.as_deref())?,
        })
    }
}

/// Absent fields are kept; an empty string clears phone or email.
#[derive(Debug, Deserialize)]
pub struct PatchClientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl PatchClientRequest {
    fn merge(&self, current: ClientRow) -> Result<ClientInput, ApiError> {
        Ok(ClientInput {
            first_name: match &self.first_name {
                Some(v) => required_text("first_name", v, NAME_MAX)?,
                None => current.first_name,
            },
            last_name: match &self.last_name {
                Some(v) => required_text("last_name", v, NAME_MAX)?,
                None => current.last_name,
            },
            phone: match &self.phone {
                Some(v) => optional_text("phone", Some(v.as_str()), PHONE_MAX)?,
                None => current.phone,
            },
            email: match &self.email {
                Some(v) => optional_email(Some(v.as_str()))?,
                None => current.email,
            },
        })
    }
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn list_clients(
    State(state): State<AppState>,
    _staff: StaffContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<ClientRow>>>, ApiError> {
    let rows = ClientRepo::search(&state.db, q.search.as_deref()).await?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn create_client(
    State(state): State<AppState>,
    staff: StaffContext,
    Json(req): Json<CreateClientRequest>,
) -> Result<Json<ApiOk<ClientRow>>, ApiError> {
    let input = req.validate()?;
    let row = ClientRepo::create(&state.db, &input).await?;
    tracing::info!(client_id = row.id, staff = %staff.user_id, "client created");
    Ok(Json(ApiOk { data: row }))
}

pub async fn get_client(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(client_id): Path<i64>,
) -> Result<Json<ApiOk<ClientRow>>, ApiError> {
    let row = ClientRepo::find_by_id(&state.db, client_id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    Ok(Json(ApiOk { data: row }))
}

pub async fn patch_client(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(client_id): Path<i64>,
    Json(req): Json<PatchClientRequest>,
) -> Result<Json<ApiOk<ClientRow>>, ApiError> {
    let current = ClientRepo::find_by_id(&state.db, client_id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    let input = req.merge(current)?;

    let row = ClientRepo::update(&state.db, client_id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    tracing::info!(client_id, staff = %staff.user_id, "client updated");
    Ok(Json(ApiOk { data: row }))
}

/// Also removes the client's dogs and appointments.
pub async fn delete_client(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(client_id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    if !ClientRepo::delete(&state.db, client_id).await? {
        return Err(ApiError::not_found("client"));
    }
    tracing::info!(client_id, staff = %staff.user_id, "client deleted");
    state.calendar.publish(crate::events::CalendarRefresh::ClientRemoved { client_id });
    Ok(Json(OkResponse::ok()))
}

pub async fn list_client_dogs(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(client_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<DogRow>>>, ApiError> {
    ClientRepo::find_by_id(&state.db, client_id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    let rows = DogRepo::list(&state.db, Some(client_id), None).await?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn list_client_appointments(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(client_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<AppointmentListItem>>>, ApiError> {
    ClientRepo::find_by_id(&state.db, client_id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    let rows = AppointmentRepo::list_for_client(&state.db, client_id).await?;
    let locale = state.reminder.locale;
    Ok(Json(ApiOk {
        data: rows
            .into_iter()
            .map(|r| AppointmentListItem::from_row(r, locale))
            .collect(),
    }))
}
