// src/routes/dog_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    events::CalendarRefresh,
    middleware::auth_context::StaffContext,
    models::{
        deserialize_double_option, ApiOk, AppState, BulkDeleteData, BulkDeleteRequest, DogRow,
        OkResponse,
    },
    repo::{AppointmentRepo, ClientRepo, DogInput, DogRepo},
    routes::client_routes::{optional_text, required_text},
};

const NAME_MAX: usize = 255;
const BREED_MAX: usize = 255;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dogs", get(list_dogs).post(create_dog))
        .route("/dogs/bulk_delete", post(bulk_delete_dogs))
        .route(
            "/dogs/{dog_id}",
            get(get_dog).patch(patch_dog).delete(delete_dog),
        )
}

async fn ensure_client_exists(state: &AppState, client_id: i64) -> Result<(), ApiError> {
    ClientRepo::find_by_id(&state.db, client_id)
        .await?
        .ok_or_else(|| ApiError::validation("client_id", "Client not found"))?;
    Ok(())
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct DogListQuery {
    pub client_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDogRequest {
    pub client_id: i64,
    pub name: String,
    pub breed: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchDogRequest {
    pub client_id: Option<i64>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub breed: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
}

impl PatchDogRequest {
    fn merge(&self, current: DogRow) -> Result<DogInput, ApiError> {
        Ok(DogInput {
            client_id: self.client_id.unwrap_or(current.client_id),
            name: match &self.name {
                Some(v) => required_text("name", v, NAME_MAX)?,
                None => current.name,
            },
            breed: match &self.breed {
                Some(v) => optional_text("breed", v.as_deref(), BREED_MAX)?,
                None => current.breed,
            },
            notes: match &self.notes {
                Some(v) => optional_text("notes", v.as_deref(), usize::MAX)?,
                None => current.notes,
            },
        })
    }
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn list_dogs(
    State(state): State<AppState>,
    _staff: StaffContext,
    Query(q): Query<DogListQuery>,
) -> Result<Json<ApiOk<Vec<DogRow>>>, ApiError> {
    let rows = DogRepo::list(&state.db, q.client_id, q.search.as_deref()).await?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn create_dog(
    State(state): State<AppState>,
    staff: StaffContext,
    Json(req): Json<CreateDogRequest>,
) -> Result<Json<ApiOk<DogRow>>, ApiError> {
    let input = DogInput {
        client_id: req.client_id,
        name: required_text("name", &req.name, NAME_MAX)?,
        breed: optional_text("breed", req.breed.as_deref(), BREED_MAX)?,
        notes: optional_text("notes", req.notes.as_deref(), usize::MAX)?,
    };
    ensure_client_exists(&state, input.client_id).await?;

    let row = DogRepo::create(&state.db, &input).await?;
    tracing::info!(dog_id = row.id, client_id = row.client_id, staff = %staff.user_id, "dog created");
    Ok(Json(ApiOk { data: row }))
}

pub async fn get_dog(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(dog_id): Path<i64>,
) -> Result<Json<ApiOk<DogRow>>, ApiError> {
    let row = DogRepo::find_by_id(&state.db, dog_id)
        .await?
        .ok_or_else(|| ApiError::not_found("dog"))?;
    Ok(Json(ApiOk { data: row }))
}

pub async fn patch_dog(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(dog_id): Path<i64>,
    Json(req): Json<PatchDogRequest>,
) -> Result<Json<ApiOk<DogRow>>, ApiError> {
    let current = DogRepo::find_by_id(&state.db, dog_id)
        .await?
        .ok_or_else(|| ApiError::not_found("dog"))?;
    let previous_owner = current.client_id;
    let input = req.merge(current)?;
    if input.client_id != previous_owner {
        ensure_client_exists(&state, input.client_id).await?;
        // Existing appointments name the old owner; moving the dog would orphan them.
        if AppointmentRepo::count_for_dog(&state.db, dog_id).await? > 0 {
            return Err(ApiError::validation(
                "client_id",
                "This dog has appointments and cannot be moved to another client",
            ));
        }
    }

    let row = DogRepo::update(&state.db, dog_id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("dog"))?;
    tracing::info!(dog_id, staff = %staff.user_id, "dog updated");
    Ok(Json(ApiOk { data: row }))
}

/// Also removes the dog's appointments.
pub async fn delete_dog(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(dog_id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    if !DogRepo::delete(&state.db, dog_id).await? {
        return Err(ApiError::not_found("dog"));
    }
    tracing::info!(dog_id, staff = %staff.user_id, "dog deleted");
    state.calendar.publish(CalendarRefresh::DogRemoved { dog_id });
    Ok(Json(OkResponse::ok()))
}

pub async fn bulk_delete_dogs(
    State(state): State<AppState>,
    staff: StaffContext,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<ApiOk<BulkDeleteData>>, ApiError> {
    if req.ids.is_empty() {
        return Err(ApiError::validation("ids", "Select at least one dog"));
    }

    let deleted = DogRepo::delete_many(&state.db, &req.ids).await?;
    for dog_id in &deleted {
        state.calendar.publish(CalendarRefresh::DogRemoved { dog_id: *dog_id });
    }

    tracing::info!(staff = %staff.user_id, deleted = deleted.len(), "dogs bulk deleted");
    Ok(Json(ApiOk {
        data: BulkDeleteData {
            requested: req.ids.len(),
            deleted: deleted.len() as u64,
        },
    }))
}
