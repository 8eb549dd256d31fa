// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::{
    domain::{
        scheduling::{check_start_time, SchedulingError},
        status::{AppointmentFields, AppointmentStatus, SchedulingState},
        Locale,
    },
    error::ApiError,
    events::CalendarRefresh,
    middleware::auth_context::StaffContext,
    models::{
        clean_optional, deserialize_double_option, input_time, ApiOk, AppState, AppointmentDetailRow,
        AppointmentRow, BulkDeleteData, BulkDeleteRequest, DogRow, OkResponse,
    },
    repo::{AppointmentChanges, AppointmentRepo, AppointmentSort, DogRepo, SortDirection},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/bulk_delete", post(bulk_delete_appointments))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .patch(patch_appointment)
                .delete(delete_appointment),
        )
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
        .route("/appointments/{appointment_id}/restore", post(restore_appointment))
}

/* ============================================================
   Shared checks
   ============================================================ */

/// The dog must exist and belong to `client_id`.
pub(crate) async fn ensure_dog_of_client(
    db: &PgPool,
    client_id: i64,
    dog_id: i64,
) -> Result<DogRow, ApiError> {
    let dog = DogRepo::find_by_id(db, dog_id)
        .await?
        .ok_or_else(|| ApiError::validation("dog_id", "Dog not found"))?;
    if dog.client_id != client_id {
        return Err(SchedulingError::DogNotOwnedByClient.into());
    }
    Ok(dog)
}

pub(crate) fn parse_sort(
    sort: Option<&str>,
    direction: Option<&str>,
    default: AppointmentSort,
) -> Result<(AppointmentSort, SortDirection), ApiError> {
    let sort = match sort.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse()
            .map_err(|e: String| ApiError::BadRequest("BAD_REQUEST", e))?,
        None => default,
    };
    let direction = match direction.map(str::trim).filter(|s| !s.is_empty()) {
        Some(d) => d
            .parse()
            .map_err(|e: String| ApiError::BadRequest("BAD_REQUEST", e))?,
        None => SortDirection::default(),
    };
    Ok((sort, direction))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct AppointmentListItem {
    pub id: i64,
    pub client_id: i64,
    pub client_first_name: String,
    pub client_last_name: String,
    pub dog_id: i64,
    pub dog_name: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub status_label: &'static str,
    pub badge_color: &'static str,
    /// Confirmed rows are rendered emphasized.
    pub highlight: bool,
    pub scheduling_state: SchedulingState,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AppointmentListItem {
    pub fn from_row(row: AppointmentDetailRow, locale: Locale) -> Self {
        Self {
            status_label: row.status.label(locale),
            badge_color: row.status.badge_color(),
            highlight: row.status == AppointmentStatus::Confirmed,
            scheduling_state: SchedulingState::of(row.status, row.starts_at),
            id: row.id,
            client_id: row.client_id,
            client_first_name: row.client_first_name,
            client_last_name: row.client_last_name,
            dog_id: row.dog_id,
            dog_name: row.dog_name,
            starts_at: row.starts_at,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub client_id: i64,
    pub dog_id: i64,
    pub starts_at: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchAppointmentRequest {
    pub client_id: Option<i64>,
    pub dog_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub starts_at: Option<Option<String>>,
    pub status: Option<AppointmentStatus>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
}

impl PatchAppointmentRequest {
    /// Start times without an offset are read in `tz`.
    fn into_changes(self, tz: Tz) -> Result<AppointmentChanges, ApiError> {
        let starts_at = match self.starts_at {
            Some(raw) => Some(input_time("starts_at", raw.as_deref(), tz)?),
            None => None,
        };
        Ok(AppointmentChanges {
            client_id: self.client_id,
            dog_id: self.dog_id,
            starts_at,
            status: self.status,
            notes: self.notes.map(|n| clean_optional(n.as_deref())),
        })
    }
}

/* ============================================================
   GET /appointments
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    _staff: StaffContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentListItem>>>, ApiError> {
    let (sort, direction) = parse_sort(
        q.sort.as_deref(),
        q.direction.as_deref(),
        AppointmentSort::StartsAt,
    )?;

    let rows = AppointmentRepo::list(&state.db, q.search.as_deref(), sort, direction).await?;
    let locale = state.reminder.locale;

    Ok(Json(ApiOk {
        data: rows
            .into_iter()
            .map(|r| AppointmentListItem::from_row(r, locale))
            .collect(),
    }))
}

/* ============================================================
   POST /appointments
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    staff: StaffContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let starts_at = input_time("starts_at", req.starts_at.as_deref(), state.reminder.timezone)?;
    check_start_time(starts_at, None, Utc::now())?;
    ensure_dog_of_client(&state.db, req.client_id, req.dog_id).await?;

    let fields = AppointmentFields {
        client_id: req.client_id,
        dog_id: req.dog_id,
        starts_at,
        status: req.status.unwrap_or_default(),
        notes: clean_optional(req.notes.as_deref()),
    };
    let row = AppointmentRepo::create(&state.db, fields).await?;

    tracing::info!(appointment_id = row.id, staff = %staff.user_id, status = %row.status, "appointment created");
    state.calendar.publish(CalendarRefresh::Saved { appointment_id: row.id });

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<AppointmentListItem>>, ApiError> {
    let row = AppointmentRepo::find_detail(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    Ok(Json(ApiOk {
        data: AppointmentListItem::from_row(row, state.reminder.locale),
    }))
}

/* ============================================================
   PATCH /appointments/{id}
   ============================================================ */

pub async fn patch_appointment(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(appointment_id): Path<i64>,
    Json(req): Json<PatchAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let changes = req.into_changes(state.reminder.timezone)?;
    let moves_start = matches!(changes.starts_at, Some(Some(_)));

    if changes.client_id.is_some() || changes.dog_id.is_some() || moves_start {
        let current = AppointmentRepo::find_by_id(&state.db, appointment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("appointment"))?;
        if let Some(new_start) = changes.starts_at {
            check_start_time(new_start, current.starts_at, Utc::now())?;
        }
        if changes.client_id.is_some() || changes.dog_id.is_some() {
            let merged = changes.apply_to(current.fields());
            ensure_dog_of_client(&state.db, merged.client_id, merged.dog_id).await?;
        }
    }

    let row = AppointmentRepo::update(&state.db, appointment_id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    tracing::info!(appointment_id, staff = %staff.user_id, status = %row.status, "appointment updated");
    state.calendar.publish(CalendarRefresh::Saved { appointment_id });

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   POST /appointments/{id}/cancel | /restore
   ============================================================ */

async fn set_status(
    state: &AppState,
    appointment_id: i64,
    status: AppointmentStatus,
) -> Result<AppointmentRow, ApiError> {
    let changes = AppointmentChanges {
        status: Some(status),
        ..AppointmentChanges::default()
    };
    let row = AppointmentRepo::update(&state.db, appointment_id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;
    state.calendar.publish(CalendarRefresh::Saved { appointment_id });
    Ok(row)
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let row = set_status(&state, appointment_id, AppointmentStatus::Cancelled).await?;
    tracing::info!(appointment_id, staff = %staff.user_id, "appointment cancelled");
    Ok(Json(ApiOk { data: row }))
}

/// Lifts a cancellation; the reconciler then derives pending/confirmed.
pub async fn restore_appointment(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let row = set_status(&state, appointment_id, AppointmentStatus::Pending).await?;
    tracing::info!(appointment_id, staff = %staff.user_id, status = %row.status, "appointment restored");
    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   DELETE /appointments/{id} | POST /appointments/bulk_delete
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    if !AppointmentRepo::delete(&state.db, appointment_id).await? {
        return Err(ApiError::not_found("appointment"));
    }

    tracing::info!(appointment_id, staff = %staff.user_id, "appointment deleted");
    state.calendar.publish(CalendarRefresh::Deleted { appointment_id });
    Ok(Json(OkResponse::ok()))
}

pub async fn bulk_delete_appointments(
    State(state): State<AppState>,
    staff: StaffContext,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<ApiOk<BulkDeleteData>>, ApiError> {
    if req.ids.is_empty() {
        return Err(ApiError::validation("ids", "Select at least one appointment"));
    }

    let deleted = AppointmentRepo::delete_many(&state.db, &req.ids).await?;
    for appointment_id in &deleted {
        state.calendar.publish(CalendarRefresh::Deleted { appointment_id: *appointment_id });
    }

    tracing::info!(staff = %staff.user_id, deleted = deleted.len(), "appointments bulk deleted");
    Ok(Json(ApiOk {
        data: BulkDeleteData {
            requested: req.ids.len(),
            deleted: deleted.len() as u64,
        },
    }))
}
