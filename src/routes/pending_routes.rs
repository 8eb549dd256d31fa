// src/routes/pending_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::scheduling::{
        earliest_start, is_awaiting_schedule, reminder_panel, validate_schedule_request,
        ReminderPanel, ScheduleRequest,
    },
    error::ApiError,
    events::CalendarRefresh,
    middleware::auth_context::StaffContext,
    models::{input_time, ApiOk, AppState, AppointmentDetailRow, AppointmentRow},
    repo::{AppointmentChanges, AppointmentRepo, AppointmentSort, GuardedUpdate},
    routes::appointment_routes::parse_sort,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pending-appointments", get(list_pending))
        .route(
            "/pending-appointments/{appointment_id}/schedule",
            get(schedule_form).post(schedule_appointment),
        )
}

fn already_scheduled() -> ApiError {
    ApiError::Conflict(
        "CONFLICT",
        "This appointment is no longer waiting to be scheduled".into(),
    )
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub sort: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingItem {
    pub id: i64,
    pub client_id: i64,
    pub client_first_name: String,
    pub client_last_name: String,
    pub dog_id: i64,
    pub dog_name: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AppointmentDetailRow> for PendingItem {
    fn from(r: AppointmentDetailRow) -> Self {
        Self {
            id: r.id,
            client_id: r.client_id,
            client_first_name: r.client_first_name,
            client_last_name: r.client_last_name,
            dog_id: r.dog_id,
            dog_name: r.dog_name,
            notes: r.notes,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingListData {
    /// The list view re-fetches on this interval.
    pub poll_interval_seconds: u64,
    pub items: Vec<PendingItem>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleFormQuery {
    pub starts_at: Option<String>,
    #[serde(default)]
    pub reminder_confirmed: bool,
}

/// Body of the schedule action; `starts_at` may lack an offset.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleInput {
    pub starts_at: Option<String>,
    pub reminder_confirmed: bool,
}

impl ScheduleInput {
    fn into_request(self, tz: chrono_tz::Tz) -> Result<ScheduleRequest, ApiError> {
        Ok(ScheduleRequest {
            starts_at: input_time("starts_at", self.starts_at.as_deref(), tz)?,
            reminder_confirmed: self.reminder_confirmed,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleFormData {
    pub appointment: PendingItem,
    pub starts_at: Option<DateTime<Utc>>,
    pub earliest_start: DateTime<Utc>,
    pub reminder: ReminderPanel,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResultData {
    pub appointment: AppointmentRow,
    pub whatsapp_link: Option<String>,
}

/* ============================================================
   GET /pending-appointments
   ============================================================ */

pub async fn list_pending(
    State(state): State<AppState>,
    _staff: StaffContext,
    Query(q): Query<PendingQuery>,
) -> Result<Json<ApiOk<PendingListData>>, ApiError> {
    let (sort, direction) = parse_sort(
        q.sort.as_deref(),
        q.direction.as_deref(),
        AppointmentSort::CreatedAt,
    )?;
    if !matches!(
        sort,
        AppointmentSort::Client | AppointmentSort::Dog | AppointmentSort::CreatedAt
    ) {
        return Err(ApiError::BadRequest(
            "BAD_REQUEST",
            "pending appointments sort by client, dog or created_at".into(),
        ));
    }

    let rows = AppointmentRepo::list_pending(&state.db, sort, direction).await?;

    Ok(Json(ApiOk {
        data: PendingListData {
            poll_interval_seconds: state.pending_poll_seconds,
            items: rows.into_iter().map(PendingItem::from).collect(),
        },
    }))
}

/* ============================================================
   GET /pending-appointments/{id}/schedule
   ============================================================ */

pub async fn schedule_form(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(appointment_id): Path<i64>,
    Query(q): Query<ScheduleFormQuery>,
) -> Result<Json<ApiOk<ScheduleFormData>>, ApiError> {
    let detail = AppointmentRepo::find_detail(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;
    if !is_awaiting_schedule(&detail.fields()) {
        return Err(already_scheduled());
    }

    let starts_at = input_time("starts_at", q.starts_at.as_deref(), state.reminder.timezone)?;
    let now = Utc::now();
    let contact = detail.contact();
    let reminder = reminder_panel(
        &state.reminder,
        true,
        Some(&contact),
        starts_at,
        q.reminder_confirmed,
        now,
    );

    Ok(Json(ApiOk {
        data: ScheduleFormData {
            appointment: PendingItem::from(detail),
            starts_at,
            earliest_start: earliest_start(now),
            reminder,
        },
    }))
}

/* ============================================================
   POST /pending-appointments/{id}/schedule
   ============================================================ */

pub async fn schedule_appointment(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(appointment_id): Path<i64>,
    Json(input): Json<ScheduleInput>,
) -> Result<Json<ApiOk<ScheduleResultData>>, ApiError> {
    let req = input.into_request(state.reminder.timezone)?;
    let detail = AppointmentRepo::find_detail(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;
    if !is_awaiting_schedule(&detail.fields()) {
        return Err(already_scheduled());
    }

    let contact = detail.contact();
    let now = Utc::now();
    let starts_at = validate_schedule_request(&req, &contact, now)?;

    let changes = AppointmentChanges {
        starts_at: Some(Some(starts_at)),
        ..AppointmentChanges::default()
    };
    let row = match AppointmentRepo::update_guarded(&state.db, appointment_id, &changes, is_awaiting_schedule)
        .await?
    {
        GuardedUpdate::Updated(row) => row,
        GuardedUpdate::NotFound => return Err(ApiError::not_found("appointment")),
        GuardedUpdate::Rejected => return Err(already_scheduled()),
    };

    tracing::info!(
        appointment_id,
        staff = %staff.user_id,
        starts_at = %starts_at,
        "pending appointment scheduled"
    );
    state.calendar.publish(CalendarRefresh::Scheduled { appointment_id });

    let whatsapp_link =
        crate::domain::whatsapp::reminder_link(&state.reminder, &contact, Some(starts_at), now);

    Ok(Json(ApiOk {
        data: ScheduleResultData {
            appointment: row,
            whatsapp_link,
        },
    }))
}
