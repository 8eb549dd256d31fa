// src/routes/calendar_routes.rs
//
// Calendar view: events feed, appointment form prefill and derived-field
// recomputation, create/edit with the WhatsApp confirmation rule, and a
// server-sent refresh stream.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};

use crate::{
    domain::{
        scheduling::{
            apply_field_change, create_prefill, earliest_start, edit_prefill, event_title,
            reminder_panel, reminder_required, validate_calendar_submission, AppointmentForm,
            FormField, ReminderPanel,
        },
        status::{AppointmentFields, AppointmentStatus},
        whatsapp::{reminder_link, ReminderContact},
    },
    error::ApiError,
    events::CalendarRefresh,
    middleware::auth_context::StaffContext,
    models::{input_time, parse_input_time, ApiOk, AppState, AppointmentRow},
    repo::{AppointmentChanges, AppointmentRepo, ClientRepo, DogRepo},
    routes::appointment_routes::ensure_dog_of_client,
};

const EVENT_COLOR: &str = "#16a34a";
const EVENT_TEXT_COLOR: &str = "#ffffff";
const EVENT_BORDER_COLOR: &str = "#15803d";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calendar/config", get(calendar_config))
        .route("/calendar/events", get(calendar_events))
        .route("/calendar/stream", get(calendar_stream))
        .route("/calendar/form", get(create_form))
        .route("/calendar/form/derive", post(derive_form))
        .route("/calendar/appointments", post(create_from_calendar))
        .route("/calendar/appointments/{appointment_id}", patch(edit_from_calendar))
        .route("/calendar/appointments/{appointment_id}/form", get(edit_form))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct CalendarConfig {
    pub display: &'static str,
    pub event_color: &'static str,
    pub text_color: &'static str,
    pub border_color: &'static str,
    pub timezone: String,
    pub locale: crate::domain::Locale,
}

#[derive(Debug, Serialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub title: String,
    pub start: DateTime<Utc>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

impl RangeQuery {
    fn bounds(&self, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
        let parse = |name: &str, raw: &str| {
            parse_input_time(raw, tz).ok_or_else(|| {
                ApiError::BadRequest("BAD_REQUEST", format!("{name} is not a valid date-time: {raw}"))
            })
        };
        let start = parse("start", &self.start)?;
        let end = parse("end", &self.end)?;
        if end < start {
            return Err(ApiError::BadRequest(
                "BAD_REQUEST",
                "end must not be before start".into(),
            ));
        }
        Ok((start, end))
    }
}

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub start: Option<String>,
}

/// Appointment form as posted by the UI; `starts_at` may lack an offset.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormInput {
    pub client_id: Option<i64>,
    pub dog_id: Option<i64>,
    pub starts_at: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub reminder_confirmed: bool,
}

impl FormInput {
    fn into_form(self, tz: Tz) -> Result<AppointmentForm, ApiError> {
        Ok(AppointmentForm {
            client_id: self.client_id,
            dog_id: self.dog_id,
            starts_at: input_time("starts_at", self.starts_at.as_deref(), tz)?,
            status: self.status,
            notes: self.notes,
            reminder_confirmed: self.reminder_confirmed,
        })
    }
}

/// Form values plus everything the UI derives from them.
#[derive(Debug, Serialize)]
pub struct FormState {
    pub record_id: Option<i64>,
    pub form: AppointmentForm,
    pub reminder: ReminderPanel,
    pub earliest_start: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DeriveRequest {
    pub record_id: Option<i64>,
    pub changed: Option<FormField>,
    pub form: FormInput,
}

#[derive(Debug, Serialize)]
pub struct CalendarSaveData {
    pub appointment: AppointmentRow,
    /// Set when this save scheduled the appointment; the UI opens it.
    pub whatsapp_link: Option<String>,
}

/* ============================================================
   Helpers
   ============================================================ */

/// Stored record of an existing appointment with its reminder contact.
async fn load_stored(
    state: &AppState,
    appointment_id: i64,
) -> Result<(AppointmentFields, ReminderContact), ApiError> {
    let detail = AppointmentRepo::find_detail(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;
    Ok((detail.fields(), detail.contact()))
}

/// Reminder contact for a form that is not saved yet.
async fn contact_from_form(
    state: &AppState,
    form: &AppointmentForm,
) -> Result<Option<ReminderContact>, ApiError> {
    let Some(client_id) = form.client_id else {
        return Ok(None);
    };
    let Some(client) = ClientRepo::find_by_id(&state.db, client_id).await? else {
        return Ok(None);
    };

    let dog_name = match form.dog_id {
        Some(dog_id) => DogRepo::find_by_id(&state.db, dog_id)
            .await?
            .filter(|d| d.client_id == client.id)
            .map(|d| d.name),
        None => None,
    };

    Ok(Some(ReminderContact {
        phone: client.phone,
        client_first_name: Some(client.first_name),
        dog_name,
    }))
}

fn form_state(
    state: &AppState,
    record_id: Option<i64>,
    form: AppointmentForm,
    stored: Option<&AppointmentFields>,
    contact: Option<&ReminderContact>,
) -> FormState {
    let now = Utc::now();
    let required = reminder_required(form.starts_at, stored);
    let reminder = reminder_panel(
        &state.reminder,
        required,
        contact,
        form.starts_at,
        form.reminder_confirmed,
        now,
    );
    FormState {
        record_id,
        form,
        reminder,
        earliest_start: earliest_start(now),
    }
}

/* ============================================================
   GET /calendar/config | /calendar/events
   ============================================================ */

pub async fn calendar_config(
    State(state): State<AppState>,
    _staff: StaffContext,
) -> Json<ApiOk<CalendarConfig>> {
    Json(ApiOk {
        data: CalendarConfig {
            display: "block",
            event_color: EVENT_COLOR,
            text_color: EVENT_TEXT_COLOR,
            border_color: EVENT_BORDER_COLOR,
            timezone: state.reminder.timezone.name().to_string(),
            locale: state.reminder.locale,
        },
    })
}

pub async fn calendar_events(
    State(state): State<AppState>,
    _staff: StaffContext,
    Query(q): Query<RangeQuery>,
) -> Result<Json<ApiOk<Vec<CalendarEvent>>>, ApiError> {
    let (start, end) = q.bounds(state.reminder.timezone)?;
    let rows = AppointmentRepo::list_between(&state.db, start, end).await?;
    let locale = state.reminder.locale;

    let events = rows
        .into_iter()
        .filter_map(|r| {
            let start = r.starts_at?;
            Some(CalendarEvent {
                id: r.id,
                title: event_title(
                    Some(&r.dog_name),
                    Some(&r.client_first_name),
                    Some(&r.client_last_name),
                    locale,
                ),
                start,
                status: r.status,
            })
        })
        .collect();

    Ok(Json(ApiOk { data: events }))
}

/* ============================================================
   GET /calendar/stream
   ============================================================ */

pub async fn calendar_stream(
    State(state): State<AppState>,
    _staff: StaffContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.calendar.subscribe()).filter_map(|msg| {
        let event = match msg {
            Ok(refresh) => Event::default().event("refresh").json_data(refresh).ok()?,
            // missed some signals; one refresh covers them all
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "calendar stream lagged");
                Event::default().event("refresh").data("{}")
            }
        };
        Some(Ok(event))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/* ============================================================
   Form prefill + derived fields
   ============================================================ */

pub async fn create_form(
    State(state): State<AppState>,
    _staff: StaffContext,
    Query(q): Query<StartQuery>,
) -> Result<Json<ApiOk<FormState>>, ApiError> {
    let start = input_time("start", q.start.as_deref(), state.reminder.timezone)?;
    let form = create_prefill(start);
    Ok(Json(ApiOk {
        data: form_state(&state, None, form, None, None),
    }))
}

pub async fn edit_form(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(appointment_id): Path<i64>,
    Query(q): Query<StartQuery>,
) -> Result<Json<ApiOk<FormState>>, ApiError> {
    let start = input_time("start", q.start.as_deref(), state.reminder.timezone)?;
    let (stored, contact) = load_stored(&state, appointment_id).await?;
    let form = edit_prefill(&stored, start);
    Ok(Json(ApiOk {
        data: form_state(&state, Some(appointment_id), form, Some(&stored), Some(&contact)),
    }))
}

pub async fn derive_form(
    State(state): State<AppState>,
    _staff: StaffContext,
    Json(req): Json<DeriveRequest>,
) -> Result<Json<ApiOk<FormState>>, ApiError> {
    let form = apply_field_change(req.form.into_form(state.reminder.timezone)?, req.changed);

    let data = match req.record_id {
        Some(id) => {
            let (stored, contact) = load_stored(&state, id).await?;
            form_state(&state, Some(id), form, Some(&stored), Some(&contact))
        }
        None => {
            let contact = contact_from_form(&state, &form).await?;
            form_state(&state, None, form, None, contact.as_ref())
        }
    };

    Ok(Json(ApiOk { data }))
}

/* ============================================================
   POST /calendar/appointments | PATCH /calendar/appointments/{id}
   ============================================================ */

fn link_if_scheduling(
    state: &AppState,
    required: bool,
    contact: Option<&ReminderContact>,
    starts_at: Option<DateTime<Utc>>,
) -> Option<String> {
    if !required {
        return None;
    }
    reminder_link(&state.reminder, contact?, starts_at, Utc::now())
}

pub async fn create_from_calendar(
    State(state): State<AppState>,
    staff: StaffContext,
    Json(input): Json<FormInput>,
) -> Result<Json<ApiOk<CalendarSaveData>>, ApiError> {
    let form = input.into_form(state.reminder.timezone)?;
    let contact = contact_from_form(&state, &form).await?;
    let fields = validate_calendar_submission(&form, None, contact.as_ref(), Utc::now())?;
    ensure_dog_of_client(&state.db, fields.client_id, fields.dog_id).await?;

    let required = reminder_required(fields.starts_at, None);
    let row = AppointmentRepo::create(&state.db, fields).await?;

    tracing::info!(
        appointment_id = row.id,
        staff = %staff.user_id,
        status = %row.status,
        reminder = required,
        "appointment created from calendar"
    );
    state.calendar.publish(CalendarRefresh::Saved { appointment_id: row.id });

    let whatsapp_link = link_if_scheduling(&state, required, contact.as_ref(), row.starts_at);
    Ok(Json(ApiOk {
        data: CalendarSaveData {
            appointment: row,
            whatsapp_link,
        },
    }))
}

pub async fn edit_from_calendar(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(appointment_id): Path<i64>,
    Json(input): Json<FormInput>,
) -> Result<Json<ApiOk<CalendarSaveData>>, ApiError> {
    let form = input.into_form(state.reminder.timezone)?;
    let (stored, contact) = load_stored(&state, appointment_id).await?;
    let fields = validate_calendar_submission(&form, Some(&stored), Some(&contact), Utc::now())?;
    ensure_dog_of_client(&state.db, fields.client_id, fields.dog_id).await?;

    let required = reminder_required(fields.starts_at, Some(&stored));
    let row = AppointmentRepo::update(
        &state.db,
        appointment_id,
        &AppointmentChanges::replace_with(fields),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("appointment"))?;

    tracing::info!(
        appointment_id,
        staff = %staff.user_id,
        status = %row.status,
        reminder = required,
        "appointment updated from calendar"
    );
    state.calendar.publish(CalendarRefresh::Saved { appointment_id });

    let whatsapp_link = link_if_scheduling(&state, required, Some(&contact), row.starts_at);
    Ok(Json(ApiOk {
        data: CalendarSaveData {
            appointment: row,
            whatsapp_link,
        },
    }))
}
