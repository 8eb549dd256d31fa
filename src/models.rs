use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{AppointmentFields, AppointmentStatus, ReminderContact, ReminderSettings};
use crate::error::ApiError;
use crate::events::CalendarBus;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
    pub pending_poll_seconds: u64,
    pub reminder: Arc<ReminderSettings>,
    pub calendar: CalendarBus,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, cfg: &Config) -> Self {
        Self {
            db,
            session_ttl_hours: cfg.session_ttl_hours,
            pending_poll_seconds: cfg.pending_poll_seconds,
            reminder: Arc::new(cfg.reminder.clone()),
            calendar: CalendarBus::default(),
        }
    }
}

/* -------------------------
   API envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self {
            data: OkData { ok: true },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteData {
    pub requested: usize,
    pub deleted: u64,
}

/* -------------------------
   Staff auth DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub staff: StaffProfile,
    pub business_name: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub staff: StaffProfile,
    pub business_name: String,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct StaffProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct StaffRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_active: bool,
}

impl StaffRow {
    pub fn profile(self) -> StaffProfile {
        StaffProfile {
            user_id: self.user_id,
            username: self.username,
            display_name: self.display_name,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   Business records
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DogRow {
    pub id: i64,
    pub client_id: i64,
    pub name: String,
    pub breed: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppointmentRow {
    pub id: i64,
    pub client_id: i64,
    pub dog_id: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentRow {
    pub fn fields(&self) -> AppointmentFields {
        AppointmentFields {
            client_id: self.client_id,
            dog_id: self.dog_id,
            starts_at: self.starts_at,
            status: self.status,
            notes: self.notes.clone(),
        }
    }
}

/// Appointment joined with its client and dog.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AppointmentDetailRow {
    pub id: i64,
    pub client_id: i64,
    pub dog_id: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_phone: Option<String>,
    pub dog_name: String,
}

impl AppointmentDetailRow {
    pub fn fields(&self) -> AppointmentFields {
        AppointmentFields {
            client_id: self.client_id,
            dog_id: self.dog_id,
            starts_at: self.starts_at,
            status: self.status,
            notes: self.notes.clone(),
        }
    }

    /// Reminder recipient taken from the stored client and dog.
    pub fn contact(&self) -> ReminderContact {
        ReminderContact {
            phone: self.client_phone.clone(),
            client_first_name: Some(self.client_first_name.clone()),
            dog_name: Some(self.dog_name.clone()),
        }
    }
}

/* -------------------------
   Serde helpers
--------------------------*/

/// Tell "field absent" (`None`) from "field set to null" (`Some(None)`).
/// Use with `#[serde(default, deserialize_with = "...")]`.
pub fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/// Trim an optional text input; blank means "no value".
pub fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/* -------------------------
   Date-time inputs
--------------------------*/

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a date-time typed into a form or query string.
///
/// RFC 3339 values keep their offset. Values without an offset, such as
/// `2025-06-01T10:00` from a date-time picker, are wall-clock times in `tz`.
/// A `+` that arrived unescaped in a query string shows up as a space and
/// is accepted too.
pub fn parse_input_time(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Some(at.with_timezone(&Utc));
    }
    for fmt in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            // in a DST gap nothing matches; in the autumn overlap take the first
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|at| at.with_timezone(&Utc));
        }
    }
    if let Some((head, offset)) = raw.rsplit_once(' ') {
        let repaired = format!("{head}+{offset}");
        if let Ok(at) = DateTime::parse_from_rfc3339(&repaired) {
            return Some(at.with_timezone(&Utc));
        }
    }
    None
}

/// Optional date-time field of a request; blank means "no value".
pub fn input_time(field: &'static str, raw: Option<&str>, tz: Tz) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    parse_input_time(raw, tz).map(Some).ok_or_else(|| {
        ApiError::validation(
            field,
            format!("{field} must be a date and time like 2025-06-01T10:00"),
        )
    })
}
