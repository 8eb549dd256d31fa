// src/domain/status.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Locale;

/// Stored appointment status. Only `Cancelled` is ever chosen by a person;
/// the other two are a projection of `starts_at` (see [`derive_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (AppointmentStatus::Pending, Locale::En) => "Pending",
            (AppointmentStatus::Confirmed, Locale::En) => "Confirmed",
            (AppointmentStatus::Cancelled, Locale::En) => "Cancelled",
            (AppointmentStatus::Pending, Locale::It) => "In attesa",
            (AppointmentStatus::Confirmed, Locale::It) => "Confermata",
            (AppointmentStatus::Cancelled, Locale::It) => "Annullata",
        }
    }

    /// Badge colour name used by the list views.
    pub fn badge_color(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "warning",
            AppointmentStatus::Confirmed => "success",
            AppointmentStatus::Cancelled => "danger",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown appointment status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Scheduling state as seen by the calendar, independent of the stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingState {
    Unscheduled,
    Scheduled,
    Cancelled,
}

impl SchedulingState {
    pub fn of(status: AppointmentStatus, starts_at: Option<DateTime<Utc>>) -> Self {
        match (status, starts_at) {
            (AppointmentStatus::Cancelled, _) => SchedulingState::Cancelled,
            (_, Some(_)) => SchedulingState::Scheduled,
            (_, None) => SchedulingState::Unscheduled,
        }
    }
}

/// Status an appointment must carry after a save.
///
/// Cancelled is sticky; otherwise confirmed iff a start time is set.
pub fn derive_status(
    current: AppointmentStatus,
    starts_at: Option<DateTime<Utc>>,
) -> AppointmentStatus {
    match (current, starts_at) {
        (AppointmentStatus::Cancelled, _) => AppointmentStatus::Cancelled,
        (_, Some(_)) => AppointmentStatus::Confirmed,
        (_, None) => AppointmentStatus::Pending,
    }
}

/// Persisted fields of an appointment, as stored or about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentFields {
    pub client_id: i64,
    pub dog_id: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

/// Pre-commit hook run on every appointment insert and update.
///
/// Applies on every save, including edits that only touch notes.
pub fn reconcile(mut fields: AppointmentFields) -> AppointmentFields {
    let derived = derive_status(fields.status, fields.starts_at);
    if derived != fields.status {
        tracing::debug!(
            from = %fields.status,
            to = %derived,
            "appointment status re-derived from starts_at"
        );
    }
    fields.status = derived;
    fields
}
