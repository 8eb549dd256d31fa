// src/domain/scheduling.rs
//
// Rules shared by the calendar and the pending-appointments list: when a
// WhatsApp confirmation is mandatory, what the reminder panel shows, and the
// sibling-field rules of the appointment form. Everything here is pure; the
// stored record (or `None` when creating) and `now` are always passed in.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use super::message::{Locale, ReminderSettings};
use super::status::{AppointmentFields, AppointmentStatus};
use super::whatsapp::{ReminderContact, reminder_link};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("Confirm that the WhatsApp message will be sent before saving.")]
    ConfirmationRequired,
    #[error("Enter the client's WhatsApp number.")]
    PhoneMissing,
    #[error("A start date and time is required.")]
    StartsAtRequired,
    #[error("The start time must be {earliest} or later.")]
    StartsAtTooEarly { earliest: DateTime<Utc> },
    #[error("A client is required.")]
    ClientRequired,
    #[error("A dog is required.")]
    DogRequired,
    #[error("The selected dog does not belong to the selected client.")]
    DogNotOwnedByClient,
}

impl SchedulingError {
    /// Form field the error is reported against.
    pub fn field(&self) -> &'static str {
        match self {
            SchedulingError::ConfirmationRequired | SchedulingError::PhoneMissing => {
                "reminder_confirmed"
            }
            SchedulingError::StartsAtRequired | SchedulingError::StartsAtTooEarly { .. } => {
                "starts_at"
            }
            SchedulingError::ClientRequired => "client_id",
            SchedulingError::DogRequired | SchedulingError::DogNotOwnedByClient => "dog_id",
        }
    }
}

/* ============================================================
   Appointment form state
   ============================================================ */

/// Values of the appointment form as the UI holds them.
///
/// `reminder_confirmed` is the transient checkbox; it is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentForm {
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub dog_id: Option<i64>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reminder_confirmed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Client,
    Dog,
    StartsAt,
    Status,
    Notes,
    ReminderConfirmed,
}

/// Apply the sibling-field rules after `changed` was edited.
///
/// Picking another client clears the dog; editing the start time resets
/// the status to confirmed or pending.
pub fn apply_field_change(mut form: AppointmentForm, changed: Option<FormField>) -> AppointmentForm {
    match changed {
        Some(FormField::Client) => form.dog_id = None,
        Some(FormField::StartsAt) => {
            form.status = if form.starts_at.is_some() {
                AppointmentStatus::Confirmed
            } else {
                AppointmentStatus::Pending
            };
        }
        _ => {}
    }
    form
}

/// Form opened from an empty calendar slot (or the "new" button).
pub fn create_prefill(start: Option<DateTime<Utc>>) -> AppointmentForm {
    AppointmentForm {
        starts_at: start,
        status: if start.is_some() {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Pending
        },
        ..AppointmentForm::default()
    }
}

/// Form opened on an existing event; `event_start` is set after drag/drop.
pub fn edit_prefill(stored: &AppointmentFields, event_start: Option<DateTime<Utc>>) -> AppointmentForm {
    let starts_at = event_start.or(stored.starts_at);
    let status = match (stored.status, starts_at) {
        (AppointmentStatus::Cancelled, _) => AppointmentStatus::Cancelled,
        (_, Some(_)) => AppointmentStatus::Confirmed,
        (_, None) => AppointmentStatus::Pending,
    };

    AppointmentForm {
        client_id: Some(stored.client_id),
        dog_id: Some(stored.dog_id),
        starts_at,
        status,
        notes: stored.notes.clone(),
        reminder_confirmed: false,
    }
}

/// Convert a submitted form into the fields to persist.
pub fn form_fields(form: &AppointmentForm) -> Result<AppointmentFields, SchedulingError> {
    let client_id = form.client_id.ok_or(SchedulingError::ClientRequired)?;
    let dog_id = form.dog_id.ok_or(SchedulingError::DogRequired)?;
    let notes = form
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(AppointmentFields {
        client_id,
        dog_id,
        starts_at: form.starts_at,
        status: form.status,
        notes,
    })
}

/* ============================================================
   Reminder confirmation
   ============================================================ */

/// Must the user confirm a WhatsApp send before this save?
///
/// Only for the unscheduled → scheduled transition: a candidate time is
/// present and the stored record (if any) had none.
pub fn reminder_required(candidate: Option<DateTime<Utc>>, stored: Option<&AppointmentFields>) -> bool {
    if candidate.is_none() {
        return false;
    }
    !matches!(stored, Some(s) if s.starts_at.is_some())
}

/// Derived state of the WhatsApp section of a form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderPanel {
    /// Section visible and confirmation checkbox mandatory.
    pub required: bool,
    pub link: Option<String>,
    /// Show the "enter the client's WhatsApp number" hint.
    pub phone_missing: bool,
    pub send_enabled: bool,
}

/// Compute the reminder panel. `contact` is `None` when no client is known yet.
pub fn reminder_panel(
    settings: &ReminderSettings,
    required: bool,
    contact: Option<&ReminderContact>,
    starts_at: Option<DateTime<Utc>>,
    confirmed: bool,
    now: DateTime<Utc>,
) -> ReminderPanel {
    let link = match (starts_at, contact) {
        (Some(at), Some(c)) => reminder_link(settings, c, Some(at), now),
        _ => None,
    };
    let has_phone = contact.is_some_and(ReminderContact::has_usable_phone);

    ReminderPanel {
        required,
        phone_missing: required && !has_phone,
        send_enabled: link.is_some() && confirmed,
        link,
    }
}

/// Validation predicate for the confirmation checkbox.
pub fn check_reminder_confirmation(
    required: bool,
    confirmed: bool,
    contact: Option<&ReminderContact>,
) -> Result<(), SchedulingError> {
    if !required {
        return Ok(());
    }
    if !confirmed {
        return Err(SchedulingError::ConfirmationRequired);
    }
    if !contact.is_some_and(ReminderContact::has_usable_phone) {
        return Err(SchedulingError::PhoneMissing);
    }
    Ok(())
}

/// Earliest start time a form accepts: the next whole minute.
pub fn earliest_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let floored = now.duration_trunc(Duration::minutes(1)).unwrap_or(now);
    floored + Duration::minutes(1)
}

/// A start time that is being set or moved must not be in the past.
/// An unchanged stored time is not re-checked.
pub fn check_start_time(
    candidate: Option<DateTime<Utc>>,
    stored: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), SchedulingError> {
    let Some(at) = candidate else {
        return Ok(());
    };
    if stored == Some(at) {
        return Ok(());
    }
    let earliest = earliest_start(now);
    if at < earliest {
        return Err(SchedulingError::StartsAtTooEarly { earliest });
    }
    Ok(())
}

/// Full check for a calendar create/edit submission.
pub fn validate_calendar_submission(
    form: &AppointmentForm,
    stored: Option<&AppointmentFields>,
    contact: Option<&ReminderContact>,
    now: DateTime<Utc>,
) -> Result<AppointmentFields, SchedulingError> {
    let fields = form_fields(form)?;
    check_start_time(form.starts_at, stored.and_then(|s| s.starts_at), now)?;
    let required = reminder_required(form.starts_at, stored);
    check_reminder_confirmation(required, form.reminder_confirmed, contact)?;
    Ok(fields)
}

/* ============================================================
   Pending list: "schedule" action
   ============================================================ */

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_confirmed: bool,
}

/// Rows shown on the pending list: unscheduled and still pending.
pub fn is_awaiting_schedule(stored: &AppointmentFields) -> bool {
    stored.starts_at.is_none() && stored.status == AppointmentStatus::Pending
}

/// Validate the schedule form and return the start time to store.
///
/// The row is unscheduled, so confirmation is always mandatory here.
pub fn validate_schedule_request(
    req: &ScheduleRequest,
    contact: &ReminderContact,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, SchedulingError> {
    let at = req.starts_at.ok_or(SchedulingError::StartsAtRequired)?;
    check_start_time(Some(at), None, now)?;
    check_reminder_confirmation(true, req.reminder_confirmed, Some(contact))?;
    Ok(at)
}

/* ============================================================
   Calendar events
   ============================================================ */

/// `"<dog> - <first last>"`, dropping empty parts.
pub fn event_title(
    dog_name: Option<&str>,
    client_first_name: Option<&str>,
    client_last_name: Option<&str>,
    locale: Locale,
) -> String {
    let client = format!(
        "{} {}",
        client_first_name.unwrap_or_default(),
        client_last_name.unwrap_or_default()
    );
    let parts: Vec<&str> = [dog_name.unwrap_or_default().trim(), client.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        locale.untitled_appointment().to_string()
    } else {
        parts.join(" - ")
    }
}
