// src/domain/whatsapp.rs

use chrono::{DateTime, Utc};

use super::message::{ReminderSettings, compose_reminder};
use super::phone::normalize_phone;

const WA_ME_BASE: &str = "https://wa.me/";

/// Per-appointment values a reminder link is built from.
#[derive(Debug, Clone, Default)]
pub struct ReminderContact {
    pub phone: Option<String>,
    pub client_first_name: Option<String>,
    pub dog_name: Option<String>,
}

impl ReminderContact {
    pub fn has_usable_phone(&self) -> bool {
        !normalize_phone(self.phone.as_deref()).is_empty()
    }
}

/// Build a `wa.me` deep link pre-filled with the booking confirmation.
///
/// `None` when the phone has no digits, whatever the other inputs are.
pub fn reminder_link(
    settings: &ReminderSettings,
    contact: &ReminderContact,
    starts_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<String> {
    let phone = normalize_phone(contact.phone.as_deref());
    if phone.is_empty() {
        return None;
    }

    let message = compose_reminder(
        settings,
        contact.client_first_name.as_deref(),
        contact.dog_name.as_deref(),
        starts_at,
        now,
    );

    Some(format!("{WA_ME_BASE}{phone}?text={}", urlencoding::encode(&message)))
}
