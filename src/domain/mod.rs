//! Booking rules: phone normalization, reminder text and links, status
//! derivation and the scheduling workflow. No I/O lives here.

pub mod message;
pub mod phone;
pub mod scheduling;
pub mod status;
pub mod whatsapp;

pub use message::{Locale, ReminderSettings};
pub use status::{AppointmentFields, AppointmentStatus};
pub use whatsapp::ReminderContact;
