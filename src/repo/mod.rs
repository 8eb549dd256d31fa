//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Appointment writes go
//! exclusively through [`AppointmentRepo`] so the status reconciler runs
//! on every save.

use std::str::FromStr;

pub mod appointment_repo;
pub mod client_repo;
pub mod dog_repo;

pub use appointment_repo::{AppointmentChanges, AppointmentRepo, AppointmentSort, GuardedUpdate};
pub use client_repo::{ClientInput, ClientRepo};
pub use dog_repo::{DogInput, DogRepo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction: {other}")),
        }
    }
}

/// `%term%` for ILIKE, or `None` for a blank search.
///
/// `%` and `_` in the term match literally (backslash is the default
/// LIKE escape in Postgres).
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
}
