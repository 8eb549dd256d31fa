// src/domain/message.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Language used for reminder text, status labels and calendar fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    It,
}

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const MONTHS_IT: [&str; 12] = [
    "gennaio", "febbraio", "marzo", "aprile", "maggio", "giugno", "luglio", "agosto", "settembre",
    "ottobre", "novembre", "dicembre",
];

impl Locale {
    pub fn month_name(self, month: u32) -> &'static str {
        let idx = (month.clamp(1, 12) - 1) as usize;
        match self {
            Locale::En => MONTHS_EN[idx],
            Locale::It => MONTHS_IT[idx],
        }
    }

    fn today_at(self, time: &str) -> String {
        match self {
            Locale::En => format!("today at {time}"),
            Locale::It => format!("oggi alle ore {time}"),
        }
    }

    fn tomorrow_at(self, time: &str) -> String {
        match self {
            Locale::En => format!("tomorrow at {time}"),
            Locale::It => format!("domani alle ore {time}"),
        }
    }

    fn on_date_at(self, day: u32, month: u32, time: &str) -> String {
        let month = self.month_name(month);
        match self {
            Locale::En => format!("on {day} {month} at {time}"),
            Locale::It => format!("il {day} {month} alle ore {time}"),
        }
    }

    fn greeting(self, name: &str) -> String {
        let hi = match self {
            Locale::En => "Hi",
            Locale::It => "Ciao",
        };
        if name.is_empty() {
            format!("{hi},")
        } else {
            format!("{hi} {name},")
        }
    }

    fn confirmation(self, when: &str) -> String {
        match (self, when.is_empty()) {
            (Locale::En, true) => "booking confirmed.".to_string(),
            // "for on 14 June" reads badly; the date phrase drops its "on" here
            (Locale::En, false) => {
                let when = when.strip_prefix("on ").unwrap_or(when);
                format!("booking confirmed for {when}.")
            }
            (Locale::It, true) => "prenotazione confermata.".to_string(),
            (Locale::It, false) => format!("prenotazione confermata per {when}."),
        }
    }

    fn dog_line(self, dog: &str) -> String {
        match self {
            Locale::En => format!("Dog: {dog}."),
            Locale::It => format!("Cane: {dog}."),
        }
    }

    fn signature(self, business: &str) -> String {
        match (self, business.is_empty()) {
            (Locale::En, true) => "Regards!".to_string(),
            (Locale::En, false) => format!("Regards from {business}!"),
            (Locale::It, true) => "Saluti!".to_string(),
            (Locale::It, false) => format!("Saluti da {business}!"),
        }
    }

    /// Title used for a calendar event with neither dog nor client name.
    pub fn untitled_appointment(self) -> &'static str {
        match self {
            Locale::En => "Appointment",
            Locale::It => "Appuntamento",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Locale::En => "en",
            Locale::It => "it",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported locale: {0} (expected \"en\" or \"it\")")]
pub struct UnknownLocale(String);

impl FromStr for Locale {
    type Err = UnknownLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "en-gb" | "en-us" => Ok(Locale::En),
            "it" | "it-it" => Ok(Locale::It),
            other => Err(UnknownLocale(other.to_string())),
        }
    }
}

/// Everything the composer needs besides the per-appointment values.
#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub business_name: String,
    pub locale: Locale,
    pub timezone: Tz,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            business_name: "Zagadogs".to_string(),
            locale: Locale::En,
            timezone: chrono_tz::Europe::Rome,
        }
    }
}

/// Human phrase for when an appointment happens, relative to `now`.
///
/// Both dates are compared in `starts_at`'s own zone. Returns an empty
/// string when there is no start time.
pub fn time_phrase<Z>(starts_at: Option<&DateTime<Z>>, now: DateTime<Utc>, locale: Locale) -> String
where
    Z: TimeZone,
    Z::Offset: fmt::Display,
{
    let Some(at) = starts_at else {
        return String::new();
    };

    let today = now.with_timezone(&at.timezone()).date_naive();
    let target = at.date_naive();
    let time = at.format("%H:%M").to_string();

    if target == today {
        locale.today_at(&time)
    } else if today.succ_opt() == Some(target) {
        locale.tomorrow_at(&time)
    } else {
        locale.on_date_at(target.day(), target.month(), &time)
    }
}

/// Compose the booking-confirmation text sent to the client.
///
/// Blank name or dog name drop their segment entirely; segments are joined
/// with single spaces so no stray delimiters remain.
pub fn compose_reminder(
    settings: &ReminderSettings,
    client_first_name: Option<&str>,
    dog_name: Option<&str>,
    starts_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let locale = settings.locale;
    let name = client_first_name.unwrap_or_default().trim();
    let dog = dog_name.unwrap_or_default().trim();
    let local_start = starts_at.map(|t| t.with_timezone(&settings.timezone));
    let when = time_phrase(local_start.as_ref(), now, locale);

    let mut parts = vec![locale.greeting(name), locale.confirmation(&when)];
    if !dog.is_empty() {
        parts.push(locale.dog_line(dog));
    }
    parts.push(locale.signature(settings.business_name.trim()));

    parts.join(" ").trim().to_string()
}
