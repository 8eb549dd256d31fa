use std::env;

use anyhow::Context;
use chrono_tz::Tz;

use crate::domain::{Locale, ReminderSettings};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub db_max_connections: u32,
    pub pending_poll_seconds: u64,
    pub reminder: ReminderSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", 24);
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 10);
        let pending_poll_seconds = parse_or("PENDING_POLL_SECONDS", 5);

        let business_name = env::var("BUSINESS_NAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Zagadogs".to_string());

        let timezone: Tz = match env::var("BUSINESS_TIMEZONE") {
            Ok(name) => name
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("BUSINESS_TIMEZONE: {e}"))?,
            Err(_) => chrono_tz::Europe::Rome,
        };

        let locale: Locale = match env::var("REMINDER_LOCALE") {
            Ok(s) => s.parse().context("REMINDER_LOCALE")?,
            Err(_) => Locale::En,
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            db_max_connections,
            pending_poll_seconds,
            reminder: ReminderSettings {
                business_name,
                locale,
                timezone,
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}
