use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    /// Storage key under which the serialized event-id mapping table lives.
    /// Read from env var `CALENDAR_EVENT_MAP_KEY`.
    pub event_map_key: String,
    /// Name and title of the dedicated calendar created when no writable one exists.
    pub calendar_name: String,
    /// Color of the dedicated calendar, as a `#rrggbb` string.
    pub calendar_color: String,
    /// Length of every synced event. Games and meetups carry no end time, so
    /// this is applied uniformly.
    pub event_duration_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let event_duration_minutes: i64 = env::var("CALENDAR_EVENT_DURATION_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("CALENDAR_EVENT_DURATION_MINUTES".to_string()))?;
        if event_duration_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "CALENDAR_EVENT_DURATION_MINUTES".to_string(),
            ));
        }

        let calendar_color =
            env::var("CALENDAR_COLOR").unwrap_or_else(|_| DEFAULT_CALENDAR_COLOR.to_string());
        if !is_hex_color(&calendar_color) {
            return Err(ConfigError::InvalidValue("CALENDAR_COLOR".to_string()));
        }

        Ok(Config {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/challengeu.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            calendar: CalendarConfig {
                event_map_key: env::var("CALENDAR_EVENT_MAP_KEY")
                    .unwrap_or_else(|_| DEFAULT_EVENT_MAP_KEY.to_string()),
                calendar_name: env::var("CALENDAR_NAME")
                    .unwrap_or_else(|_| DEFAULT_CALENDAR_NAME.to_string()),
                calendar_color,
                event_duration_minutes,
            },
        })
    }
}

pub const DEFAULT_EVENT_MAP_KEY: &str = "challengeu_apple_calendar_event_map";
pub const DEFAULT_CALENDAR_NAME: &str = "ChallengeU";
pub const DEFAULT_CALENDAR_COLOR: &str = "#e80e0e";

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig {
                url: "sqlite://data/challengeu.db".to_string(),
                max_connections: 5,
            },
            calendar: CalendarConfig::default(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            event_map_key: DEFAULT_EVENT_MAP_KEY.to_string(),
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            calendar_color: DEFAULT_CALENDAR_COLOR.to_string(),
            event_duration_minutes: 60,
        }
    }
}
