//! Environment configuration.
//!
//! Values come from the process environment, after loading a `.env` file from
//! the working directory if one exists.

use std::path::PathBuf;

use crate::error::AppError;

pub const DEFAULT_API_BASE: &str = "https://porienergia-prod-agent.frendsapp.com:9999/api/onlineapi/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub influxdb_url: String,
    pub influxdb_token: String,
    pub influxdb_org: String,
    pub influxdb_bucket: String,
    pub metering_point: String,
    pub refresh_token_file: PathBuf,
    pub initial_sync_days: i64,
    pub sync_buffer_hours: i64,
    pub api_base: String,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            get(key).ok_or_else(|| AppError::usage(format!("{key} is required but not set (environment or .env).")))
        };
        let number = |key: &str, default: i64| -> Result<i64, AppError> {
            match get(key) {
                None => Ok(default),
                Some(raw) => match raw.parse::<i64>() {
                    Ok(v) if v >= 0 => Ok(v),
                    _ => Err(AppError::usage(format!(
                        "{key} must be a non-negative integer, got '{raw}'."
                    ))),
                },
            }
        };

        Ok(Self {
            influxdb_url: or("INFLUXDB_URL", "http://localhost:8086"),
            influxdb_token: required("INFLUXDB_TOKEN")?,
            influxdb_org: or("INFLUXDB_ORG", "wattivahti"),
            influxdb_bucket: or("INFLUXDB_BUCKET", "electricity"),
            metering_point: required("WATTIVAHTI_METERING_POINT")?,
            refresh_token_file: PathBuf::from(or("REFRESH_TOKEN_FILE", "refresh_token.txt")),
            initial_sync_days: number("INITIAL_SYNC_DAYS", 7)?,
            sync_buffer_hours: number("SYNC_BUFFER_HOURS", 2)?,
            api_base: or("WATTIVAHTI_API_BASE", DEFAULT_API_BASE),
        })
    }
}
