use std::env;
use std::fmt::Display;
use std::str::FromStr;

use dotenvy::dotenv;
use log::info;
use url::Url;

use crate::error::AppError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
/// One year. Longer lifetimes overflow the expiry timestamp.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: Url,
    pub database_url: Option<String>,
    pub session_ttl_hours: i64,
    pub request_timeout_secs: u64,
}

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn load() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let raw_url = lookup("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = Url::parse(&raw_url)
            .map_err(|e| AppError::Config(format!("API_BASE_URL {raw_url}: {e}")))?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let session_ttl_hours: i64 = parse_or(&lookup, "SESSION_TTL_HOURS", 24)?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            return Err(AppError::Config(format!(
                "SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}"
            )));
        }

        Ok(Config {
            api_base_url,
            database_url,
            session_ttl_hours,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 15)?,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key}={raw}: {e}"))),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
