use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::access::DEFAULT_ACCESS_REQUEST_TTL_HOURS;

pub const DEFAULT_INQUIRY_TTL_DAYS: i64 = 30;
pub const DEFAULT_NOTIFICATION_QUEUE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub session_secret: String,
    pub admin_user_ids: Vec<Uuid>,
    pub inquiry_ttl_days: i64,
    pub access_request_ttl_hours: i64,
    pub notification_webhook_url: Option<String>,
    pub notification_queue_size: usize,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
    pub log_request_body: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let session_secret = get("SESSION_SECRET").context("SESSION_SECRET must be set")?;
        if session_secret.len() < 16 {
            anyhow::bail!("SESSION_SECRET must be at least 16 characters");
        }

        let inquiry_ttl_days = parse_or(
            "INQUIRY_TTL_DAYS",
            get("INQUIRY_TTL_DAYS"),
            DEFAULT_INQUIRY_TTL_DAYS,
        )?;
        let access_request_ttl_hours = parse_or(
            "ACCESS_REQUEST_TTL_HOURS",
            get("ACCESS_REQUEST_TTL_HOURS"),
            DEFAULT_ACCESS_REQUEST_TTL_HOURS,
        )?;
        if inquiry_ttl_days <= 0 || access_request_ttl_hours <= 0 {
            anyhow::bail!("INQUIRY_TTL_DAYS and ACCESS_REQUEST_TTL_HOURS must be positive");
        }

        let notification_queue_size = parse_or(
            "NOTIFICATION_QUEUE_SIZE",
            get("NOTIFICATION_QUEUE_SIZE"),
            DEFAULT_NOTIFICATION_QUEUE_SIZE,
        )?;
        if notification_queue_size == 0 {
            anyhow::bail!("NOTIFICATION_QUEUE_SIZE must be at least 1");
        }

        let notification_webhook_url = get("NOTIFICATION_WEBHOOK_URL");
        if let Some(url) = &notification_webhook_url {
            url::Url::parse(url).context("NOTIFICATION_WEBHOOK_URL must be a valid URL")?;
        }

        Ok(Config {
            server_port: parse_or("SERVER_PORT", get("SERVER_PORT"), 3000)?,
            database_url: get("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                10,
            )?,
            session_secret,
            admin_user_ids: parse_admin_ids(&get("ADMIN_USER_IDS").unwrap_or_default())?,
            inquiry_ttl_days,
            access_request_ttl_hours,
            notification_webhook_url,
            notification_queue_size,
            cors_allowed_origins: parse_list(&get("CORS_ALLOWED_ORIGINS").unwrap_or_default()),
            log_request_body: parse_or("LOG_REQUEST_BODY", get("LOG_REQUEST_BODY"), false)?,
            log_format: match get("LOG_FORMAT").as_deref().map(str::trim) {
                None | Some("pretty") | Some("text") => LogFormat::Pretty,
                Some("json") => LogFormat::Json,
                Some(other) => {
                    anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other)
                }
            },
        })
    }

    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, value)),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_admin_ids(raw: &str) -> Result<Vec<Uuid>> {
    parse_list(raw)
        .iter()
        .map(|entry| {
            Uuid::parse_str(entry)
                .with_context(|| format!("ADMIN_USER_IDS contains an invalid UUID '{}'", entry))
        })
        .collect()
}
