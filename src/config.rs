use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Shared with the identity service that issues viewer capabilities.
    pub capability_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    /// Upper bound on any single store call.
    pub store_timeout_secs: u64,
    /// Readings older than this many days are purged.
    pub telemetry_retention_days: i64,
    pub telemetry_purge_interval_secs: u64,
    /// Unverified accounts older than this many minutes are purged.
    pub account_retention_minutes: i64,
    pub account_purge_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: required("DATABASE_URL")?,
            capability_secret: required("CAPABILITY_SECRET")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: parsed("SERVER_PORT", "8080", "a valid port number")?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "10", "a positive integer")?,
            store_timeout_secs: parsed("STORE_TIMEOUT_SECS", "5", "a positive integer")?,
            telemetry_retention_days: parsed(
                "TELEMETRY_RETENTION_DAYS",
                "1",
                "a positive integer",
            )?,
            telemetry_purge_interval_secs: parsed(
                "TELEMETRY_PURGE_INTERVAL_SECS",
                "86400",
                "a positive integer",
            )?,
            account_retention_minutes: parsed(
                "ACCOUNT_RETENTION_MINUTES",
                "10",
                "a positive integer",
            )?,
            account_purge_interval_secs: parsed(
                "ACCOUNT_PURGE_INTERVAL_SECS",
                "60",
                "a positive integer",
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but would break the service at runtime: a
    /// zero interval panics the scheduler and a non-positive horizon moves the
    /// purge cutoff to now or later.
    pub fn validate(&self) -> Result<()> {
        at_least_one("DB_MAX_CONNECTIONS", self.db_max_connections)?;
        at_least_one("STORE_TIMEOUT_SECS", self.store_timeout_secs)?;
        at_least_one("TELEMETRY_RETENTION_DAYS", self.telemetry_retention_days)?;
        at_least_one(
            "TELEMETRY_PURGE_INTERVAL_SECS",
            self.telemetry_purge_interval_secs,
        )?;
        at_least_one("ACCOUNT_RETENTION_MINUTES", self.account_retention_minutes)?;
        at_least_one("ACCOUNT_PURGE_INTERVAL_SECS", self.account_purge_interval_secs)?;
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

pub(crate) fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

pub(crate) fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

pub(crate) fn parsed<T>(key: &str, default: &str, expected: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_value(key, &optional(key, default), expected)
}

fn at_least_one<T>(key: &str, value: T) -> Result<()>
where
    T: PartialOrd + From<u8> + std::fmt::Display,
{
    if value < T::from(1) {
        bail!("{key} must be at least 1, got {value}");
    }
    Ok(())
}

fn parse_value<T>(key: &str, raw: &str, expected: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be {expected}, got {raw:?}"))
}
