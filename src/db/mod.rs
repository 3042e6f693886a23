pub mod memory;
pub mod models;
pub mod postgres;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use self::models::{NewReading, Reading, ReadingQuery};

pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;

pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Append-only table of readings.
///
/// Inserts and age-based deletes may run concurrently; no coordination is
/// layered on top of what the backing store provides.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Insert one row. `recorded_at` is taken from the store's clock.
    async fn append(&self, reading: NewReading) -> Result<Reading, StoreError>;

    async fn fetch(&self, query: &ReadingQuery) -> Result<Vec<Reading>, StoreError>;

    /// Delete every reading recorded strictly before `cutoff`. Returns the
    /// number of rows removed.
    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// The slice of the account subsystem's storage that the stale-account purge
/// needs. Everything else about accounts lives outside this service.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn delete_unverified_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}
