use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    models::{NewReading, Reading, ReadingQuery},
    AccountStore, StoreError, TelemetryStore,
};

/// Postgres-backed store. Every call is bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => classify(res, self.timeout),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

/// The pool's acquire timeout and the per-call timeout share one budget, so
/// either firing is reported as the same timeout.
fn classify<T>(res: Result<T, sqlx::Error>, timeout: Duration) -> Result<T, StoreError> {
    match res {
        Ok(v) => Ok(v),
        Err(sqlx::Error::PoolTimedOut) => Err(StoreError::Timeout(timeout)),
        Err(e) => Err(StoreError::from(e)),
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    async fn append(&self, reading: NewReading) -> Result<Reading, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Reading>(
                r#"
                INSERT INTO telemetry_readings
                    (owner_id, device_serial, location_label, sensor_kind, value)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, owner_id, device_serial, location_label, sensor_kind,
                          value, recorded_at
                "#,
            )
            .bind(&reading.owner_id)
            .bind(&reading.device_serial)
            .bind(&reading.location_label)
            .bind(&reading.sensor_kind)
            .bind(reading.value)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn fetch(&self, query: &ReadingQuery) -> Result<Vec<Reading>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Reading>(
                r#"
                SELECT id, owner_id, device_serial, location_label, sensor_kind,
                       value, recorded_at
                FROM telemetry_readings
                WHERE owner_id = $1
                  AND ($2::text        IS NULL OR location_label = $2)
                  AND ($3::timestamptz IS NULL OR recorded_at >= $3)
                  AND ($4::timestamptz IS NULL OR recorded_at <= $4)
                ORDER BY recorded_at DESC
                "#,
            )
            .bind(&query.owner_id)
            .bind(query.location_label.as_deref())
            .bind(query.since)
            .bind(query.until)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM telemetry_readings WHERE recorded_at < $1")
                    .bind(cutoff)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn delete_unverified_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM accounts WHERE NOT verified AND created_at < $1")
                    .bind(cutoff)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Tests (the `sqlx::test` cases need a live Postgres via DATABASE_URL)
// ---------------------------------------------------------------------------
