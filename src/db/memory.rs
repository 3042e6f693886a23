use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    models::{NewReading, Reading, ReadingQuery},
    AccountStore, StoreError, TelemetryStore,
};

#[derive(Debug, Clone)]
struct StoredAccount {
    verified: bool,
    created_at: DateTime<Utc>,
}

/// In-process store with the same contract as `PgStore`.
///
/// Cheap to clone; clones share state. `set_unavailable(true)` makes every
/// call fail the way a dropped database connection would, and `set_delay`
/// stalls every call, which trips the timeout set by `with_timeout`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    readings: Arc<RwLock<Vec<Reading>>>,
    accounts: Arc<RwLock<Vec<StoredAccount>>>,
    unavailable: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
    timeout: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every call like `PgStore` does.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a fully-formed row, bypassing the server clock.
    pub async fn seed(&self, reading: Reading) {
        self.readings.write().await.push(reading);
    }

    pub async fn seed_account(&self, verified: bool, created_at: DateTime<Utc>) {
        self.accounts.write().await.push(StoredAccount {
            verified,
            created_at,
        });
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    async fn check(&self) -> Result<(), StoreError> {
        let delay = Duration::from_millis(self.delay_ms.load(Ordering::SeqCst));
        if !delay.is_zero() {
            let stall = tokio::time::sleep(delay);
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, stall)
                    .await
                    .map_err(|_| StoreError::Timeout(limit))?,
                None => stall.await,
            }
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn append(&self, reading: NewReading) -> Result<Reading, StoreError> {
        self.check().await?;
        let row = Reading {
            id: Uuid::new_v4(),
            owner_id: reading.owner_id,
            device_serial: reading.device_serial,
            location_label: reading.location_label,
            sensor_kind: reading.sensor_kind,
            value: reading.value,
            recorded_at: Utc::now(),
        };
        self.readings.write().await.push(row.clone());
        Ok(row)
    }

    async fn fetch(&self, query: &ReadingQuery) -> Result<Vec<Reading>, StoreError> {
        self.check().await?;
        let mut rows: Vec<Reading> = self
            .readings
            .read()
            .await
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(rows)
    }

    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check().await?;
        let mut rows = self.readings.write().await;
        let before = rows.len();
        rows.retain(|r| r.recorded_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn delete_unverified_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.check().await?;
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|a| a.verified || a.created_at >= cutoff);
        Ok((before - accounts.len()) as u64)
    }
}
