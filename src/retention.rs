use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    db::{AccountStore, TelemetryStore},
    scheduler::{PeriodicTask, ScheduledJob},
};

/// Deletes readings older than `horizon`.
pub struct TelemetryPurge {
    store: Arc<dyn TelemetryStore>,
    horizon: Duration,
}

impl TelemetryPurge {
    pub fn new(store: Arc<dyn TelemetryStore>, horizon: Duration) -> Self {
        Self { store, horizon }
    }
}

#[async_trait]
impl ScheduledJob for TelemetryPurge {
    fn name(&self) -> &'static str {
        "telemetry_purge"
    }

    async fn run_once(&self) -> anyhow::Result<u64> {
        let cutoff = Utc::now() - self.horizon;
        self.store
            .delete_recorded_before(cutoff)
            .await
            .with_context(|| format!("failed to purge readings recorded before {cutoff}"))
    }
}

/// Deletes accounts that never completed verification within `horizon`.
pub struct StaleAccountPurge {
    accounts: Arc<dyn AccountStore>,
    horizon: Duration,
}

impl StaleAccountPurge {
    pub fn new(accounts: Arc<dyn AccountStore>, horizon: Duration) -> Self {
        Self { accounts, horizon }
    }
}

#[async_trait]
impl ScheduledJob for StaleAccountPurge {
    fn name(&self) -> &'static str {
        "stale_account_purge"
    }

    async fn run_once(&self) -> anyhow::Result<u64> {
        let cutoff = Utc::now() - self.horizon;
        self.accounts
            .delete_unverified_created_before(cutoff)
            .await
            .with_context(|| format!("failed to purge unverified accounts created before {cutoff}"))
    }
}

/// The two independent maintenance tasks. Neither waits on the other.
pub struct RetentionScheduler {
    pub telemetry: PeriodicTask<TelemetryPurge>,
    pub accounts: PeriodicTask<StaleAccountPurge>,
}

impl RetentionScheduler {
    pub fn new(
        config: &Config,
        store: Arc<dyn TelemetryStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            telemetry: PeriodicTask::new(
                TelemetryPurge::new(store, Duration::days(config.telemetry_retention_days)),
                std::time::Duration::from_secs(config.telemetry_purge_interval_secs),
            ),
            accounts: PeriodicTask::new(
                StaleAccountPurge::new(
                    accounts,
                    Duration::minutes(config.account_retention_minutes),
                ),
                std::time::Duration::from_secs(config.account_purge_interval_secs),
            ),
        }
    }

    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.telemetry.run()),
            tokio::spawn(self.accounts.run()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        db::{
            models::{Reading, ReadingQuery},
            MemoryStore,
        },
        scheduler::TickOutcome,
    };

    fn aged(value: i64, age: Duration) -> Reading {
        Reading {
            id: Uuid::new_v4(),
            owner_id: "o1".to_owned(),
            device_serial: "SN-1".to_owned(),
            location_label: "Qwave".to_owned(),
            sensor_kind: "co2".to_owned(),
            value,
            recorded_at: Utc::now() - age,
        }
    }

    fn telemetry_task(store: &MemoryStore) -> PeriodicTask<TelemetryPurge> {
        PeriodicTask::new(
            TelemetryPurge::new(Arc::new(store.clone()), Duration::hours(24)),
            std::time::Duration::from_secs(86_400),
        )
    }

    #[tokio::test]
    async fn purge_removes_readings_past_horizon() {
        let store = MemoryStore::new();
        store.seed(aged(10, Duration::hours(25))).await;
        store.seed(aged(20, Duration::hours(1))).await;

        let outcome = telemetry_task(&store).tick().await;
        assert_eq!(outcome, TickOutcome::Completed { affected: 1 });

        let rows = store.fetch(&ReadingQuery::for_owner("o1")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 20);
    }

    #[tokio::test]
    async fn purge_failure_is_contained_and_retried_next_tick() {
        let store = MemoryStore::new();
        store.seed(aged(10, Duration::hours(30))).await;
        let task = telemetry_task(&store);

        store.set_unavailable(true);
        assert_eq!(task.tick().await, TickOutcome::Failed);
        assert_eq!(store.len().await, 1);

        store.set_unavailable(false);
        assert_eq!(task.tick().await, TickOutcome::Completed { affected: 1 });
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn account_purge_failure_does_not_block_telemetry_purge() {
        let readings = MemoryStore::new();
        readings.seed(aged(10, Duration::hours(30))).await;
        let accounts = MemoryStore::new();
        accounts.set_unavailable(true);

        let scheduler = RetentionScheduler {
            telemetry: telemetry_task(&readings),
            accounts: PeriodicTask::new(
                StaleAccountPurge::new(Arc::new(accounts), Duration::minutes(10)),
                std::time::Duration::from_secs(60),
            ),
        };

        assert_eq!(scheduler.accounts.tick().await, TickOutcome::Failed);
        assert_eq!(
            scheduler.telemetry.tick().await,
            TickOutcome::Completed { affected: 1 }
        );
    }

    #[tokio::test]
    async fn account_purge_removes_stale_unverified() {
        let accounts = MemoryStore::new();
        accounts.seed_account(false, Utc::now() - Duration::minutes(30)).await;
        accounts.seed_account(false, Utc::now()).await;

        let task = PeriodicTask::new(
            StaleAccountPurge::new(Arc::new(accounts.clone()), Duration::minutes(10)),
            std::time::Duration::from_secs(60),
        );
        assert_eq!(task.tick().await, TickOutcome::Completed { affected: 1 });
        assert_eq!(accounts.account_count().await, 1);
    }
}
