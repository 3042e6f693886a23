use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

/// A unit of periodic maintenance work.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Perform one run. Returns the number of affected rows.
    async fn run_once(&self) -> anyhow::Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed { affected: u64 },
    Failed,
    /// The previous run had not finished yet.
    Skipped,
}

/// Shortest interval a task will tick at. `tokio::time::interval` panics on zero.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Runs a job every `interval`, never more than one run at a time.
///
/// A tick that arrives while a run is still active is skipped rather than
/// queued. Failures are logged; the next attempt is the next tick.
pub struct PeriodicTask<J> {
    job: Arc<J>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl<J> Clone for PeriodicTask<J> {
    fn clone(&self) -> Self {
        Self {
            job: Arc::clone(&self.job),
            interval: self.interval,
            running: Arc::clone(&self.running),
        }
    }
}

/// Clears the running flag when a run ends, including by panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<J: ScheduledJob> PeriodicTask<J> {
    pub fn new(job: J, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                job = job.name(),
                requested_ms = interval.as_millis() as u64,
                "Interval below minimum; clamping"
            );
        }
        Self {
            job: Arc::new(job),
            interval: interval.max(MIN_INTERVAL),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Execute one scheduled run now, unless one is already active.
    pub async fn tick(&self) -> TickOutcome {
        let job = self.job.name();
        if self.running.swap(true, Ordering::AcqRel) {
            warn!(job, "Previous run still active; skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let started = Instant::now();
        match self.job.run_once().await {
            Ok(affected) => {
                info!(
                    job,
                    affected,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scheduled job completed"
                );
                TickOutcome::Completed { affected }
            }
            Err(e) => {
                error!(job, error = %e, "Scheduled job failed; retrying on next tick");
                TickOutcome::Failed
            }
        }
    }

    /// Tick forever. The first run happens immediately. Spawn this via
    /// `tokio::spawn`.
    pub async fn run(self) {
        info!(
            job = self.job.name(),
            interval_secs = self.interval.as_secs(),
            "Scheduled job started"
        );
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            // Each run gets its own task so a slow run is observed as "still
            // active" by the next tick instead of delaying it.
            let task = self.clone();
            tokio::spawn(async move {
                task.tick().await;
            });
        }
    }
}
