//! Periodic sweep of expired intention records.
//!
//! Uses tokio-cron-scheduler to run `cleanup_expired()` once at start and
//! then at a fixed interval.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info};

use super::IntentionStore;

/// Scheduler for the expired-record sweep.
pub struct CleanupScheduler {
    scheduler: JobScheduler,
    store: Arc<IntentionStore>,
    interval_minutes: u64,
}

impl CleanupScheduler {
    /// Create a scheduler sweeping every `interval_minutes` (minimum 1).
    ///
    /// Note: Call `start()` to begin periodic execution.
    pub async fn new(
        store: Arc<IntentionStore>,
        interval_minutes: u64,
    ) -> Result<Self, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            store,
            interval_minutes: interval_minutes.max(1),
        })
    }

    /// Create a scheduler using the store's configured interval.
    pub async fn from_store(store: Arc<IntentionStore>) -> Result<Self, JobSchedulerError> {
        let interval = store.config().cleanup_interval_minutes;
        Self::new(store, interval).await
    }

    /// Interval between sweeps in minutes.
    pub fn interval_minutes(&self) -> u64 {
        self.interval_minutes
    }

    /// Run one sweep now and start the periodic job.
    ///
    /// Returns the number of records removed by the initial sweep.
    pub async fn start(&self) -> Result<usize, JobSchedulerError> {
        let store = self.store.clone();
        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(self.interval_minutes * 60),
            move |_uuid, _lock| {
                let store = store.clone();
                Box::pin(async move {
                    debug!("Starting periodic intention cleanup");
                    match store.cleanup_expired().await {
                        Ok(removed) => info!(removed, "Periodic intention cleanup complete"),
                        Err(e) => error!(error = %e, "Periodic intention cleanup failed"),
                    }
                })
            },
        )?;
        self.scheduler.add(job).await?;

        let removed = match self.store.cleanup_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                error!(error = %e, "Initial intention cleanup failed");
                0
            }
        };

        self.scheduler.start().await?;
        info!(
            interval_minutes = self.interval_minutes,
            "Intention cleanup scheduler started"
        );
        Ok(removed)
    }

    /// Stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.scheduler.shutdown().await
    }
}
