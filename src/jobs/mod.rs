//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance tasks.
//! Transfers are never cancelled automatically; stalled ones are only reported.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;

use crate::config::Config;
use crate::idempotency::ProcessedEvents;
use crate::projection::{PendingTransfer, PendingTransfers};

// =========================================================================
// Stalled Transfer Monitor
// =========================================================================

/// Report transfers whose reservation has been open longer than `older_than`.
/// Each one is logged at warn level; nothing is compensated.
pub async fn report_stalled_transfers(
    pending: &PendingTransfers,
    older_than: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<PendingTransfer>, JobError> {
    let older_than = to_chrono(older_than, "stalled transfer threshold")?;
    let stalled = pending.stalled(older_than, now).await;

    for transfer in &stalled {
        tracing::warn!(
            transfer_id = %transfer.transfer_id,
            correlation_id = ?transfer.correlation_id,
            source = %transfer.source,
            destination = %transfer.destination,
            amount = transfer.amount,
            stage = ?transfer.stage,
            prepared_at = %transfer.prepared_at,
            "Transfer stalled"
        );
    }

    Ok(stalled)
}

// =========================================================================
// Processed Event Maintenance
// =========================================================================

/// Reset dispatches stuck in processing so a redelivery may retry them
pub async fn reset_stale_dispatches(processed: &ProcessedEvents) -> u64 {
    let reset = processed.reset_stale().await;

    if reset > 0 {
        tracing::warn!(reset, "Reset stale processing dispatch keys");
    }

    reset
}

/// Delete settled dispatch keys older than the retention window
pub async fn prune_processed_events(
    processed: &ProcessedEvents,
    retention: Duration,
    now: DateTime<Utc>,
) -> Result<u64, JobError> {
    let retention = to_chrono(retention, "idempotency retention")?;
    let deleted = processed.cleanup_expired(retention, now).await;

    if deleted > 0 {
        tracing::info!(deleted, "Deleted expired dispatch keys");
    }

    Ok(deleted)
}

/// Forget resolved transfers older than the retention window
pub async fn prune_resolved_transfers(
    pending: &PendingTransfers,
    retention: Duration,
    now: DateTime<Utc>,
) -> Result<u64, JobError> {
    let retention = to_chrono(retention, "idempotency retention")?;
    let pruned = pending.prune_resolved(retention, now).await;

    if pruned > 0 {
        tracing::info!(pruned, "Pruned resolved transfers");
    }

    Ok(pruned)
}

fn to_chrono(duration: Duration, name: &'static str) -> Result<chrono::Duration, JobError> {
    chrono::Duration::from_std(duration).map_err(|_| JobError::DurationOutOfRange(name))
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval between stalled transfer scans
    pub monitor_interval: Duration,
    /// Age at which an unresolved transfer counts as stalled
    pub stalled_after: Duration,
    /// Interval for idempotency ledger maintenance
    pub idempotency_maintenance_interval: Duration,
    /// How long settled dispatch keys and resolved transfers are kept
    pub idempotency_retention: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl JobSchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            monitor_interval: config.monitor_interval(),
            stalled_after: config.stalled_transfer_after(),
            idempotency_maintenance_interval: config.monitor_interval(),
            idempotency_retention: config.idempotency_retention(),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pending: Arc<PendingTransfers>,
    processed: Arc<ProcessedEvents>,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(pending: Arc<PendingTransfers>, processed: Arc<ProcessedEvents>) -> Self {
        Self::with_config(pending, processed, JobSchedulerConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(
        pending: Arc<PendingTransfers>,
        processed: Arc<ProcessedEvents>,
        config: JobSchedulerConfig,
    ) -> Self {
        Self {
            pending,
            processed,
            config,
        }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        if self.config.monitor_interval.is_zero()
            || self.config.idempotency_maintenance_interval.is_zero()
        {
            tracing::error!("Job scheduler interval is zero, not starting");
            return;
        }

        tracing::info!(
            monitor_interval_secs = self.config.monitor_interval.as_secs(),
            stalled_after_secs = self.config.stalled_after.as_secs(),
            "Job scheduler started"
        );

        let mut monitor_interval = interval(self.config.monitor_interval);
        let mut idempotency_interval = interval(self.config.idempotency_maintenance_interval);

        loop {
            tokio::select! {
                _ = monitor_interval.tick() => {
                    if let Err(e) = report_stalled_transfers(
                        &self.pending,
                        self.config.stalled_after,
                        Utc::now(),
                    ).await {
                        tracing::error!(error = %e, "Stalled transfer scan failed");
                    }
                }
                _ = idempotency_interval.tick() => {
                    reset_stale_dispatches(&self.processed).await;
                    if let Err(e) = prune_processed_events(
                        &self.processed,
                        self.config.idempotency_retention,
                        Utc::now(),
                    ).await {
                        tracing::error!(error = %e, "Dispatch key pruning failed");
                    }
                    if let Err(e) = prune_resolved_transfers(
                        &self.pending,
                        self.config.idempotency_retention,
                        Utc::now(),
                    ).await {
                        tracing::error!(error = %e, "Resolved transfer pruning failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        self.run_all_at(Utc::now()).await
    }

    /// Run all maintenance jobs once as if the clock read `now`
    pub async fn run_all_at(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match report_stalled_transfers(&self.pending, self.config.stalled_after, now).await {
            Ok(stalled) => report.stalled_transfers = stalled,
            Err(e) => report.errors.push(format!("Stalled transfer scan: {}", e)),
        }

        report.dispatch_keys_reset = reset_stale_dispatches(&self.processed).await;

        match prune_processed_events(&self.processed, self.config.idempotency_retention, now).await
        {
            Ok(count) => report.dispatch_keys_deleted = count,
            Err(e) => report.errors.push(format!("Dispatch key pruning: {}", e)),
        }

        match prune_resolved_transfers(&self.pending, self.config.idempotency_retention, now).await
        {
            Ok(count) => report.resolved_transfers_pruned = count,
            Err(e) => report.errors.push(format!("Resolved transfer pruning: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub stalled_transfers: Vec<PendingTransfer>,
    pub dispatch_keys_reset: u64,
    pub dispatch_keys_deleted: u64,
    pub resolved_transfers_pruned: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Duration out of range: {0}")]
    DurationOutOfRange(&'static str),
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::PublishedEvent;
    use crate::domain::{AccountEvent, AccountId, OperationContext};
    use crate::idempotency::DispatchKey;
    use uuid::Uuid;

    fn prepared() -> PublishedEvent {
        PublishedEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: AccountId::from("S"),
            version: 3,
            event: AccountEvent::Prepared {
                to: AccountId::from("D"),
                amount: 40,
            },
            context: OperationContext::new().with_correlation_id(Uuid::new_v4()),
        }
    }

    fn scheduler(pending: Arc<PendingTransfers>, processed: Arc<ProcessedEvents>) -> JobScheduler {
        let config = JobSchedulerConfig {
            monitor_interval: Duration::from_secs(60),
            stalled_after: Duration::from_secs(300),
            idempotency_maintenance_interval: Duration::from_secs(60),
            idempotency_retention: Duration::from_secs(3600),
        };
        JobScheduler::with_config(pending, processed, config)
    }

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.monitor_interval, Duration::from_secs(60));
        assert_eq!(config.stalled_after, Duration::from_secs(300));
        assert_eq!(config.idempotency_retention, Duration::from_secs(86400));
    }

    #[test]
    fn test_maintenance_report_default() {
        let report = MaintenanceReport::default();
        assert!(report.stalled_transfers.is_empty());
        assert_eq!(report.dispatch_keys_deleted, 0);
        assert_eq!(report.errors.len(), 0);
    }

    #[tokio::test]
    async fn test_run_all_reports_stalled_transfers() {
        let pending = Arc::new(PendingTransfers::new());
        let processed = Arc::new(ProcessedEvents::default());
        let event = prepared();
        pending.apply(&event).await;

        let scheduler = scheduler(pending, processed);

        let report = scheduler.run_all_once().await;
        assert!(report.stalled_transfers.is_empty());

        let later = Utc::now() + chrono::Duration::minutes(10);
        let report = scheduler.run_all_at(later).await;
        assert_eq!(report.stalled_transfers.len(), 1);
        assert_eq!(report.stalled_transfers[0].transfer_id, event.event_id);
        assert_eq!(
            report.stalled_transfers[0].correlation_id,
            event.context.correlation_id
        );
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_run_all_prunes_settled_keys() {
        let pending = Arc::new(PendingTransfers::new());
        let processed = Arc::new(ProcessedEvents::default());
        let key = DispatchKey::new(Uuid::new_v4(), "Entry");
        processed.start_processing(key).await.unwrap();
        processed.mark_completed(&key, Vec::new()).await.unwrap();

        let scheduler = scheduler(pending, processed.clone());
        let report = scheduler
            .run_all_at(Utc::now() + chrono::Duration::hours(2))
            .await;

        assert_eq!(report.dispatch_keys_deleted, 1);
        assert!(processed.is_empty().await);
    }

    #[tokio::test]
    async fn test_run_all_prunes_resolved_transfers() {
        let pending = Arc::new(PendingTransfers::new());
        let open = prepared();
        let entered = PublishedEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: AccountId::from("D"),
            version: 2,
            event: AccountEvent::AmountEntered {
                source_id: AccountId::from("S"),
                amount: 40,
            },
            context: open.context.caused_by(open.event_id),
        };
        let confirmed = PublishedEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: AccountId::from("S"),
            version: 4,
            event: AccountEvent::Confirmed { amount: 40 },
            context: entered.context.caused_by(entered.event_id),
        };
        for published in [&open, &entered, &confirmed] {
            pending.apply(published).await;
        }
        assert_eq!(pending.stats().await.confirmed, 1);

        let scheduler = scheduler(pending, Arc::new(ProcessedEvents::default()));
        let report = scheduler
            .run_all_at(Utc::now() + chrono::Duration::hours(2))
            .await;

        assert_eq!(report.resolved_transfers_pruned, 1);
        assert!(report.stalled_transfers.is_empty());
    }

    #[tokio::test]
    async fn test_zero_interval_scheduler_stops() {
        let config = JobSchedulerConfig {
            monitor_interval: Duration::ZERO,
            ..JobSchedulerConfig::default()
        };
        let scheduler = JobScheduler::with_config(
            Arc::new(PendingTransfers::new()),
            Arc::new(ProcessedEvents::default()),
            config,
        );

        let finished = tokio::time::timeout(Duration::from_secs(1), scheduler.start()).await;
        assert!(matches!(finished, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_out_of_range_duration_is_reported() {
        let pending = PendingTransfers::new();
        let result = report_stalled_transfers(&pending, Duration::MAX, Utc::now()).await;
        assert!(matches!(result, Err(JobError::DurationOutOfRange(_))));
    }
}
