//! Background job scheduler.
//!
//! Registers the recurring catalog sync plus a one-shot run shortly after
//! startup. Nothing is registered when no listing endpoint is configured.

use std::sync::Arc;
use std::time::Duration;

use brewpick_core::SyncSettings;
use brewpick_sync::{SyncOutcome, SyncService};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the scheduler.
///
/// The returned handle must be kept alive for the lifetime of the process;
/// dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, a
/// job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    sync: Arc<SyncService>,
    settings: &SyncSettings,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if sync.is_enabled() {
        register_interval_job(&scheduler, Arc::clone(&sync), settings).await?;
        register_startup_job(&scheduler, sync, settings).await?;
    } else {
        tracing::warn!("scheduler: sync disabled, YOUZAN_PRODUCTS_ENDPOINT is not set");
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_interval_job(
    scheduler: &JobScheduler,
    sync: Arc<SyncService>,
    settings: &SyncSettings,
) -> Result<(), JobSchedulerError> {
    let interval = Duration::from_secs(settings.interval_minutes.max(1) * 60);
    let max_retries = settings.max_retries;

    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let sync = Arc::clone(&sync);
        Box::pin(async move {
            run_scheduled(&sync, max_retries, "interval").await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(
        interval_minutes = settings.interval_minutes.max(1),
        "scheduler: registered catalog sync"
    );
    Ok(())
}

async fn register_startup_job(
    scheduler: &JobScheduler,
    sync: Arc<SyncService>,
    settings: &SyncSettings,
) -> Result<(), JobSchedulerError> {
    let delay = Duration::from_millis(settings.startup_delay_ms);
    let max_retries = settings.max_retries;

    let job = Job::new_one_shot_async(delay, move |_uuid, _lock| {
        let sync = Arc::clone(&sync);
        Box::pin(async move {
            run_scheduled(&sync, max_retries, "startup").await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_scheduled(sync: &SyncService, max_retries: u32, trigger: &str) {
    tracing::info!(trigger, "scheduler: starting catalog sync");
    match sync.run(max_retries).await {
        Ok(SyncOutcome::Written { count }) => {
            tracing::info!(trigger, count, "scheduler: catalog sync complete");
        }
        Ok(SyncOutcome::Skipped { reason }) => {
            tracing::warn!(trigger, reason = %reason, "scheduler: catalog sync skipped");
        }
        Ok(SyncOutcome::AlreadyRunning) => {
            tracing::info!(trigger, "scheduler: previous sync still running; skipped");
        }
        Err(e) => {
            tracing::error!(trigger, error = %e, "scheduler: catalog sync failed");
        }
    }
}
