//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! The only periodic task is the stale sweep, which catches completions whose
//! webhook never arrived and times out generations that stopped progressing.
//!
//! ```text
//! Scheduler (every SWEEP_INTERVAL_SECS)
//!     │
//!     └─► sweep()
//!             └─► For each Processing record → fetch_status → reconcile
//! ```

use std::time::Duration;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::generation::actions::sweep;
use crate::kernel::ServerDeps;

/// Start all scheduled tasks
pub async fn start_scheduler(deps: ServerDeps, sweep_interval: Duration) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep_job = Job::new_repeated_async(sweep_interval, move |_uuid, _lock| {
        let deps = deps.clone();
        Box::pin(async move {
            run_sweep(&deps).await;
        })
    })?;

    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    tracing::info!(
        interval_secs = sweep_interval.as_secs(),
        "Scheduled tasks started (stale sweep)"
    );
    Ok(scheduler)
}

async fn run_sweep(deps: &ServerDeps) {
    tracing::info!("Running stale sweep");

    match sweep(deps).await {
        Ok(summary) => tracing::info!(
            examined = summary.examined,
            completed = summary.completed,
            failed = summary.failed,
            timed_out = summary.timed_out,
            still_running = summary.still_running,
            errors = summary.errors,
            "Stale sweep finished"
        ),
        Err(e) => tracing::error!(error = %e, "Stale sweep failed, retrying next cycle"),
    }
}
