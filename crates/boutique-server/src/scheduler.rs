//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring maintenance jobs.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Daily at 03:00 UTC.
const SESSION_PURGE_SCHEDULE: &str = "0 0 3 * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<boutique_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_session_purge_job(&scheduler, pool, config.session_ttl_days).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the job that deletes bag sessions idle for longer than
/// `ttl_days`.
async fn register_session_purge_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    ttl_days: u32,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async(SESSION_PURGE_SCHEDULE, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);

        Box::pin(async move {
            run_session_purge(&pool, ttl_days).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_session_purge(pool: &PgPool, ttl_days: u32) {
    match boutique_db::purge_stale_sessions(pool, ttl_days).await {
        Ok(0) => tracing::debug!("scheduler: no stale sessions"),
        Ok(purged) => tracing::info!(purged, ttl_days, "scheduler: purged stale sessions"),
        Err(e) => tracing::error!(error = %e, "scheduler: session purge failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn purge_schedule_is_a_valid_cron_expression() {
        let job = Job::new_async(SESSION_PURGE_SCHEDULE, |_uuid, _lock| Box::pin(async {}));
        assert!(job.is_ok());
    }
}
