//! Background maintenance jobs.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

use crate::database::Database;

/// Start the scheduler with the expired-document purge registered.
///
/// The returned handle must be kept alive; dropping it stops the jobs.
pub async fn build_scheduler(
    database: Database,
    schedule: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let database = database.clone();
        Box::pin(async move {
            match database.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired product documents"),
                Err(e) => error!(error = %e, "Failed to purge expired product documents"),
            }
        })
    })?;
    scheduler.add(job).await?;

    scheduler.start().await?;
    info!(schedule, "Scheduler started");
    Ok(scheduler)
}
