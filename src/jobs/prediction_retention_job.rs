use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::database::repositories::PredictionRepository;
use crate::errors::ServiceError;

/// Prediction retention job
///
/// Runs at the top of every hour and deletes all but the newest `keep`
/// predictions of each ticker in the store.
pub struct PredictionRetentionJob {
    repository: Arc<dyn PredictionRepository>,
    keep: i64,
}

impl PredictionRetentionJob {
    pub fn new(repository: Arc<dyn PredictionRepository>, keep: i64) -> Self {
        Self {
            repository,
            keep: keep.max(1),
        }
    }

    /// Prune every ticker; returns the number of rows deleted
    async fn prune_all(&self) -> Result<usize, ServiceError> {
        let repository = self.repository.clone();
        let keep = self.keep;

        tokio::task::spawn_blocking(move || {
            let mut deleted = 0;
            for ticker in repository.tickers()? {
                let removed = repository.prune(&ticker, keep)?;
                if removed > 0 {
                    tracing::debug!("   {}: {} old predictions removed", ticker, removed);
                }
                deleted += removed;
            }
            Ok::<_, ServiceError>(deleted)
        })
        .await?
    }

    /// Register this job with the scheduler
    ///
    /// Schedule: hourly (0 0 * * * *)
    pub async fn register(self, scheduler: &JobScheduler) -> Result<(), Box<dyn std::error::Error>> {
        let repository = self.repository.clone();
        let keep = self.keep;

        let job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
            let repository = repository.clone();

            Box::pin(async move {
                let job = PredictionRetentionJob { repository, keep };

                match job.prune_all().await {
                    Ok(0) => tracing::debug!("🧹 Prediction retention: nothing to prune"),
                    Ok(n) => tracing::info!("🧹 Prediction retention: {} rows deleted", n),
                    Err(e) => tracing::error!("❌ Prediction retention job failed: {}", e),
                }
            })
        })?;

        scheduler.add(job).await?;

        tracing::info!("✅ Prediction retention job registered (keeps {} per ticker, hourly)", self.keep);

        Ok(())
    }

    /// Run retention immediately (manual trigger)
    pub async fn run_now(&self) -> Result<usize, ServiceError> {
        self.prune_all().await
    }
}
