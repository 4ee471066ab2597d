//! In-process job execution against the storage backends.

use std::sync::Arc;
use stowage_core::{ItemOutcome, ItemResult, Job, JobAction, JobItem, JobReport};
use stowage_error::StowageResult;
use stowage_storage::{StorageBackend, StorageRegistry};

/// Moves the bytes of scheduled jobs.
///
/// Items of one job run in order; the report is returned only once every
/// item is done, so a job never commits partially.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    registry: Arc<StorageRegistry>,
}

impl JobExecutor {
    /// Create an executor over the registered storages.
    pub fn new(registry: Arc<StorageRegistry>) -> Self {
        Self { registry }
    }

    /// Execute a job, producing one outcome per item.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, kind = %job.kind, storage = %job.storage, items = job.items.len()))]
    pub async fn execute(&self, job: &Job) -> JobReport {
        let outcomes = match self.registry.get(&job.storage) {
            Some(backend) => {
                let mut outcomes = Vec::with_capacity(job.items.len());
                for item in &job.items {
                    let result = match self.execute_item(backend.as_ref(), item).await {
                        Ok(result) => result,
                        Err(e) => {
                            tracing::warn!(request_id = %item.request_id, error = %e, "Job item failed");
                            ItemResult::Failed {
                                cause: e.to_string(),
                            }
                        }
                    };
                    outcomes.push(ItemOutcome {
                        request_id: item.request_id,
                        result,
                    });
                }
                outcomes
            }
            None => {
                tracing::error!("No backend registered for job storage");
                job.items
                    .iter()
                    .map(|item| {
                        ItemOutcome::failed(
                            item.request_id,
                            format!("storage {} is unknown or disabled", job.storage),
                        )
                    })
                    .collect()
            }
        };
        tracing::debug!(
            failed = outcomes.iter().filter(|o| matches!(o.result, ItemResult::Failed { .. })).count(),
            "Job executed"
        );
        JobReport {
            job_id: job.id,
            kind: job.kind,
            storage: job.storage.clone(),
            outcomes,
        }
    }

    async fn execute_item(&self, backend: &dyn StorageBackend, item: &JobItem) -> StowageResult<ItemResult> {
        match &item.action {
            JobAction::Store {
                origin_url,
                sub_directory,
            } => {
                let data = self.registry.read_origin(origin_url).await?;
                let stored = backend
                    .store(&data, &item.meta_info, sub_directory.as_deref())
                    .await?;
                Ok(ItemResult::Stored {
                    url: stored.url,
                    file_size: stored.file_size,
                })
            }
            JobAction::Delete { location } => {
                backend.delete(location).await?;
                Ok(ItemResult::Deleted)
            }
            JobAction::Restore {
                location,
                restoration_directory,
            } => {
                let path = restoration_directory.join(&item.meta_info.checksum);
                let file_size = backend.restore(location, &path).await?;
                Ok(ItemResult::Restored { path, file_size })
            }
        }
    }
}
