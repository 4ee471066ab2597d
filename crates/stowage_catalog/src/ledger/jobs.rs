//! Two-phase job protocol: claim requests into jobs, apply job reports.

use super::Ledger;
use crate::reconcile::{ReferenceChange, ReferenceEvent, reconcile};
use crate::table::LedgerRequest;
use std::collections::BTreeMap;
use stowage_core::{
    FileRequest, FileRequestStatus, ItemResult, Job, JobAction, JobId, JobItem, JobKind, JobReport,
    RequestId,
};

impl Ledger {
    /// Claim storage requests with the given status into jobs.
    ///
    /// Filters by storage and owner apply when non-empty. Requests whose
    /// file is being deleted are moved to DELAYED instead.
    #[tracing::instrument(skip(self))]
    pub fn schedule_storage_jobs(
        &mut self,
        status: FileRequestStatus,
        storages: &[String],
        owners: &[String],
    ) -> Vec<Job> {
        if !is_schedulable(status) {
            tracing::warn!("[STORAGE REQUESTS] Only TO_DO or ERROR requests can be scheduled");
            return Vec::new();
        }
        let ids = self.storage_requests.ids_where(|r| {
            r.status() == status
                && (storages.is_empty() || storages.contains(&r.storage))
                && (owners.is_empty() || owners.iter().any(|o| r.owners.contains(o)))
        });

        let mut by_storage: BTreeMap<String, Vec<RequestId>> = BTreeMap::new();
        for id in ids {
            let Some(request) = self.storage_requests.get(id) else {
                continue;
            };
            let storage = request.storage.clone();
            let deleting = self
                .deletion_requests
                .by_key(&request.ledger_key())
                .is_some_and(|d| d.status().is_running());
            if !self.registry.contains(&storage) {
                let cause = format!("destination storage {} is unknown or disabled", storage);
                self.fail_storage_request(id, &cause);
            } else if deleting {
                if let Some(request) = self.storage_requests.get_mut(id) {
                    request.header.reset(FileRequestStatus::Delayed);
                }
            } else {
                by_storage.entry(storage).or_default().push(id);
            }
        }

        self.build_jobs(JobKind::Storage, by_storage, |ledger, id, job_id| {
            let request = ledger.storage_requests.get_mut(id)?;
            request.header.claim(job_id);
            Some(JobItem {
                request_id: id,
                meta_info: request.meta_info.clone(),
                action: JobAction::Store {
                    origin_url: request.origin_url.clone(),
                    sub_directory: request.sub_directory.clone(),
                },
            })
        })
    }

    /// Claim deletion requests with the given status into jobs.
    #[tracing::instrument(skip(self))]
    pub fn schedule_deletion_jobs(&mut self, status: FileRequestStatus, storages: &[String]) -> Vec<Job> {
        if !is_schedulable(status) {
            tracing::warn!("[DELETION REQUESTS] Only TO_DO or ERROR requests can be scheduled");
            return Vec::new();
        }
        let ids = self.deletion_requests.ids_where(|r| {
            r.status() == status && (storages.is_empty() || storages.contains(&r.location.storage))
        });

        let mut by_storage: BTreeMap<String, Vec<RequestId>> = BTreeMap::new();
        for id in ids {
            let Some(request) = self.deletion_requests.get(id) else {
                continue;
            };
            let storage = request.location.storage.clone();
            if self.registry.contains(&storage) {
                by_storage.entry(storage).or_default().push(id);
            } else if let Some(request) = self.deletion_requests.get_mut(id) {
                request
                    .header
                    .fail(format!("storage {} is unknown or disabled", storage));
            }
        }

        self.build_jobs(JobKind::Deletion, by_storage, |ledger, id, job_id| {
            let request = ledger.deletion_requests.get_mut(id)?;
            request.header.claim(job_id);
            Some(JobItem {
                request_id: id,
                meta_info: request.meta_info.clone(),
                action: JobAction::Delete {
                    location: request.location.clone(),
                },
            })
        })
    }

    /// Claim cache requests with the given status into jobs.
    ///
    /// Only requests fitting in the free cache space, minus what pending
    /// restorations will take, are claimed. The others stay as they are.
    #[tracing::instrument(skip(self))]
    pub fn schedule_cache_jobs(&mut self, status: FileRequestStatus) -> Vec<Job> {
        if !is_schedulable(status) {
            tracing::warn!("[CACHE REQUESTS] Only TO_DO or ERROR requests can be scheduled");
            return Vec::new();
        }
        let reserved: u64 = self
            .cache_requests
            .with_status(FileRequestStatus::Pending)
            .into_iter()
            .map(|r| r.file_size())
            .sum();
        let mut available = self.cache.free_space().saturating_sub(reserved);
        let ids = self.cache_requests.ids_where(|r| r.status() == status);

        let mut by_storage: BTreeMap<String, Vec<RequestId>> = BTreeMap::new();
        let mut full = false;
        for id in ids {
            let Some(request) = self.cache_requests.get(id) else {
                continue;
            };
            let storage = request.location.storage.clone();
            let size = request.file_size();
            if !self.registry.contains(&storage) {
                let cause = format!("storage {} is unknown or disabled", storage);
                self.fail_cache_request(id, &cause);
            } else if size > available {
                full = true;
            } else {
                available -= size;
                by_storage.entry(storage).or_default().push(id);
            }
        }
        if full && !self.cache_full_warned {
            tracing::warn!(
                free_space = self.cache.free_space(),
                reserved,
                "[CACHE REQUESTS] Cache is full, remaining restorations wait for space"
            );
        }
        self.cache_full_warned = full;

        self.build_jobs(JobKind::Cache, by_storage, |ledger, id, job_id| {
            let request = ledger.cache_requests.get_mut(id)?;
            request.header.claim(job_id);
            Some(JobItem {
                request_id: id,
                meta_info: request.meta_info.clone(),
                action: JobAction::Restore {
                    location: request.location.clone(),
                    restoration_directory: request.restoration_directory.clone(),
                },
            })
        })
    }

    fn build_jobs(
        &mut self,
        kind: JobKind,
        by_storage: BTreeMap<String, Vec<RequestId>>,
        mut claim: impl FnMut(&mut Self, RequestId, JobId) -> Option<JobItem>,
    ) -> Vec<Job> {
        let per_job = (*self.settings.requests_per_job()).max(1);
        let mut jobs = Vec::new();
        for (storage, ids) in by_storage {
            for chunk in ids.chunks(per_job) {
                let job_id = self.next_job_id();
                let mut items = Vec::with_capacity(chunk.len());
                for id in chunk {
                    if let Some(item) = claim(&mut *self, *id, job_id) {
                        items.push(item);
                    }
                }
                if items.is_empty() {
                    continue;
                }
                tracing::info!(%job_id, %kind, %storage, count = items.len(), "Job scheduled");
                jobs.push(Job {
                    id: job_id,
                    kind,
                    storage: storage.clone(),
                    items,
                });
            }
        }
        jobs
    }

    /// Apply the report of an executed job.
    ///
    /// Outcomes for requests no longer claimed by this job (removed or
    /// rescheduled meanwhile) are ignored.
    #[tracing::instrument(skip(self, report), fields(job_id = %report.job_id, kind = %report.kind, storage = %report.storage))]
    pub fn apply_job_report(&mut self, report: JobReport) {
        for outcome in report.outcomes {
            let claimed = match report.kind {
                JobKind::Storage => self.storage_requests.get(outcome.request_id).map(|r| r.header().job_id),
                JobKind::Deletion => self.deletion_requests.get(outcome.request_id).map(|r| r.header().job_id),
                JobKind::Cache => self.cache_requests.get(outcome.request_id).map(|r| r.header().job_id),
            };
            if claimed != Some(Some(report.job_id)) {
                tracing::warn!(request_id = %outcome.request_id, "Outcome for a request not claimed by this job, ignored");
                continue;
            }
            match (report.kind, outcome.result) {
                (JobKind::Storage, ItemResult::Stored { url, file_size }) => {
                    self.complete_storage_request(outcome.request_id, &url, file_size)
                }
                (JobKind::Deletion, ItemResult::Deleted) => self.complete_deletion_request(outcome.request_id),
                (JobKind::Cache, ItemResult::Restored { file_size, .. }) => {
                    self.complete_cache_request(outcome.request_id, file_size)
                }
                (kind, ItemResult::Failed { cause }) => self.fail_claimed(kind, outcome.request_id, &cause),
                (kind, result) => {
                    let cause = format!("unexpected outcome {:?} for a {} job", result, kind);
                    self.fail_claimed(kind, outcome.request_id, &cause)
                }
            }
        }
    }

    fn fail_claimed(&mut self, kind: JobKind, id: RequestId, cause: &str) {
        match kind {
            JobKind::Storage => self.fail_storage_request(id, cause),
            JobKind::Deletion => {
                let Some(request) = self.deletion_requests.get(id).cloned() else {
                    return;
                };
                if request.force_delete {
                    tracing::warn!(
                        location = %request.location.url,
                        %cause,
                        "[DELETION REQUESTS] Forced deletion failed, file left on storage"
                    );
                    self.complete_deletion_request(id);
                } else {
                    self.fail_deletion_request(&request, cause);
                }
            }
            JobKind::Cache => self.fail_cache_request(id, cause),
        }
    }

    fn complete_storage_request(&mut self, id: RequestId, url: &str, file_size: u64) {
        let Some(request) = self.storage_requests.remove(id) else {
            return;
        };
        let key = request.ledger_key();
        let transition = reconcile(
            self.catalog.get(&key),
            ReferenceEvent::Stored {
                request: &request,
                url,
                file_size,
            },
        );
        let reference = match &transition.reference {
            ReferenceChange::Upsert(reference) => Some(reference.clone()),
            _ => None,
        };
        // a referenced file must not keep a stale deletion request
        if let Some(deletion) = self.deletion_requests.by_key(&key)
            && !deletion.status().is_running()
        {
            let deletion_id = deletion.id();
            self.deletion_requests.remove(deletion_id);
        }
        tracing::info!(%key, file_size, "[STORAGE REQUESTS] File stored");
        self.report_stored(&request, reference.as_ref());
        self.apply_transition(transition, None);
    }

    fn complete_deletion_request(&mut self, id: RequestId) {
        let Some(request) = self.deletion_requests.remove(id) else {
            return;
        };
        tracing::info!(location = %request.location.url, "[DELETION REQUESTS] File deleted");
        let transition = reconcile(
            self.catalog.get(&request.ledger_key()),
            ReferenceEvent::Deleted { request: &request },
        );
        self.apply_transition(transition, None);
    }
}

fn is_schedulable(status: FileRequestStatus) -> bool {
    matches!(status, FileRequestStatus::ToDo | FileRequestStatus::Error)
}
