//! Request groups and their per-file results.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use stowage_core::{
    FileRequestType, FileRequestsGroupEvent, GroupStatus, RequestGroup, RequestResultInfo,
};

/// Live groups and the results recorded for them.
///
/// Results for a group that is not live (never granted, done or expired)
/// are dropped.
#[derive(Debug, Default, Clone)]
pub struct GroupTracker {
    groups: HashMap<String, RequestGroup>,
    results: HashMap<String, Vec<RequestResultInfo>>,
}

impl GroupTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a group. Returns `None` if the id is already live.
    #[tracing::instrument(skip(self))]
    pub fn grant(
        &mut self,
        id: &str,
        request_type: FileRequestType,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Option<FileRequestsGroupEvent> {
        if self.groups.contains_key(id) {
            tracing::warn!("[REQUEST GROUPS] Group already granted, ignoring");
            return None;
        }
        self.groups.insert(
            id.to_string(),
            RequestGroup::new(id, request_type, expiration_date),
        );
        tracing::debug!("[REQUEST GROUPS] Group granted");
        Some(FileRequestsGroupEvent::new(id, request_type, GroupStatus::Granted))
    }

    /// Deny a group as a whole, forgetting it.
    #[tracing::instrument(skip(self))]
    pub fn deny(&mut self, id: &str, request_type: FileRequestType, cause: &str) -> FileRequestsGroupEvent {
        self.groups.remove(id);
        self.results.remove(id);
        tracing::info!("[REQUEST GROUPS] Group denied");
        let mut event = FileRequestsGroupEvent::new(id, request_type, GroupStatus::Denied);
        event.message = Some(cause.to_string());
        event
    }

    /// Check whether a group is live.
    pub fn contains(&self, id: &str) -> bool {
        self.groups.contains_key(id)
    }

    /// Live groups.
    pub fn groups(&self) -> impl Iterator<Item = &RequestGroup> {
        self.groups.values()
    }

    /// Record one result. Dropped when the group is not live.
    pub fn add_result(&mut self, result: RequestResultInfo) {
        if !self.groups.contains_key(&result.group_id) {
            tracing::trace!(group_id = %result.group_id, "[REQUEST GROUPS] Result for unknown group dropped");
            return;
        }
        self.results
            .entry(result.group_id.clone())
            .or_default()
            .push(result);
    }

    /// Results recorded for a live group.
    pub fn results(&self, id: &str) -> Option<Vec<RequestResultInfo>> {
        self.groups
            .contains_key(id)
            .then(|| self.results.get(id).cloned().unwrap_or_default())
    }

    /// Finish a group, reporting SUCCESS or ERROR with its results.
    pub fn complete(&mut self, id: &str) -> Option<FileRequestsGroupEvent> {
        let group = self.groups.remove(id)?;
        let (errors, successes): (Vec<_>, Vec<_>) = self
            .results
            .remove(id)
            .unwrap_or_default()
            .into_iter()
            .partition(|r| r.error);
        let status = if errors.is_empty() {
            GroupStatus::Success
        } else {
            GroupStatus::Error
        };
        tracing::info!(group_id = %id, %status, successes = successes.len(), errors = errors.len(), "[REQUEST GROUPS] Group done");
        let mut event = FileRequestsGroupEvent::new(id, group.request_type, status);
        event.successes = successes;
        event.errors = errors;
        Some(event)
    }

    /// Abandon a group for reporting, discarding its results.
    pub fn expire(&mut self, id: &str) -> Option<FileRequestsGroupEvent> {
        let group = self.groups.remove(id)?;
        self.results.remove(id);
        tracing::warn!(group_id = %id, "[REQUEST GROUPS] Group expired");
        let mut event = FileRequestsGroupEvent::new(id, group.request_type, GroupStatus::Expired);
        event.message = Some("Request group expired before every file reported".to_string());
        Some(event)
    }
}
