//! Arena tables of requests with a uniqueness index.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use stowage_core::{
    FileCacheRequest, FileCopyRequest, FileDeletionRequest, FileRequest, FileRequestStatus,
    FileStorageRequest, ReferenceKey, RequestId,
};

/// A request kind stored in a [`RequestTable`].
///
/// At most one request exists per key; the key never changes once inserted.
pub trait LedgerRequest: FileRequest + Clone + Debug {
    /// Uniqueness key.
    type Key: Clone + Eq + Hash + Debug;

    /// Key of this request.
    fn ledger_key(&self) -> Self::Key;
}

impl LedgerRequest for FileStorageRequest {
    type Key = ReferenceKey;

    fn ledger_key(&self) -> ReferenceKey {
        ReferenceKey::new(&self.storage, &self.meta_info.checksum)
    }
}

impl LedgerRequest for FileDeletionRequest {
    type Key = ReferenceKey;

    fn ledger_key(&self) -> ReferenceKey {
        ReferenceKey::new(&self.location.storage, &self.meta_info.checksum)
    }
}

impl LedgerRequest for FileCopyRequest {
    type Key = ReferenceKey;

    fn ledger_key(&self) -> ReferenceKey {
        ReferenceKey::new(&self.storage, &self.meta_info.checksum)
    }
}

impl LedgerRequest for FileCacheRequest {
    type Key = String;

    fn ledger_key(&self) -> String {
        self.meta_info.checksum.clone()
    }
}

/// Requests of one kind, ordered by id and indexed by key.
#[derive(Debug, Clone)]
pub struct RequestTable<R: LedgerRequest> {
    requests: BTreeMap<RequestId, R>,
    index: HashMap<R::Key, RequestId>,
}

impl<R: LedgerRequest> Default for RequestTable<R> {
    fn default() -> Self {
        Self {
            requests: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<R: LedgerRequest> RequestTable<R> {
    /// Insert a request, replacing any request with the same key.
    pub fn insert(&mut self, request: R) -> RequestId {
        let id = request.id();
        if let Some(previous) = self.index.insert(request.ledger_key(), id)
            && previous != id
        {
            tracing::warn!(previous = %previous, replacement = %id, "Replacing request with the same key");
            self.requests.remove(&previous);
        }
        self.requests.insert(id, request);
        id
    }

    /// Request by id.
    pub fn get(&self, id: RequestId) -> Option<&R> {
        self.requests.get(&id)
    }

    /// Mutable request by id.
    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut R> {
        self.requests.get_mut(&id)
    }

    /// Request by key.
    pub fn by_key(&self, key: &R::Key) -> Option<&R> {
        self.index.get(key).and_then(|id| self.requests.get(id))
    }

    /// Mutable request by key.
    pub fn by_key_mut(&mut self, key: &R::Key) -> Option<&mut R> {
        let id = self.index.get(key)?;
        self.requests.get_mut(id)
    }

    /// Remove a request by id.
    pub fn remove(&mut self, id: RequestId) -> Option<R> {
        let request = self.requests.remove(&id)?;
        self.index.remove(&request.ledger_key());
        Some(request)
    }

    /// Remove every request matching the predicate, returning them.
    pub fn remove_where(&mut self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        self.ids_where(predicate)
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    /// Requests in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.requests.values()
    }

    /// Ids of requests matching the predicate, ascending.
    pub fn ids_where(&self, predicate: impl Fn(&R) -> bool) -> Vec<RequestId> {
        self.requests
            .values()
            .filter(|r| predicate(r))
            .map(|r| r.id())
            .collect()
    }

    /// Requests with the given status, ascending.
    pub fn with_status(&self, status: FileRequestStatus) -> Vec<&R> {
        self.requests.values().filter(|r| r.status() == status).collect()
    }

    /// Number of requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use stowage_core::{FileReferenceMetaInfo, RequestHeader};

    fn request(id: u64, storage: &str, checksum: &str) -> FileStorageRequest {
        FileStorageRequest {
            header: RequestHeader::new(RequestId(id), "g", FileRequestStatus::ToDo),
            owners: BTreeSet::from(["a".to_string()]),
            meta_info: FileReferenceMetaInfo::new(checksum, "MD5", "f", "text/plain"),
            origin_url: "file:///tmp/f".to_string(),
            storage: storage.to_string(),
            sub_directory: None,
        }
    }

    #[test]
    fn test_key_index_follows_removals() {
        let mut table = RequestTable::default();
        table.insert(request(1, "s1", "c1"));
        table.insert(request(2, "s1", "c2"));

        let key = ReferenceKey::new("s1", "c1");
        assert_eq!(table.by_key(&key).map(|r| r.id()), Some(RequestId(1)));

        table.remove(RequestId(1));
        assert!(table.by_key(&key).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_same_key_replaces() {
        let mut table = RequestTable::default();
        table.insert(request(1, "s1", "c1"));
        table.insert(request(2, "s1", "c1"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next().map(|r| r.id()), Some(RequestId(2)));
    }
}
