//! Request lifecycle tests driving the ledger through the job protocol.

use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use stowage_cache::{FileCache, FileCacheConfig};
use stowage_catalog::{AddReferenceOutcome, EventPublisher, JobExecutor, Ledger, RequestsConfig};
use stowage_core::{
    CopyRequestItem, DeletionRequestItem, FileReferenceEvent, FileReferenceEventState,
    FileReferenceMetaInfo, FileRequest, FileRequestStatus, FileRequestsGroupEvent, GroupStatus, Job,
    StorageRequestItem, StowageEvent,
};
use stowage_storage::{MemoryStorage, StorageRegistry, StorageType};
use tempfile::TempDir;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<StowageEvent>>,
}

impl EventPublisher for Recorder {
    fn publish(&self, event: StowageEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Recorder {
    fn file_events(&self, checksum: &str) -> Vec<FileReferenceEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                StowageEvent::File(file) if file.checksum == checksum => Some(file.clone()),
                _ => None,
            })
            .collect()
    }

    fn file_states(&self, checksum: &str) -> Vec<FileReferenceEventState> {
        self.file_events(checksum).into_iter().map(|e| e.state).collect()
    }

    fn group_events(&self, group_id: &str) -> Vec<FileRequestsGroupEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                StowageEvent::Group(group) if group.group_id == group_id => Some(group.clone()),
                _ => None,
            })
            .collect()
    }
}

struct Fixture {
    ledger: Ledger,
    executor: JobExecutor,
    events: Arc<Recorder>,
    online: Arc<MemoryStorage>,
    tape: Arc<MemoryStorage>,
    origins: TempDir,
    _cache_dir: TempDir,
}

fn fixture_with_cache_limit(size_limit: u64) -> Fixture {
    let online = Arc::new(MemoryStorage::new("online-1", StorageType::Online));
    let tape = Arc::new(MemoryStorage::new("tape-1", StorageType::Nearline));
    let mut registry = StorageRegistry::new();
    registry.register("online-1", online.clone(), 0);
    registry.register("tape-1", tape.clone(), 1);
    let registry = Arc::new(registry);

    let cache_dir = TempDir::new().unwrap();
    let cache = FileCache::new(
        FileCacheConfig::default()
            .with_path(cache_dir.path().to_path_buf())
            .with_size_limit(size_limit),
    )
    .unwrap();

    let events = Arc::new(Recorder::default());
    let publisher: Arc<dyn EventPublisher> = events.clone();
    Fixture {
        ledger: Ledger::new(RequestsConfig::default(), registry.clone(), cache, publisher),
        executor: JobExecutor::new(registry),
        events,
        online,
        tape,
        origins: TempDir::new().unwrap(),
        _cache_dir: cache_dir,
    }
}

fn fixture() -> Fixture {
    fixture_with_cache_limit(1 << 30)
}

impl Fixture {
    fn item(&self, owner: &str, checksum: &str, storage: &str, content: &[u8]) -> StorageRequestItem {
        let path = self.origins.path().join(checksum);
        std::fs::write(&path, content).unwrap();
        let url = url::Url::from_file_path(&path).unwrap().to_string();
        let meta = FileReferenceMetaInfo::new(checksum, "MD5", format!("{}.txt", checksum), "text/plain");
        StorageRequestItem::new(owner, meta, url, storage)
    }

    async fn run(&mut self, jobs: Vec<Job>) {
        for job in jobs {
            let report = self.executor.execute(&job).await;
            self.ledger.apply_job_report(report);
        }
    }

    async fn run_storage(&mut self) {
        let jobs = self
            .ledger
            .schedule_storage_jobs(FileRequestStatus::ToDo, &[], &[]);
        self.run(jobs).await;
    }

    async fn run_deletion(&mut self) {
        let jobs = self.ledger.schedule_deletion_jobs(FileRequestStatus::ToDo, &[]);
        self.run(jobs).await;
    }

    async fn run_cache(&mut self) {
        let jobs = self.ledger.schedule_cache_jobs(FileRequestStatus::ToDo);
        self.run(jobs).await;
    }

    async fn stored(&mut self, owners: &[&str], checksum: &str, storage: &str) {
        let items = owners
            .iter()
            .map(|owner| self.item(owner, checksum, storage, b"hello"))
            .collect();
        self.ledger.store(items, "setup", Utc::now());
        self.run_storage().await;
        assert!(self.ledger.catalog().find(storage, checksum).is_some());
    }

    fn owners(&self, storage: &str, checksum: &str) -> BTreeSet<String> {
        self.ledger
            .catalog()
            .find(storage, checksum)
            .map(|r| r.owners.clone())
            .unwrap_or_default()
    }
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn test_duplicate_submission_creates_one_request() {
    let mut f = fixture();
    let item = f.item("owner-a", "a1b2c3d4", "online-1", b"hello");

    let outcomes = f.ledger.store(vec![item.clone(), item], "g1", Utc::now());
    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(f.ledger.storage_requests().len(), 1);

    f.run_storage().await;
    assert!(f.ledger.storage_requests().is_empty());
    let reference = f.ledger.catalog().find("online-1", "a1b2c3d4").unwrap();
    assert_eq!(reference.owners, set(&["owner-a"]));
    assert_eq!(reference.meta_info.file_size, Some(5));
    assert_eq!(f.online.len().await, 1);
}

#[tokio::test]
async fn test_new_owner_of_stored_file_needs_no_request() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "online-1").await;

    let item = f.item("owner-b", "a1b2c3d4", "online-1", b"hello");
    let outcomes = f.ledger.store(vec![item], "g2", Utc::now());

    assert!(matches!(outcomes[0], AddReferenceOutcome::Referenced(_)));
    assert!(f.ledger.storage_requests().is_empty());
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-a", "owner-b"]));
    assert_eq!(f.ledger.group_results("g2").unwrap().len(), 1);

    f.ledger.check_groups(Utc::now());
    let statuses: Vec<_> = f.events.group_events("g2").iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![GroupStatus::Granted, GroupStatus::Success]);
}

#[tokio::test]
async fn test_last_owner_removal_deletes_bytes() {
    let mut f = fixture();
    f.stored(&["owner-a", "owner-b"], "a1b2c3d4", "online-1").await;

    let now = Utc::now();
    assert!(f.ledger.delete(
        vec![DeletionRequestItem::new("a1b2c3d4", "online-1", "owner-a")],
        "d1",
        now
    ));
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-b"]));
    assert!(f.ledger.deletion_requests().is_empty());
    assert!(f
        .events
        .file_states("a1b2c3d4")
        .contains(&FileReferenceEventState::DeletedForOwner));

    f.ledger.delete(
        vec![DeletionRequestItem::new("a1b2c3d4", "online-1", "owner-b")],
        "d2",
        now,
    );
    assert_eq!(f.ledger.deletion_requests().len(), 1);
    assert!(f.ledger.catalog().find("online-1", "a1b2c3d4").unwrap().is_zombie());

    f.run_deletion().await;
    assert!(f.ledger.catalog().find("online-1", "a1b2c3d4").is_none());
    assert!(f.ledger.deletion_requests().is_empty());
    assert!(f.online.is_empty().await);
    assert_eq!(
        f.events.file_states("a1b2c3d4").last(),
        Some(&FileReferenceEventState::FullyDeleted)
    );
}

#[tokio::test]
async fn test_reference_during_deletion_waits_then_stores() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "online-1").await;
    let now = Utc::now();

    f.ledger.delete(
        vec![DeletionRequestItem::new("a1b2c3d4", "online-1", "owner-a")],
        "d1",
        now,
    );
    let deletion_jobs = f.ledger.schedule_deletion_jobs(FileRequestStatus::ToDo, &[]);
    assert_eq!(deletion_jobs.len(), 1);

    let item = f.item("owner-a", "a1b2c3d4", "online-1", b"hello");
    let outcome = f.ledger.add_file_reference(item, "s2");
    let AddReferenceOutcome::Requested(request_id) = outcome else {
        panic!("expected a storage request");
    };
    let status = |f: &Fixture| f.ledger.storage_requests().get(request_id).unwrap().status();
    assert_eq!(status(&f), FileRequestStatus::Delayed);
    assert!(f
        .ledger
        .schedule_storage_jobs(FileRequestStatus::ToDo, &[], &[])
        .is_empty());

    f.run(deletion_jobs).await;
    assert!(f.ledger.catalog().find("online-1", "a1b2c3d4").is_none());
    assert_eq!(status(&f), FileRequestStatus::ToDo);

    f.run_storage().await;
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-a"]));
    assert_eq!(f.online.len().await, 1);

    let states = f.events.file_states("a1b2c3d4");
    let deleted = states
        .iter()
        .position(|s| *s == FileReferenceEventState::FullyDeleted)
        .unwrap();
    let restored = states
        .iter()
        .rposition(|s| *s == FileReferenceEventState::Stored)
        .unwrap();
    assert!(deleted < restored);
}

#[tokio::test]
async fn test_forced_removal_waits_for_running_deletion() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "online-1").await;
    let now = Utc::now();

    f.ledger.delete(
        vec![DeletionRequestItem::new("a1b2c3d4", "online-1", "owner-a")],
        "d1",
        now,
    );
    let deletion_jobs = f.ledger.schedule_deletion_jobs(FileRequestStatus::ToDo, &[]);
    assert_eq!(deletion_jobs.len(), 1);

    let item = f.item("owner-b", "a1b2c3d4", "online-1", b"hello");
    let AddReferenceOutcome::Requested(request_id) = f.ledger.add_file_reference(item, "s2") else {
        panic!("expected a storage request");
    };

    f.ledger.remove_owner("a1b2c3d4", "online-1", "owner-a", true, None);
    let status = |f: &Fixture| f.ledger.storage_requests().get(request_id).unwrap().status();
    assert_eq!(status(&f), FileRequestStatus::Delayed);
    assert_eq!(f.ledger.deletion_requests().len(), 1);
    assert!(f.ledger.deletion_requests().iter().all(|d| d.force_delete));
    assert!(f
        .ledger
        .schedule_storage_jobs(FileRequestStatus::ToDo, &[], &[])
        .is_empty());

    f.run(deletion_jobs).await;
    assert!(f.ledger.deletion_requests().is_empty());
    assert_eq!(status(&f), FileRequestStatus::ToDo);

    f.run_storage().await;
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-b"]));
    assert_eq!(f.online.len().await, 1);
}

#[tokio::test]
async fn test_unknown_storage_rejected() {
    let mut f = fixture();
    let item = f.item("owner-a", "a1b2c3d4", "ghost", b"hello");
    f.ledger.store(vec![item], "g1", Utc::now());

    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.status(), FileRequestStatus::Error);
    assert!(request
        .header
        .error_cause
        .as_deref()
        .unwrap()
        .contains("destination storage ghost is unknown or disabled"));

    f.ledger.check_groups(Utc::now());
    let done = f.events.group_events("g1").pop().unwrap();
    assert_eq!(done.status, GroupStatus::Error);
    assert_eq!(done.errors.len(), 1);
    assert_eq!(
        f.events.file_states("a1b2c3d4"),
        vec![FileReferenceEventState::StoreError]
    );
}

#[tokio::test]
async fn test_invalid_origin_url_rejected() {
    let mut f = fixture();
    let meta = FileReferenceMetaInfo::new("a1b2c3d4", "MD5", "a.txt", "text/plain");
    let item = StorageRequestItem::new("owner-a", meta, "not a url", "online-1");
    f.ledger.store(vec![item], "g1", Utc::now());

    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.status(), FileRequestStatus::Error);
    assert!(request.header.error_cause.as_deref().unwrap().starts_with("Invalid URL"));
}

#[tokio::test]
async fn test_checksum_naming_a_path_rejected() {
    let mut f = fixture();
    let meta = FileReferenceMetaInfo::new("../../escaped", "MD5", "a.txt", "text/plain");
    let origin = f.origins.path().join("a.txt");
    std::fs::write(&origin, b"hi").unwrap();
    let url = url::Url::from_file_path(&origin).unwrap().to_string();
    f.ledger.store(
        vec![StorageRequestItem::new("owner-a", meta, url, "online-1")],
        "g1",
        Utc::now(),
    );

    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.status(), FileRequestStatus::Error);
    assert!(request.header.error_cause.as_deref().unwrap().starts_with("Invalid checksum"));
    assert!(f
        .ledger
        .schedule_storage_jobs(FileRequestStatus::ToDo, &[], &[])
        .is_empty());
    assert!(f.online.is_empty().await);
}

#[tokio::test]
async fn test_resubmission_resets_failed_request() {
    let mut f = fixture();
    f.online.set_offline(true);
    let item = f.item("owner-a", "a1b2c3d4", "online-1", b"hello");
    let first = f.ledger.store(vec![item.clone()], "g1", Utc::now());
    f.run_storage().await;
    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.status(), FileRequestStatus::Error);

    f.online.set_offline(false);
    let second = f.ledger.store(vec![item], "g2", Utc::now());
    assert_eq!(first, second);
    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.status(), FileRequestStatus::ToDo);
    assert!(request.header.error_cause.is_none());

    f.run_storage().await;
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-a"]));
}

#[tokio::test]
async fn test_retry_group_requeues_errors() {
    let mut f = fixture();
    f.online.set_offline(true);
    let item = f.item("owner-a", "a1b2c3d4", "online-1", b"hello");
    f.ledger.store(vec![item], "g1", Utc::now());
    f.run_storage().await;

    f.online.set_offline(false);
    assert_eq!(f.ledger.retry("g1"), 1);
    f.run_storage().await;
    assert!(f.ledger.catalog().find("online-1", "a1b2c3d4").is_some());
}

#[tokio::test]
async fn test_error_requests_scheduled_explicitly() {
    let mut f = fixture();
    f.online.set_offline(true);
    let item = f.item("owner-a", "a1b2c3d4", "online-1", b"hello");
    f.ledger.store(vec![item], "g1", Utc::now());
    f.run_storage().await;
    assert!(f
        .ledger
        .schedule_storage_jobs(FileRequestStatus::ToDo, &[], &[])
        .is_empty());

    f.online.set_offline(false);
    let jobs = f
        .ledger
        .schedule_storage_jobs(FileRequestStatus::Error, &[], &[]);
    assert_eq!(jobs.len(), 1);
    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.status(), FileRequestStatus::Pending);
    assert!(request.header.error_cause.is_none());

    f.run(jobs).await;
    assert!(f.ledger.storage_requests().is_empty());
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-a"]));
}

#[tokio::test]
async fn test_force_removal_purges_despite_other_owners() {
    let mut f = fixture();
    f.stored(&["owner-a", "owner-b"], "a1b2c3d4", "online-1").await;

    f.ledger
        .remove_owner("a1b2c3d4", "online-1", "owner-a", true, None);

    assert!(f.ledger.catalog().find("online-1", "a1b2c3d4").is_none());
    assert!(f.ledger.deletion_requests().is_empty());
    assert_eq!(f.online.len().await, 1);
    assert_eq!(
        f.events.file_states("a1b2c3d4").last(),
        Some(&FileReferenceEventState::FullyDeleted)
    );
}

#[tokio::test]
async fn test_forced_deletion_failure_counts_as_success() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "online-1").await;

    assert_eq!(
        f.ledger
            .delete_all_from_storage("online-1", true, "purge", Utc::now()),
        1
    );
    assert!(f.ledger.deletion_requests().iter().all(|r| r.force_delete));

    f.online.set_offline(true);
    f.run_deletion().await;
    assert!(f.ledger.catalog().find("online-1", "a1b2c3d4").is_none());
    assert!(f.ledger.deletion_requests().is_empty());
}

#[tokio::test]
async fn test_failed_deletion_cancelled_by_new_owner() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "online-1").await;
    f.ledger.delete(
        vec![DeletionRequestItem::new("a1b2c3d4", "online-1", "owner-a")],
        "d1",
        Utc::now(),
    );
    f.online.set_offline(true);
    f.run_deletion().await;
    let deletion = f.ledger.deletion_requests().iter().next().unwrap();
    assert_eq!(deletion.status(), FileRequestStatus::Error);
    assert!(f
        .events
        .file_states("a1b2c3d4")
        .contains(&FileReferenceEventState::DeletionError));

    f.online.set_offline(false);
    let item = f.item("owner-b", "a1b2c3d4", "online-1", b"hello");
    let outcome = f.ledger.add_file_reference(item, "s2");
    assert!(matches!(outcome, AddReferenceOutcome::Referenced(_)));
    assert!(f.ledger.deletion_requests().is_empty());
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-b"]));
}

#[tokio::test]
async fn test_failed_deletion_releases_delayed_request() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "online-1").await;
    f.ledger.delete(
        vec![DeletionRequestItem::new("a1b2c3d4", "online-1", "owner-a")],
        "d1",
        Utc::now(),
    );
    let deletion_jobs = f.ledger.schedule_deletion_jobs(FileRequestStatus::ToDo, &[]);
    let item = f.item("owner-b", "a1b2c3d4", "online-1", b"hello");
    f.ledger.add_file_reference(item, "s2");

    f.online.set_offline(true);
    f.run(deletion_jobs).await;
    assert!(f.ledger.deletion_requests().is_empty());
    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.status(), FileRequestStatus::ToDo);

    f.online.set_offline(false);
    f.run_storage().await;
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-b"]));
    assert!(f.ledger.deletion_requests().is_empty());
}

#[tokio::test]
async fn test_group_expiry_leaves_requests() {
    let mut f = fixture();
    let now = Utc::now();
    let item = f.item("owner-a", "a1b2c3d4", "online-1", b"hello");
    f.ledger.store(vec![item], "g1", now);

    assert_eq!(f.ledger.check_groups(now), 0);
    assert_eq!(f.ledger.check_groups(now + Duration::days(6)), 1);

    let expired = f.events.group_events("g1").pop().unwrap();
    assert_eq!(expired.status, GroupStatus::Expired);
    assert!(f.ledger.group_results("g1").is_err());
    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.status(), FileRequestStatus::ToDo);
}

#[tokio::test]
async fn test_deletion_denied_while_copy_pending() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "online-1").await;
    let now = Utc::now();
    f.ledger
        .copy(vec![CopyRequestItem::new("a1b2c3d4", "tape-1")], "c1", now);
    assert_eq!(f.ledger.copy_requests().len(), 1);

    let granted = f.ledger.delete(
        vec![DeletionRequestItem::new("a1b2c3d4", "online-1", "owner-a")],
        "d1",
        now,
    );
    assert!(!granted);
    let statuses: Vec<_> = f.events.group_events("d1").iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![GroupStatus::Denied]);
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-a"]));
}

#[tokio::test]
async fn test_make_available_online_is_immediate() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "online-1").await;

    let created = f
        .ledger
        .make_available(&["a1b2c3d4".to_string()], None, "av1", Utc::now());
    assert_eq!(created, 0);
    let available = f.events.file_events("a1b2c3d4").pop().unwrap();
    assert_eq!(available.state, FileReferenceEventState::Available);
    assert_eq!(
        available.location.unwrap().url,
        "memory://online-1/a1b2c3d4"
    );
}

#[tokio::test]
async fn test_nearline_restore_then_cache_hit() {
    let mut f = fixture();
    f.stored(&["owner-a"], "a1b2c3d4", "tape-1").await;
    let checksums = vec!["a1b2c3d4".to_string()];

    assert_eq!(f.ledger.make_available(&checksums, None, "av1", Utc::now()), 1);
    assert_eq!(f.ledger.cache_requests().len(), 1);

    f.run_cache().await;
    assert!(f.ledger.cache_requests().is_empty());
    let cached = f.ledger.cache().get("a1b2c3d4").unwrap();
    assert_eq!(*cached.file_size(), 5);
    assert!(cached.location().exists());
    assert_eq!(
        f.events.file_states("a1b2c3d4").last(),
        Some(&FileReferenceEventState::Available)
    );

    assert_eq!(f.ledger.make_available(&checksums, None, "av2", Utc::now()), 0);
    assert!(f.ledger.cache_requests().is_empty());
}

#[tokio::test]
async fn test_cache_jobs_respect_size_limit() {
    let mut f = fixture_with_cache_limit(8);
    f.stored(&["owner-a"], "a1b2c3d4", "tape-1").await;
    f.stored(&["owner-a"], "e5f6a7b8", "tape-1").await;

    let checksums = vec!["a1b2c3d4".to_string(), "e5f6a7b8".to_string()];
    assert_eq!(f.ledger.make_available(&checksums, None, "av1", Utc::now()), 2);

    let jobs = f.ledger.schedule_cache_jobs(FileRequestStatus::ToDo);
    let claimed: usize = jobs.iter().map(|j| j.items.len()).sum();
    assert_eq!(claimed, 1);
    assert_eq!(
        f.ledger.cache_requests().with_status(FileRequestStatus::ToDo).len(),
        1
    );

    f.run(jobs).await;
    assert!(f
        .ledger
        .schedule_cache_jobs(FileRequestStatus::ToDo)
        .is_empty());
}

#[tokio::test]
async fn test_copy_from_nearline_to_online() {
    let mut f = fixture();
    f.stored(&["owner-a", "owner-b"], "a1b2c3d4", "tape-1").await;
    let now = Utc::now();

    f.ledger
        .copy(vec![CopyRequestItem::new("a1b2c3d4", "online-1")], "c1", now);
    assert_eq!(f.ledger.schedule_copy_requests(FileRequestStatus::ToDo, now), 1);
    let copy = f.ledger.copy_requests().iter().next().unwrap();
    assert_eq!(copy.status(), FileRequestStatus::Pending);
    assert_eq!(f.ledger.cache_requests().len(), 1);

    f.run_cache().await;
    let request = f.ledger.storage_requests().iter().next().unwrap();
    assert_eq!(request.storage, "online-1");
    assert!(request.origin_url.starts_with("file://"));

    f.run_storage().await;
    assert!(f.ledger.copy_requests().is_empty());
    assert_eq!(f.owners("online-1", "a1b2c3d4"), set(&["owner-a", "owner-b"]));
    assert_eq!(f.online.len().await, 1);
    assert!(f
        .events
        .file_states("a1b2c3d4")
        .contains(&FileReferenceEventState::Copied));
    assert_eq!(f.ledger.take_evictions(), vec!["a1b2c3d4".to_string()]);

    f.ledger.check_groups(now);
    let done = f.events.group_events("c1").pop().unwrap();
    assert_eq!(done.status, GroupStatus::Success);
    assert_eq!(done.successes.len(), 1);
}

#[tokio::test]
async fn test_copy_of_unknown_file_refused() {
    let mut f = fixture();
    f.ledger
        .copy(vec![CopyRequestItem::new("deadbeef", "online-1")], "c1", Utc::now());
    assert!(f.ledger.copy_requests().is_empty());
    assert_eq!(
        f.events.file_states("deadbeef"),
        vec![FileReferenceEventState::CopyError]
    );
    assert!(f.ledger.group_results("c1").unwrap()[0].error);
}

#[tokio::test]
async fn test_storage_jobs_batch_by_storage() {
    let mut f = fixture();
    let items = vec![
        f.item("owner-a", "a1b2c3d4", "online-1", b"one"),
        f.item("owner-a", "e5f6a7b8", "online-1", b"two"),
        f.item("owner-a", "c9d0e1f2", "tape-1", b"three"),
    ];
    f.ledger.store(items, "g1", Utc::now());
    assert!(f.ledger.is_storage_running("online-1"));

    let jobs = f
        .ledger
        .schedule_storage_jobs(FileRequestStatus::ToDo, &[], &[]);
    assert_eq!(jobs.len(), 2);
    let online_job = jobs.iter().find(|j| j.storage == "online-1").unwrap();
    assert_eq!(online_job.items.len(), 2);
    assert!(f
        .ledger
        .storage_requests()
        .iter()
        .all(|r| r.status() == FileRequestStatus::Pending));

    f.run(jobs).await;
    assert_eq!(f.ledger.catalog().len(), 3);
    assert_eq!(f.tape.len().await, 1);
    assert!(!f.ledger.is_storage_running("online-1"));
}

#[tokio::test]
async fn test_retry_by_owners_only_touches_their_requests() {
    let mut f = fixture();
    f.online.set_offline(true);
    let items = vec![
        f.item("owner-a", "a1b2c3d4", "online-1", b"one"),
        f.item("owner-b", "e5f6a7b8", "online-1", b"two"),
    ];
    f.ledger.store(items, "g1", Utc::now());
    f.run_storage().await;
    assert_eq!(f.ledger.storage_requests().with_status(FileRequestStatus::Error).len(), 2);

    assert_eq!(f.ledger.retry_by_owners(&["owner-b".to_string()]), 1);
    let todo = f.ledger.storage_requests().with_status(FileRequestStatus::ToDo);
    assert_eq!(todo.len(), 1);
    assert!(todo[0].owners.contains("owner-b"));
}

#[tokio::test]
async fn test_delete_requests_by_storage() {
    let mut f = fixture();
    f.online.set_offline(true);
    let items = vec![
        f.item("owner-a", "a1b2c3d4", "online-1", b"one"),
        f.item("owner-a", "e5f6a7b8", "tape-1", b"two"),
    ];
    f.ledger.store(items, "g1", Utc::now());
    f.run_storage().await;

    assert_eq!(
        f.ledger
            .delete_requests_by_storage("online-1", Some(FileRequestStatus::ToDo)),
        0
    );
    assert_eq!(f.ledger.delete_requests_by_storage("online-1", None), 1);
    assert!(!f.ledger.is_storage_running("online-1"));
    assert_eq!(f.ledger.storage_requests().len(), 0);
    assert_eq!(f.ledger.catalog().len(), 1);
}
