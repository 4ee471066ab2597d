//! Tests for the core data model.

use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use stowage_core::{
    FileLocation, FileReference, FileReferenceEvent, FileReferenceEventState, FileReferenceFilterBuilder,
    FileReferenceMetaInfo, FileRequest, FileRequestStatus, FileStorageRequest, Page, PageRequest,
    RequestGroup, RequestHeader, RequestId, StowageEvent, FileRequestType, JobId, is_valid_checksum,
};
use stowage_error::BuilderErrorKind;

fn reference(checksum: &str, storage: &str, name: &str) -> FileReference {
    let meta = FileReferenceMetaInfo::new(checksum, "MD5", name, "text/plain");
    FileReference::new(meta, FileLocation::new(storage, format!("memory://{storage}/{checksum}")), ["owner-a"])
}

#[test]
fn test_status_display_uses_wire_names() {
    assert_eq!(FileRequestStatus::ToDo.to_string(), "TO_DO");
    assert_eq!(FileRequestStatus::Delayed.to_string(), "DELAYED");
    assert_eq!(
        serde_json::to_string(&FileRequestStatus::Pending).unwrap(),
        "\"PENDING\""
    );
    assert!(FileRequestStatus::ToDo.is_running());
    assert!(FileRequestStatus::Pending.is_running());
    assert!(!FileRequestStatus::Error.is_running());
    assert!(!FileRequestStatus::Delayed.is_running());
}

#[test]
fn test_zombie_reference() {
    let mut file = reference("abc123", "online-1", "a.txt");
    assert!(!file.is_zombie());
    file.owners.clear();
    assert!(file.is_zombie());
    assert_eq!(file.key().to_string(), "(online-1, abc123)");
}

#[test]
fn test_meta_merge_keeps_content_identity() {
    let mut meta = FileReferenceMetaInfo::new("abc123", "MD5", "a.txt", "text/plain").with_file_size(12u64);
    let other = FileReferenceMetaInfo::new("abc123", "MD5", "b.txt", "text/plain").with_file_type("report");
    meta.merge_submission(&other);
    assert_eq!(meta.file_name, "b.txt");
    assert_eq!(meta.file_type.as_deref(), Some("report"));
    assert_eq!(meta.file_size, Some(12));
    assert_eq!(meta.tagged_checksum(), "MD5:abc123");
}

#[test]
fn test_request_header_transitions() {
    let mut header = RequestHeader::new(RequestId(1), "group-1", FileRequestStatus::ToDo);
    header.claim(JobId(7));
    assert_eq!(header.status, FileRequestStatus::Pending);
    assert_eq!(header.job_id, Some(JobId(7)));

    header.fail("disk full");
    assert_eq!(header.status, FileRequestStatus::Error);
    assert_eq!(header.error_cause.as_deref(), Some("disk full"));
    assert!(header.job_id.is_none());

    header.reset(FileRequestStatus::ToDo);
    assert!(header.error_cause.is_none());
}

#[test]
fn test_claim_after_failure_drops_error_cause() {
    let mut header = RequestHeader::new(RequestId(2), "group-1", FileRequestStatus::ToDo);
    header.fail("storage offline");

    header.claim(JobId(8));
    assert_eq!(header.status, FileRequestStatus::Pending);
    assert_eq!(header.job_id, Some(JobId(8)));
    assert!(header.error_cause.is_none());
}

#[test]
fn test_checksum_validation() {
    assert!(is_valid_checksum("a1b2c3d4"));
    assert!(is_valid_checksum("ABCDEF0123456789"));
    assert!(!is_valid_checksum(""));
    assert!(!is_valid_checksum("../../etc"));
    assert!(!is_valid_checksum("ab/cd"));
    assert!(!is_valid_checksum("ab.cd"));
    assert!(!is_valid_checksum("MD5:abc"));

    let meta = FileReferenceMetaInfo::new("..", "MD5", "x.txt", "text/plain");
    assert!(!meta.has_valid_checksum());
}

#[test]
fn test_storage_request_accessors() {
    let request = FileStorageRequest {
        header: RequestHeader::new(RequestId(3), "group-1", FileRequestStatus::ToDo),
        owners: BTreeSet::from(["owner-a".to_string()]),
        meta_info: FileReferenceMetaInfo::new("abc123", "MD5", "a.txt", "text/plain"),
        origin_url: "file:///tmp/a.txt".to_string(),
        storage: "online-1".to_string(),
        sub_directory: None,
    };
    assert_eq!(request.checksum(), "abc123");
    assert_eq!(FileRequest::storage(&request), "online-1");
    assert_eq!(<FileStorageRequest as FileRequest>::TYPE, FileRequestType::Storage);
    assert!(request.in_group("group-1"));
    assert!(!request.in_group("group-2"));
}

#[test]
fn test_group_expiration() {
    let now = Utc::now();
    let group = RequestGroup::new("g", FileRequestType::Storage, Some(now - Duration::hours(1)));
    assert!(group.is_expired(now));
    let open = RequestGroup::new("g", FileRequestType::Storage, None);
    assert!(!open.is_expired(now));
}

#[test]
fn test_filter_matches() {
    let file = reference("abc123", "online-1", "monthly-report.pdf");
    let by_name = FileReferenceFilterBuilder::default()
        .file_name(Some("report".to_string()))
        .build()
        .unwrap();
    assert!(by_name.matches(&file));

    let by_storage = FileReferenceFilterBuilder::default()
        .storages(BTreeSet::from(["nearline-1".to_string()]))
        .build()
        .unwrap();
    assert!(!by_storage.matches(&file));

    let by_type = FileReferenceFilterBuilder::default()
        .types(BTreeSet::from(["invoice".to_string()]))
        .build()
        .unwrap();
    assert!(!by_type.matches(&file));
}

#[test]
fn test_filter_builder_rejects_inverted_range() {
    let now = Utc::now();
    let err = FileReferenceFilterBuilder::default()
        .from(Some(now))
        .to(Some(now - Duration::days(1)))
        .build()
        .unwrap_err();
    assert!(matches!(err.kind(), BuilderErrorKind::InvalidField { field, .. } if field == "to"));
}

#[test]
fn test_page_slicing() {
    let page = Page::from_all((0..25).collect::<Vec<_>>(), PageRequest::new(1, 10));
    assert_eq!(page.content(), &(10..20).collect::<Vec<_>>());
    assert_eq!(*page.total_elements(), 25);
    assert!(page.has_next());

    let last = Page::from_all((0..25).collect::<Vec<_>>(), PageRequest::new(2, 10));
    assert_eq!(last.content().len(), 5);
    assert!(!last.has_next());
}

#[test]
fn test_event_serializes_state() {
    let event: StowageEvent =
        FileReferenceEvent::new("abc123", FileReferenceEventState::FullyDeleted, "deleted").into();
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("FULLY_DELETED"));

    let error = FileReferenceEvent::new("abc123", FileReferenceEventState::StoreError, "failed")
        .with_error("disk full");
    assert!(error.is_error());
}
