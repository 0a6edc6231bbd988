// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::*;
use crate::auth::Role;
use crate::storage::{BlobArea, DownloadLog, InMemoryMetadata, MetadataResult, PurgedRecords};

struct Harness {
    _dir: TempDir,
    vault: Vault,
}

impl Harness {
    fn blobs(&self) -> &BlobStore {
        &self.vault.core.blobs
    }
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let vault = Vault::open(StoragePaths::new(dir.path())).unwrap();
    Harness { _dir: dir, vault }
}

fn alice() -> Requester {
    Requester::new("alice", Role::Client)
}

fn bob() -> Requester {
    Requester::new("bob", Role::Client)
}

fn admin() -> Requester {
    Requester::new("root", Role::Admin)
}

fn upload_request(owner: &str, payload: &[u8]) -> UploadRequest {
    UploadRequest {
        owner_id: owner.to_string(),
        file_name: "report.txt".to_string(),
        content_type: Some("text/plain".to_string()),
        payload: payload.to_vec(),
        passphrase: "secure123".to_string(),
    }
}

async fn upload(vault: &Vault, owner: &str, payload: &[u8]) -> FileRecord {
    vault.upload(upload_request(owner, payload)).await.unwrap()
}

fn update_request(file_id: Uuid, payload: &[u8], passphrase: &str) -> UpdateRequest {
    UpdateRequest {
        file_id,
        file_name: None,
        content_type: None,
        payload: payload.to_vec(),
        passphrase: passphrase.to_string(),
    }
}

#[tokio::test]
async fn upload_then_download_round_trip() {
    let h = harness();
    let mut request = upload_request("alice", b"hello world");
    request.content_type = None;
    let file = h.vault.upload(request).await.unwrap();

    assert_eq!(file.owner_id, "alice");
    assert_eq!(file.size, 11);
    assert!(file.is_protected);
    assert_eq!(file.content_type, DEFAULT_CONTENT_TYPE);
    assert_eq!(file.encryption_iv.len(), 24);
    assert_eq!(file.status(), LifecycleStatus::Active);

    // 16-byte IV plus one padded block.
    let stored = h.blobs().get(&file.blob_location()).unwrap();
    assert_eq!(stored.len(), 32);

    let downloaded = h.vault.download(file.id, "secure123", &alice()).await.unwrap();
    assert_eq!(downloaded.content, b"hello world");
    assert_eq!(downloaded.file_name, "report.txt");
    assert_eq!(downloaded.content_type, DEFAULT_CONTENT_TYPE);

    let history = h.vault.download_history(file.id, &alice()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_id, "alice");

    let versions = h.vault.list_versions(file.id, &alice()).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].number, 1);
}

#[tokio::test]
async fn long_file_names_upload_and_keep_their_display_name() {
    let h = harness();
    let long_name = format!("{}.txt", "a".repeat(300));
    let mut request = upload_request("alice", b"long");
    request.file_name = long_name.clone();

    let file = h.vault.upload(request).await.unwrap();
    assert_eq!(file.display_name, long_name);
    assert!(file.blob_name().ends_with(".txt"));

    let update = UpdateRequest {
        file_name: Some(format!("{}.md", "b".repeat(300))),
        ..update_request(file.id, b"longer", "secure123")
    };
    let updated = h.vault.update(update, &alice()).await.unwrap();
    assert_eq!(updated.version.number, 2);

    let downloaded = h.vault.download(file.id, "secure123", &alice()).await.unwrap();
    assert_eq!(downloaded.content, b"longer");
}

#[tokio::test]
async fn upload_validation_rejects_without_side_effects() {
    let h = harness();

    let cases: Vec<(&str, UploadRequest)> = vec![
        ("payload", upload_request("alice", b"")),
        ("passphrase", UploadRequest {
            passphrase: "   ".to_string(),
            ..upload_request("alice", b"x")
        }),
        ("file_name", UploadRequest {
            file_name: String::new(),
            ..upload_request("alice", b"x")
        }),
        ("owner_id", upload_request(" ", b"x")),
    ];

    for (expected, request) in cases {
        match h.vault.upload(request).await {
            Err(VaultError::Validation { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected validation error on {expected}, got {other:?}"),
        }
    }

    assert!(h.vault.list_files(&alice()).await.unwrap().is_empty());
    assert!(h.blobs().list(BlobArea::Active).unwrap().is_empty());
}

#[tokio::test]
async fn wrong_passphrase_is_rejected_and_not_logged() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"top secret").await;

    let mut rejected = 0;
    let mut accepted = 0;
    for i in 0..5 {
        match h.vault.download(file.id, &format!("wrong-{i}"), &alice()).await {
            Err(VaultError::WrongPassphraseOrCorruptBlob) => rejected += 1,
            Ok(garbage) => {
                assert_ne!(garbage.content, b"top secret");
                accepted += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(rejected >= 1);

    let history = h.vault.download_history(file.id, &alice()).await.unwrap();
    assert_eq!(history.len(), accepted);
}

#[tokio::test]
async fn missing_blob_fails_download_without_log() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"data").await;
    h.blobs().delete(&file.blob_location()).unwrap();

    let result = h.vault.download(file.id, "secure123", &alice()).await;
    assert!(matches!(result, Err(VaultError::BlobMissing { file_id, .. }) if file_id == file.id));
    assert!(h
        .vault
        .download_history(file.id, &alice())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn only_owner_or_admin_may_access() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"mine").await;

    assert!(matches!(
        h.vault.download(file.id, "secure123", &bob()).await,
        Err(VaultError::PermissionDenied(_))
    ));
    assert!(matches!(
        h.vault.soft_delete(file.id, &bob()).await,
        Err(VaultError::PermissionDenied(_))
    ));

    let as_admin = h.vault.download(file.id, "secure123", &admin()).await.unwrap();
    assert_eq!(as_admin.content, b"mine");

    let history = h.vault.download_history(file.id, &alice()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_id, "root");

    assert!(matches!(
        h.vault.get_file(Uuid::new_v4(), &alice()).await,
        Err(VaultError::FileNotFound(_))
    ));
}

#[tokio::test]
async fn updates_append_versions() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"v1").await;

    let second = h
        .vault
        .update(update_request(file.id, b"version two", "secure123"), &alice())
        .await
        .unwrap();
    assert_eq!(second.version.number, 2);
    assert_eq!(second.file.size, 11);
    assert_ne!(second.file.blob_name(), file.blob_name());

    let mut rename = update_request(file.id, b"v3", "secure123");
    rename.file_name = Some("renamed.md".to_string());
    rename.content_type = Some("text/markdown".to_string());
    let third = h.vault.update(rename, &alice()).await.unwrap();
    assert_eq!(third.version.number, 3);
    assert_eq!(third.file.display_name, "renamed.md");

    let latest = h.vault.latest_version(file.id, &alice()).await.unwrap();
    assert_eq!(latest.number, 3);

    let current = h.vault.download(file.id, "secure123", &alice()).await.unwrap();
    assert_eq!(current.content, b"v3");
    assert_eq!(current.content_type, "text/markdown");

    let first = h
        .vault
        .read_version(file.id, 1, "secure123", &alice())
        .await
        .unwrap();
    assert_eq!(first.content, b"v1");
    assert_eq!(first.version, Some(1));

    assert!(matches!(
        h.vault.read_version(file.id, 9, "secure123", &alice()).await,
        Err(VaultError::VersionNotFound { number: 9, .. })
    ));
}

#[tokio::test]
async fn update_requires_current_passphrase() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"original").await;

    let mut accepted = 0;
    let mut rejected = 0;
    for i in 0..5 {
        let request = update_request(file.id, b"hijacked", &format!("guess-{i}"));
        match h.vault.update(request, &alice()).await {
            Err(VaultError::WrongPassphraseOrCorruptBlob) => rejected += 1,
            Ok(_) => accepted += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(rejected >= 1);

    let versions = h.vault.list_versions(file.id, &alice()).await.unwrap();
    assert_eq!(versions.len(), 1 + accepted);
    assert_eq!(h.blobs().list(BlobArea::Active).unwrap().len(), 1 + accepted);
}

#[tokio::test]
async fn change_passphrase_creates_version_under_new_key() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"rotate me").await;

    let changed = h
        .vault
        .change_passphrase(file.id, "secure123", "n3w-phrase", &alice())
        .await
        .unwrap();
    assert_eq!(changed.version.number, 2);
    assert_eq!(changed.file.display_name, file.display_name);

    let current = h.vault.download(file.id, "n3w-phrase", &alice()).await.unwrap();
    assert_eq!(current.content, b"rotate me");

    // The old version still opens with the old passphrase.
    let old = h
        .vault
        .read_version(file.id, 1, "secure123", &alice())
        .await
        .unwrap();
    assert_eq!(old.content, b"rotate me");

    assert!(h
        .vault
        .verify_passphrase(file.id, "n3w-phrase", &alice())
        .await
        .unwrap());
}

#[tokio::test]
async fn verify_passphrase_does_not_log() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"check").await;

    assert!(h
        .vault
        .verify_passphrase(file.id, "secure123", &alice())
        .await
        .unwrap());

    let mut outcomes = Vec::new();
    for i in 0..5 {
        outcomes.push(
            h.vault
                .verify_passphrase(file.id, &format!("nope-{i}"), &alice())
                .await
                .unwrap(),
        );
    }
    assert!(outcomes.contains(&false));
    assert!(h
        .vault
        .download_history(file.id, &alice())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn trash_and_restore_preserve_content_and_versions() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"keep me").await;
    h.vault
        .update(update_request(file.id, b"keep me too", "secure123"), &alice())
        .await
        .unwrap();
    let versions_before = h.vault.list_versions(file.id, &alice()).await.unwrap();

    let outcome = h.vault.soft_delete(file.id, &alice()).await.unwrap();
    assert!(outcome.blob_relocated);
    assert!(outcome.file.is_deleted());

    assert!(matches!(
        h.vault.download(file.id, "secure123", &alice()).await,
        Err(VaultError::InvalidState {
            actual: LifecycleStatus::Trashed,
            ..
        })
    ));
    assert!(h.vault.list_files(&alice()).await.unwrap().is_empty());
    let trash = h.vault.list_trash(&alice()).await.unwrap();
    assert_eq!(trash.len(), 1);
    assert!(h.vault.list_trash(&bob()).await.unwrap().is_empty());
    assert_eq!(h.vault.list_trash(&admin()).await.unwrap().len(), 1);

    // Soft delete twice is rejected, not repeated.
    assert!(matches!(
        h.vault.soft_delete(file.id, &alice()).await,
        Err(VaultError::InvalidState { .. })
    ));

    let restored = h.vault.restore(file.id, &alice()).await.unwrap();
    assert_eq!(restored.status(), LifecycleStatus::Active);
    assert_eq!(restored.deleted_at(), None);
    assert_eq!(restored.owner_id, "alice");

    let content = h.vault.download(file.id, "secure123", &alice()).await.unwrap();
    assert_eq!(content.content, b"keep me too");
    assert_eq!(
        h.vault.list_versions(file.id, &alice()).await.unwrap(),
        versions_before
    );
}

#[tokio::test]
async fn purge_cascades_everything() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"short lived").await;
    h.vault
        .update(update_request(file.id, b"v2", "secure123"), &alice())
        .await
        .unwrap();
    for _ in 0..3 {
        h.vault.download(file.id, "secure123", &alice()).await.unwrap();
    }

    assert!(matches!(
        h.vault.purge(file.id, &alice()).await,
        Err(VaultError::InvalidState {
            expected: LifecycleStatus::Trashed,
            ..
        })
    ));

    h.vault.soft_delete(file.id, &alice()).await.unwrap();
    let outcome = h.vault.purge(file.id, &alice()).await.unwrap();
    assert_eq!(outcome.status, LifecycleStatus::Purged);
    assert_eq!(outcome.versions_removed, 2);
    assert_eq!(outcome.download_logs_removed, 3);
    assert_eq!(outcome.blobs_deleted, 2);

    assert!(matches!(
        h.vault.get_file(file.id, &alice()).await,
        Err(VaultError::FileNotFound(_))
    ));
    assert!(h.vault.core.metadata.download_logs(file.id).unwrap().is_empty());
    assert!(h.blobs().list(BlobArea::Active).unwrap().is_empty());
    assert!(h.blobs().list(BlobArea::Trash).unwrap().is_empty());
}

#[tokio::test]
async fn purge_succeeds_when_trash_blob_already_gone() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"gone").await;
    h.vault.download(file.id, "secure123", &alice()).await.unwrap();
    let trashed = h.vault.soft_delete(file.id, &alice()).await.unwrap().file;
    h.blobs().delete(&trashed.blob_location()).unwrap();

    let outcome = h.vault.purge(file.id, &alice()).await.unwrap();
    assert!(outcome.trash_blob_missing);
    assert_eq!(outcome.download_logs_removed, 1);
    assert!(matches!(
        h.vault.get_file(file.id, &alice()).await,
        Err(VaultError::FileNotFound(_))
    ));
}

#[tokio::test]
async fn missing_latest_blob_surfaces_instead_of_falling_back() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"one").await;
    for payload in [b"two".as_slice(), b"three".as_slice()] {
        h.vault
            .update(update_request(file.id, payload, "secure123"), &alice())
            .await
            .unwrap();
    }

    let versions = h.vault.list_versions(file.id, &alice()).await.unwrap();
    let v3 = &versions[2];
    h.blobs()
        .delete(&BlobLocation::new(BlobArea::Active, v3.blob.as_str()))
        .unwrap();

    let latest = h.vault.latest_version(file.id, &alice()).await.unwrap();
    assert_eq!(latest.number, 3);
    assert_eq!(h.vault.list_versions(file.id, &alice()).await.unwrap().len(), 3);

    assert!(matches!(
        h.vault.download(file.id, "secure123", &alice()).await,
        Err(VaultError::BlobMissing { .. })
    ));

    let v2 = h
        .vault
        .read_version(file.id, 2, "secure123", &alice())
        .await
        .unwrap();
    assert_eq!(v2.content, b"two");
}

#[tokio::test]
async fn partial_soft_delete_is_reported_and_blocks_restore() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"lost").await;
    h.blobs().delete(&file.blob_location()).unwrap();

    let outcome = h.vault.soft_delete(file.id, &alice()).await.unwrap();
    assert!(!outcome.blob_relocated);
    assert!(outcome.warning.is_some());

    assert!(matches!(
        h.vault.restore(file.id, &alice()).await,
        Err(VaultError::RestoreSourceMissing(id)) if id == file.id
    ));
    let still = h.vault.get_file(file.id, &alice()).await.unwrap();
    assert!(still.is_deleted());
}

#[tokio::test]
async fn bulk_operations_continue_past_failures() {
    let h = harness();
    let good = upload(&h.vault, "alice", b"good").await;
    let broken = upload(&h.vault, "alice", b"broken").await;
    let bobs = upload(&h.vault, "bob", b"bob's").await;
    for (id, who) in [(good.id, alice()), (broken.id, alice()), (bobs.id, bob())] {
        h.vault.soft_delete(id, &who).await.unwrap();
    }
    let trashed_broken = h.vault.get_file(broken.id, &alice()).await.unwrap();
    h.blobs().delete(&trashed_broken.blob_location()).unwrap();

    let report = h.vault.restore_all(&alice()).await.unwrap();
    assert_eq!(report.succeeded, vec![good.id]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].file_id, broken.id);
    assert!(h.vault.get_file(bobs.id, &bob()).await.unwrap().is_deleted());

    let report = h.vault.purge_all(&admin()).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.succeeded.len(), 2);
    assert!(h.vault.list_trash(&admin()).await.unwrap().is_empty());
    assert_eq!(h.vault.list_files(&alice()).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_get_distinct_versions() {
    let h = harness();
    let file_id = upload(&h.vault, "alice", b"base").await.id;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let vault = h.vault.clone();
        tasks.push(tokio::spawn(async move {
            let payload = format!("writer {i}");
            vault
                .update(update_request(file_id, payload.as_bytes(), "secure123"), &alice())
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let numbers: Vec<u32> = h
        .vault
        .list_versions(file_id, &alice())
        .await
        .unwrap()
        .iter()
        .map(|v| v.number)
        .collect();
    assert_eq!(numbers, (1..=9).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn uploads_to_different_files_run_in_parallel() {
    let h = harness();
    let mut tasks = Vec::new();
    for i in 0..6 {
        let vault = h.vault.clone();
        tasks.push(tokio::spawn(async move {
            vault
                .upload(upload_request("alice", format!("file {i}").as_bytes()))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(h.vault.list_files(&alice()).await.unwrap().len(), 6);
    assert_eq!(h.blobs().list(BlobArea::Active).unwrap().len(), 6);
}

#[tokio::test]
async fn cancelled_upload_leaves_nothing_visible() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h
        .vault
        .upload_cancellable(upload_request("alice", b"abandoned"), cancel)
        .await;
    assert!(matches!(result, Err(VaultError::Cancelled)));
    assert!(h.vault.list_files(&alice()).await.unwrap().is_empty());
    assert!(h.blobs().list(BlobArea::Active).unwrap().is_empty());
    assert_eq!(
        std::fs::read_dir(h.blobs().paths().staging_dir())
            .unwrap()
            .count(),
        0
    );
}

#[tokio::test]
async fn cancelled_update_keeps_previous_version() {
    let h = harness();
    let file = upload(&h.vault, "alice", b"stable").await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h
        .vault
        .update_cancellable(update_request(file.id, b"never", "secure123"), &alice(), cancel)
        .await;
    assert!(matches!(result, Err(VaultError::Cancelled)));
    assert_eq!(h.vault.list_versions(file.id, &alice()).await.unwrap().len(), 1);
    assert_eq!(h.blobs().list(BlobArea::Active).unwrap().len(), 1);
}

/// Delegates to the in-memory store but stalls on File lookups, on the
/// writes that commit new content and download records, or both.
#[derive(Default)]
struct StallingMetadata {
    inner: InMemoryMetadata,
    lookup_delay: Duration,
    commit_delay: Duration,
}

impl StallingMetadata {
    fn stalling_lookups(delay: Duration) -> Self {
        Self {
            lookup_delay: delay,
            ..Self::default()
        }
    }

    fn stalling_commits(delay: Duration) -> Self {
        Self {
            commit_delay: delay,
            ..Self::default()
        }
    }
}

impl MetadataRepository for StallingMetadata {
    fn create_file(&self, file: &FileRecord, first: &VersionRecord) -> MetadataResult<()> {
        std::thread::sleep(self.commit_delay);
        self.inner.create_file(file, first)
    }

    fn get_file(&self, file_id: Uuid) -> MetadataResult<Option<FileRecord>> {
        std::thread::sleep(self.lookup_delay);
        self.inner.get_file(file_id)
    }

    fn update_file(&self, file: &FileRecord) -> MetadataResult<()> {
        self.inner.update_file(file)
    }

    fn max_version_number(&self, file_id: Uuid) -> MetadataResult<u32> {
        self.inner.max_version_number(file_id)
    }

    fn append_version(&self, file: &FileRecord, version: &VersionRecord) -> MetadataResult<()> {
        std::thread::sleep(self.commit_delay);
        self.inner.append_version(file, version)
    }

    fn list_versions(&self, file_id: Uuid) -> MetadataResult<Vec<VersionRecord>> {
        self.inner.list_versions(file_id)
    }

    fn list_trashed(&self) -> MetadataResult<Vec<FileRecord>> {
        self.inner.list_trashed()
    }

    fn list_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<FileRecord>> {
        self.inner.list_by_owner(owner_id)
    }

    fn record_download(&self, log: &DownloadLog) -> MetadataResult<()> {
        std::thread::sleep(self.commit_delay);
        self.inner.record_download(log)
    }

    fn download_logs(&self, file_id: Uuid) -> MetadataResult<Vec<DownloadLog>> {
        self.inner.download_logs(file_id)
    }

    fn purge_file(&self, file_id: Uuid) -> MetadataResult<PurgedRecords> {
        self.inner.purge_file(file_id)
    }
}

struct StalledVault {
    _dir: TempDir,
    metadata: Arc<StallingMetadata>,
    /// No deadline.
    patient: Vault,
    /// Same stores and locks, short deadline.
    hasty: Vault,
}

impl StalledVault {
    fn new(metadata: StallingMetadata, deadline: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let mut blobs = BlobStore::new(StoragePaths::new(dir.path()));
        blobs.initialize().unwrap();
        let metadata = Arc::new(metadata);
        let patient = Vault::new(blobs, metadata.clone()).with_io_timeout(None);
        let hasty = patient.clone().with_io_timeout(Some(deadline));
        Self {
            _dir: dir,
            metadata,
            patient,
            hasty,
        }
    }

    fn blobs(&self) -> &BlobStore {
        &self.patient.core.blobs
    }

    /// Give detached blocking work time to run to completion.
    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(800)).await;
    }
}

#[tokio::test]
async fn stalled_metadata_times_out_and_is_retryable() {
    let v = StalledVault::new(
        StallingMetadata::stalling_lookups(Duration::from_millis(500)),
        Duration::from_millis(50),
    );
    let file = v.patient.upload(upload_request("alice", b"slow")).await.unwrap();

    match v.hasty.get_file(file.id, &alice()).await {
        Err(e @ VaultError::Timeout(_)) => assert!(e.is_retryable()),
        other => panic!("expected timeout, got {other:?}"),
    }

    // Without a deadline the same call completes.
    let fetched = v.patient.get_file(file.id, &alice()).await.unwrap();
    assert_eq!(fetched.id, file.id);
}

#[tokio::test]
async fn timed_out_download_records_nothing() {
    let v = StalledVault::new(
        StallingMetadata::stalling_lookups(Duration::from_millis(300)),
        Duration::from_millis(50),
    );
    let file = v.patient.upload(upload_request("alice", b"audited")).await.unwrap();

    let result = v.hasty.download(file.id, "secure123", &alice()).await;
    assert!(matches!(result, Err(VaultError::Timeout(_))));

    v.settle().await;
    assert!(v.metadata.inner.download_logs(file.id).unwrap().is_empty());
}

#[tokio::test]
async fn timed_out_update_appends_no_version() {
    let v = StalledVault::new(
        StallingMetadata::stalling_lookups(Duration::from_millis(300)),
        Duration::from_millis(50),
    );
    let file = v.patient.upload(upload_request("alice", b"v1")).await.unwrap();

    let result = v
        .hasty
        .update(update_request(file.id, b"v2", "secure123"), &alice())
        .await;
    assert!(matches!(result, Err(VaultError::Timeout(_))));

    v.settle().await;
    assert_eq!(v.metadata.inner.list_versions(file.id).unwrap().len(), 1);
    assert_eq!(v.blobs().list(BlobArea::Active).unwrap().len(), 1);
    let current = v.patient.download(file.id, "secure123", &alice()).await.unwrap();
    assert_eq!(current.content, b"v1");
}

#[tokio::test]
async fn commit_in_flight_at_deadline_is_reported_not_duplicated() {
    let v = StalledVault::new(
        StallingMetadata::stalling_commits(Duration::from_millis(600)),
        Duration::from_millis(200),
    );

    // The deadline passes while the File is being committed: the caller
    // waits for the commit instead of reporting a timeout it cannot honour.
    let file = v.hasty.upload(upload_request("alice", b"durable")).await.unwrap();

    v.settle().await;
    let listed = v.metadata.inner.list_by_owner("alice").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, file.id);
    assert_eq!(v.blobs().list(BlobArea::Active).unwrap().len(), 1);

    let downloaded = v.hasty.download(file.id, "secure123", &alice()).await.unwrap();
    assert_eq!(downloaded.content, b"durable");
    assert_eq!(v.metadata.inner.download_logs(file.id).unwrap().len(), 1);
}

#[tokio::test]
async fn lock_wait_is_bounded_by_the_deadline() {
    let v = StalledVault::new(
        StallingMetadata::stalling_lookups(Duration::from_millis(1500)),
        Duration::from_millis(50),
    );
    let file = v.patient.upload(upload_request("alice", b"locked")).await.unwrap();

    // Times out but leaves its blocking work holding the File's lock.
    let first = v.hasty.download(file.id, "secure123", &alice()).await;
    assert!(matches!(first, Err(VaultError::Timeout(_))));

    let started = std::time::Instant::now();
    let second = v.hasty.download(file.id, "secure123", &alice()).await;
    assert!(matches!(second, Err(VaultError::Timeout(_))));
    assert!(
        started.elapsed() < Duration::from_millis(1000),
        "waited {:?} for the lock",
        started.elapsed()
    );
}

#[tokio::test]
async fn in_memory_backend_supports_full_lifecycle() {
    let dir = TempDir::new().unwrap();
    let mut blobs = BlobStore::new(StoragePaths::new(dir.path()));
    blobs.initialize().unwrap();
    let vault = Vault::new(blobs, Arc::new(InMemoryMetadata::new()));

    let file = vault.upload(upload_request("alice", b"ephemeral")).await.unwrap();
    vault.soft_delete(file.id, &alice()).await.unwrap();
    vault.restore(file.id, &alice()).await.unwrap();
    let content = vault.download(file.id, "secure123", &alice()).await.unwrap();
    assert_eq!(content.content, b"ephemeral");

    vault.health_check().await.unwrap();
}
