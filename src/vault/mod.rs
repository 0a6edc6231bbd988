// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Versioned File Store
//!
//! [`Vault`] is the entry point for every operation on Files. It ties the
//! codec, blob store, version chain and lifecycle together and owns the
//! scheduling concerns:
//!
//! - all blocking work (key stretching, AES, disk, redb) runs on the
//!   blocking pool,
//! - operations on the same File are serialized by a per-file lock,
//! - an optional deadline bounds every operation, including the wait for
//!   the File's lock,
//! - writes abandoned by their caller never become visible, and a reported
//!   timeout means nothing was committed.

pub mod error;
mod gate;
pub mod lifecycle;
pub mod locks;
pub mod versions;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use error::{VaultError, VaultResult};
pub use lifecycle::{BatchFailure, BatchReport, Lifecycle, PurgeOutcome, SoftDeleteOutcome};
pub use locks::{FileGuard, FileLocks};
pub use versions::VersionChain;

use gate::CommitGate;

use crate::auth::Requester;
use crate::crypto::{self, EncryptedBlob};
use crate::storage::{
    BlobLocation, BlobStore, DownloadLog, FileRecord, FileState, LifecycleStatus, MetadataDb,
    MetadataRepository, OwnershipEnforcer, StorageError, StoragePaths, VersionRecord,
};

/// Default per-operation deadline.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Content type recorded when the uploader does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A new File.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_id: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub payload: Vec<u8>,
    pub passphrase: String,
}

/// New content for an existing File, encrypted under its current passphrase.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub file_id: Uuid,
    /// Keep the current name when `None`.
    pub file_name: Option<String>,
    /// Keep the current type when `None`.
    pub content_type: Option<String>,
    pub payload: Vec<u8>,
    pub passphrase: String,
}

/// Decrypted content ready to serve.
#[derive(Clone)]
pub struct DownloadedFile {
    pub file_id: Uuid,
    pub version: Option<u32>,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for DownloadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedFile")
            .field("file_id", &self.file_id)
            .field("version", &self.version)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}

/// A File after a new version was appended.
#[derive(Debug, Clone)]
pub struct UpdatedFile {
    pub file: FileRecord,
    pub version: VersionRecord,
}

/// State shared by every operation and cloned onto blocking threads.
#[derive(Clone)]
struct Core {
    blobs: BlobStore,
    metadata: Arc<dyn MetadataRepository>,
    chain: VersionChain,
    lifecycle: Lifecycle,
    /// Fresh for every operation, see [`Vault::run_blocking`].
    gate: CommitGate,
}

impl Core {
    /// Load a File the requester may act on.
    fn load(&self, file_id: Uuid, requester: &Requester) -> VaultResult<FileRecord> {
        let file = self
            .metadata
            .get_file(file_id)?
            .ok_or(VaultError::FileNotFound(file_id))?;
        file.verify_access(requester)?;
        Ok(file)
    }

    fn load_active(&self, file_id: Uuid, requester: &Requester) -> VaultResult<FileRecord> {
        let file = self.load(file_id, requester)?;
        lifecycle::require_status(&file, LifecycleStatus::Active)?;
        Ok(file)
    }

    fn read_blob(&self, file_id: Uuid, location: &BlobLocation) -> VaultResult<Vec<u8>> {
        match self.blobs.get(location) {
            Ok(bytes) => Ok(bytes),
            Err(StorageError::NotFound(_)) => Err(VaultError::BlobMissing {
                file_id,
                location: location.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn decrypt_and_log(
        &self,
        file: &FileRecord,
        location: &BlobLocation,
        passphrase: &str,
        requester: &Requester,
    ) -> VaultResult<Vec<u8>> {
        let blob = self.read_blob(file.id, location)?;
        let content = crypto::decrypt(&blob, passphrase)?;
        self.gate.commit(|| {
            self.metadata
                .record_download(&DownloadLog::new(requester.user_id.as_str(), file.id))?;
            Ok(())
        })?;
        Ok(content)
    }

    /// Publish a blob for `file`, then run `commit` through the gate. The
    /// publish is undone unless the commit succeeded.
    fn publish<T>(
        &self,
        name: &str,
        encrypted: &EncryptedBlob,
        cancel: &CancellationToken,
        commit: impl FnOnce() -> VaultResult<T>,
    ) -> VaultResult<T> {
        if cancel.is_cancelled() {
            return Err(VaultError::Cancelled);
        }
        let location = self.blobs.put_cancellable(name, encrypted.as_bytes(), cancel)?;

        let result = self.gate.commit(|| {
            if cancel.is_cancelled() {
                Err(VaultError::Cancelled)
            } else {
                commit()
            }
        });

        if result.is_err() {
            if let Err(e) = self.blobs.delete(&location) {
                tracing::error!(blob = %location, error = %e, "Failed to remove unreferenced blob");
            }
        }
        result
    }

    /// Encrypt `content` and make it the File's next version.
    fn append_content(
        &self,
        file: FileRecord,
        file_name: String,
        content_type: String,
        content: &[u8],
        passphrase: &str,
        cancel: &CancellationToken,
    ) -> VaultResult<UpdatedFile> {
        let encrypted = crypto::encrypt(content, passphrase)?;
        let blob = BlobStore::generate_name(&file_name);
        let updated = FileRecord {
            display_name: file_name,
            content_type,
            size: content.len() as u64,
            uploaded_at: Utc::now(),
            encryption_iv: crypto::encode_iv(&encrypted.iv()),
            state: FileState::Active { blob: blob.clone() },
            ..file
        };

        let version = self.publish(&blob, &encrypted, cancel, || {
            self.chain.append(&updated, &blob)
        })?;
        Ok(UpdatedFile {
            file: updated,
            version,
        })
    }
}

/// The encrypted versioned file store.
#[derive(Clone)]
pub struct Vault {
    core: Core,
    locks: Arc<FileLocks>,
    io_timeout: Option<Duration>,
}

impl Vault {
    /// Open the vault rooted at `paths`: blob areas plus the redb metadata
    /// database.
    pub fn open(paths: StoragePaths) -> VaultResult<Self> {
        let mut blobs = BlobStore::new(paths);
        blobs.initialize()?;
        let metadata = MetadataDb::open(&blobs.paths().metadata_db())?;
        Ok(Self::new(blobs, Arc::new(metadata)))
    }

    /// Build a vault over an initialized blob store and any metadata backend.
    pub fn new(blobs: BlobStore, metadata: Arc<dyn MetadataRepository>) -> Self {
        Self {
            core: Core {
                chain: VersionChain::new(Arc::clone(&metadata)),
                lifecycle: Lifecycle::new(blobs.clone(), Arc::clone(&metadata)),
                blobs,
                metadata,
                gate: CommitGate::new(),
            },
            locks: Arc::new(FileLocks::new()),
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }

    /// Override the per-operation deadline. `None` waits indefinitely.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    /// Run `work` on the blocking pool under the vault deadline.
    ///
    /// With `lock` set, the File's lock is taken first, under the same
    /// deadline, and travels with the work so the File stays locked until
    /// the blocking thread is done even if this future gave up waiting.
    /// When the deadline fires before the work reached its commit point the
    /// work is abandoned; when a commit is already running its result is
    /// awaited and returned instead of a timeout.
    async fn run_blocking<T, F>(
        &self,
        operation: &'static str,
        lock: Option<Uuid>,
        work: F,
    ) -> VaultResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Core) -> VaultResult<T> + Send + 'static,
    {
        let deadline = self.io_timeout.map(|limit| (limit, Instant::now() + limit));

        let guard = match (lock, deadline) {
            (Some(file_id), Some((limit, at))) => {
                match tokio::time::timeout_at(at, self.locks.acquire(file_id)).await {
                    Ok(guard) => Some(guard),
                    Err(_) => {
                        tracing::warn!(
                            operation,
                            file_id = %file_id,
                            timeout = ?limit,
                            "Timed out waiting for file lock"
                        );
                        return Err(VaultError::Timeout(limit));
                    }
                }
            }
            (Some(file_id), None) => Some(self.locks.acquire(file_id).await),
            (None, _) => None,
        };

        let mut core = self.core.clone();
        core.gate = CommitGate::new();
        let gate = core.gate.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            work(core)
        });

        let joined = match deadline {
            Some((limit, at)) => match tokio::time::timeout_at(at, &mut task).await {
                Ok(joined) => joined,
                Err(_) if gate.abandon() => {
                    tracing::warn!(operation, timeout = ?limit, "Vault operation timed out");
                    return Err(VaultError::Timeout(limit));
                }
                Err(_) => {
                    tracing::warn!(
                        operation,
                        timeout = ?limit,
                        "Deadline passed during commit, waiting for it to finish"
                    );
                    task.await
                }
            },
            None => task.await,
        };

        joined.map_err(|e| VaultError::Internal(format!("{operation} task failed: {e}")))?
    }

    // ========== Content ==========

    /// Encrypt and store a new File. Returns its record.
    pub async fn upload(&self, request: UploadRequest) -> VaultResult<FileRecord> {
        let cancel = CancellationToken::new();
        // Fires if this future is dropped or times out before publishing.
        let _abort = cancel.clone().drop_guard();
        self.upload_cancellable(request, cancel).await
    }

    /// [`Vault::upload`] with a caller-controlled cancellation token.
    pub async fn upload_cancellable(
        &self,
        request: UploadRequest,
        cancel: CancellationToken,
    ) -> VaultResult<FileRecord> {
        let owner_id = require_text("owner_id", &request.owner_id)?;
        let file_name = require_text("file_name", &request.file_name)?;
        require_passphrase(&request.passphrase)?;
        if request.payload.is_empty() {
            return Err(VaultError::validation("payload", "must not be empty"));
        }
        let content_type = content_type_or_default(request.content_type.as_deref());

        let file = self
            .run_blocking("upload", None, move |core| {
                let encrypted = crypto::encrypt(&request.payload, &request.passphrase)?;
                let blob = BlobStore::generate_name(&file_name);
                let file = FileRecord {
                    id: Uuid::new_v4(),
                    owner_id,
                    display_name: file_name,
                    content_type,
                    size: request.payload.len() as u64,
                    is_protected: true,
                    uploaded_at: Utc::now(),
                    encryption_iv: crypto::encode_iv(&encrypted.iv()),
                    state: FileState::Active { blob: blob.clone() },
                };
                let first = VersionRecord::new(file.id, 1, blob.as_str());

                core.publish(&blob, &encrypted, &cancel, || {
                    core.metadata.create_file(&file, &first)?;
                    Ok(())
                })?;
                Ok(file)
            })
            .await?;

        tracing::info!(
            file_id = %file.id,
            owner_id = %file.owner_id,
            size = file.size,
            "File uploaded"
        );
        Ok(file)
    }

    /// Decrypt the current content. Emits exactly one download record on
    /// success and none on failure.
    pub async fn download(
        &self,
        file_id: Uuid,
        passphrase: &str,
        requester: &Requester,
    ) -> VaultResult<DownloadedFile> {
        require_passphrase(passphrase)?;
        let passphrase = passphrase.to_string();
        let requester = requester.clone();

        let downloaded = self
            .run_blocking("download", Some(file_id), move |core| {
                let file = core.load_active(file_id, &requester)?;
                let content =
                    core.decrypt_and_log(&file, &file.blob_location(), &passphrase, &requester)?;
                Ok(DownloadedFile {
                    file_id,
                    version: None,
                    file_name: file.display_name,
                    content_type: file.content_type,
                    content,
                })
            })
            .await?;

        tracing::info!(file_id = %file_id, "File downloaded");
        Ok(downloaded)
    }

    /// Decrypt a specific version. Logged like a download.
    pub async fn read_version(
        &self,
        file_id: Uuid,
        number: u32,
        passphrase: &str,
        requester: &Requester,
    ) -> VaultResult<DownloadedFile> {
        require_passphrase(passphrase)?;
        let passphrase = passphrase.to_string();
        let requester = requester.clone();

        let downloaded = self
            .run_blocking("read_version", Some(file_id), move |core| {
                let file = core.load_active(file_id, &requester)?;
                let version = core.chain.find(file_id, number)?;
                let location = version.location_in(&file);
                let content = core.decrypt_and_log(&file, &location, &passphrase, &requester)?;
                Ok(DownloadedFile {
                    file_id,
                    version: Some(number),
                    file_name: file.display_name,
                    content_type: file.content_type,
                    content,
                })
            })
            .await?;

        tracing::info!(file_id = %file_id, version = number, "File version downloaded");
        Ok(downloaded)
    }

    /// Whether `passphrase` decrypts the File's current blob.
    pub async fn verify_passphrase(
        &self,
        file_id: Uuid,
        passphrase: &str,
        requester: &Requester,
    ) -> VaultResult<bool> {
        require_passphrase(passphrase)?;
        let passphrase = passphrase.to_string();
        let requester = requester.clone();

        self.run_blocking("verify_passphrase", Some(file_id), move |core| {
            let file = core.load(file_id, &requester)?;
            let blob = core.read_blob(file_id, &file.blob_location())?;
            Ok(crypto::verify_passphrase(&blob, &passphrase))
        })
        .await
    }

    /// Store new content as the next version. The supplied passphrase must
    /// open the current version and is reused for the new one.
    pub async fn update(
        &self,
        request: UpdateRequest,
        requester: &Requester,
    ) -> VaultResult<UpdatedFile> {
        let cancel = CancellationToken::new();
        let _abort = cancel.clone().drop_guard();
        self.update_cancellable(request, requester, cancel).await
    }

    /// [`Vault::update`] with a caller-controlled cancellation token.
    pub async fn update_cancellable(
        &self,
        request: UpdateRequest,
        requester: &Requester,
        cancel: CancellationToken,
    ) -> VaultResult<UpdatedFile> {
        require_passphrase(&request.passphrase)?;
        if request.payload.is_empty() {
            return Err(VaultError::validation("payload", "must not be empty"));
        }
        let file_name = request
            .file_name
            .as_deref()
            .map(|name| require_text("file_name", name))
            .transpose()?;
        let file_id = request.file_id;
        let requester = requester.clone();

        let updated = self
            .run_blocking("update", Some(file_id), move |core| {
                let file = core.load_active(file_id, &requester)?;
                let current = core.read_blob(file_id, &file.blob_location())?;
                if !crypto::verify_passphrase(&current, &request.passphrase) {
                    return Err(VaultError::WrongPassphraseOrCorruptBlob);
                }

                let file_name = file_name.unwrap_or_else(|| file.display_name.clone());
                let content_type = match request.content_type.as_deref() {
                    Some(declared) => content_type_or_default(Some(declared)),
                    None => file.content_type.clone(),
                };
                core.append_content(
                    file,
                    file_name,
                    content_type,
                    &request.payload,
                    &request.passphrase,
                    &cancel,
                )
            })
            .await?;

        tracing::info!(
            file_id = %file_id,
            version = updated.version.number,
            "File updated"
        );
        Ok(updated)
    }

    /// Re-encrypt the current content under `new_passphrase` as a new
    /// version. Older versions keep the passphrase they were written with.
    pub async fn change_passphrase(
        &self,
        file_id: Uuid,
        current_passphrase: &str,
        new_passphrase: &str,
        requester: &Requester,
    ) -> VaultResult<UpdatedFile> {
        require_passphrase(current_passphrase)?;
        require_text("new_passphrase", new_passphrase)?;
        let current_passphrase = current_passphrase.to_string();
        let new_passphrase = new_passphrase.to_string();
        let requester = requester.clone();
        let cancel = CancellationToken::new();
        let _abort = cancel.clone().drop_guard();

        let updated = self
            .run_blocking("change_passphrase", Some(file_id), move |core| {
                let file = core.load_active(file_id, &requester)?;
                let blob = core.read_blob(file_id, &file.blob_location())?;
                let content = crypto::decrypt(&blob, &current_passphrase)?;

                let file_name = file.display_name.clone();
                let content_type = file.content_type.clone();
                core.append_content(
                    file,
                    file_name,
                    content_type,
                    &content,
                    &new_passphrase,
                    &cancel,
                )
            })
            .await?;

        tracing::info!(
            file_id = %file_id,
            version = updated.version.number,
            "Passphrase changed"
        );
        Ok(updated)
    }

    // ========== Listings ==========

    pub async fn get_file(&self, file_id: Uuid, requester: &Requester) -> VaultResult<FileRecord> {
        let requester = requester.clone();
        self.run_blocking("get_file", None, move |core| core.load(file_id, &requester))
            .await
    }

    /// The requester's active Files.
    pub async fn list_files(&self, requester: &Requester) -> VaultResult<Vec<FileRecord>> {
        let owner_id = requester.user_id.clone();
        self.run_blocking("list_files", None, move |core| {
            let mut files = core.metadata.list_by_owner(&owner_id)?;
            files.retain(|f| f.status() == LifecycleStatus::Active);
            Ok(files)
        })
        .await
    }

    pub async fn list_versions(
        &self,
        file_id: Uuid,
        requester: &Requester,
    ) -> VaultResult<Vec<VersionRecord>> {
        let requester = requester.clone();
        self.run_blocking("list_versions", None, move |core| {
            core.load(file_id, &requester)?;
            core.chain.list(file_id)
        })
        .await
    }

    /// Highest recorded version, whether or not its blob still exists.
    pub async fn latest_version(
        &self,
        file_id: Uuid,
        requester: &Requester,
    ) -> VaultResult<VersionRecord> {
        let requester = requester.clone();
        self.run_blocking("latest_version", None, move |core| {
            core.load(file_id, &requester)?;
            core.chain
                .latest(file_id)?
                .ok_or(VaultError::VersionNotFound { file_id, number: 0 })
        })
        .await
    }

    pub async fn download_history(
        &self,
        file_id: Uuid,
        requester: &Requester,
    ) -> VaultResult<Vec<DownloadLog>> {
        let requester = requester.clone();
        self.run_blocking("download_history", None, move |core| {
            core.load(file_id, &requester)?;
            Ok(core.metadata.download_logs(file_id)?)
        })
        .await
    }

    /// Trashed Files visible to the requester: their own, or all for admins.
    pub async fn list_trash(&self, requester: &Requester) -> VaultResult<Vec<FileRecord>> {
        let requester = requester.clone();
        self.run_blocking("list_trash", None, move |core| {
            let mut files = core.metadata.list_trashed()?;
            files.retain(|f| requester.can_manage(&f.owner_id));
            Ok(files)
        })
        .await
    }

    // ========== Lifecycle ==========

    /// Move a File to the trash. A blob that could not be moved is reported
    /// in the outcome, not as an error.
    pub async fn soft_delete(
        &self,
        file_id: Uuid,
        requester: &Requester,
    ) -> VaultResult<SoftDeleteOutcome> {
        let requester = requester.clone();
        self.run_blocking("soft_delete", Some(file_id), move |core| {
            let file = core.load(file_id, &requester)?;
            core.gate.commit(|| core.lifecycle.soft_delete(file))
        })
        .await
    }

    pub async fn restore(&self, file_id: Uuid, requester: &Requester) -> VaultResult<FileRecord> {
        let requester = requester.clone();
        self.run_blocking("restore", Some(file_id), move |core| {
            let file = core.load(file_id, &requester)?;
            core.gate.commit(|| core.lifecycle.restore(file))
        })
        .await
    }

    /// Permanently delete a trashed File with all its versions, download
    /// records and blobs.
    pub async fn purge(&self, file_id: Uuid, requester: &Requester) -> VaultResult<PurgeOutcome> {
        let requester = requester.clone();
        self.run_blocking("purge", Some(file_id), move |core| {
            let file = core.load(file_id, &requester)?;
            core.gate.commit(|| core.lifecycle.purge(file))
        })
        .await
    }

    /// Restore every trashed File visible to the requester.
    pub async fn restore_all(&self, requester: &Requester) -> VaultResult<BatchReport> {
        let mut report = BatchReport::default();
        for file in self.list_trash(requester).await? {
            let result = self.restore(file.id, requester).await;
            report.record(file.id, result);
        }
        tracing::info!(
            restored = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk restore finished"
        );
        Ok(report)
    }

    /// Purge every trashed File visible to the requester.
    pub async fn purge_all(&self, requester: &Requester) -> VaultResult<BatchReport> {
        let mut report = BatchReport::default();
        for file in self.list_trash(requester).await? {
            let result = self.purge(file.id, requester).await;
            report.record(file.id, result);
        }
        tracing::info!(
            purged = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk purge finished"
        );
        Ok(report)
    }

    // ========== Health ==========

    /// Write-read-delete probe on the blob root.
    pub async fn health_check(&self) -> VaultResult<()> {
        self.run_blocking("health_check", None, |core| Ok(core.blobs.health_check()?))
            .await
    }
}

fn require_text(field: &'static str, value: &str) -> VaultResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(VaultError::validation(field, "must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Blank passphrases are rejected; others are used exactly as given.
fn require_passphrase(passphrase: &str) -> VaultResult<()> {
    require_text("passphrase", passphrase).map(|_| ())
}

fn content_type_or_default(declared: Option<&str>) -> String {
    declared
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests;
