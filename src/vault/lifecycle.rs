// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lifecycle state machine: Active → Trashed → Active | Purged.
//!
//! ## Ordering rules
//!
//! - Soft delete writes metadata first. Moving the blob to the trash is
//!   best-effort and a failure is reported, not rolled back.
//! - Restore moves the blob first and only then clears the deletion. If the
//!   metadata write fails, the blob is moved back.
//! - Purge deletes blobs first (tolerating ones already gone), then removes
//!   logs, versions and the File in one metadata transaction.
//!
//! There is no Active → Purged edge.
//!
//! Callers hold the File's lock for the whole transition.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::{VaultError, VaultResult};
use crate::storage::{
    BlobArea, BlobLocation, BlobStore, FileRecord, FileState, LifecycleStatus,
    MetadataRepository, StorageError,
};

/// Result of a soft delete. `blob_relocated == false` is a partial success:
/// the File is trashed but its blob did not move.
#[derive(Debug, Clone)]
pub struct SoftDeleteOutcome {
    pub file: FileRecord,
    pub blob_relocated: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PurgeOutcome {
    pub file_id: Uuid,
    pub status: LifecycleStatus,
    pub versions_removed: usize,
    pub download_logs_removed: usize,
    pub blobs_deleted: usize,
    /// The trashed blob was already gone.
    pub trash_blob_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BatchFailure {
    pub file_id: Uuid,
    pub error: String,
}

/// Aggregate of a bulk restore or purge. One failing File never stops the
/// rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BatchReport {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn record<T>(&mut self, file_id: Uuid, result: VaultResult<T>) {
        match result {
            Ok(_) => self.succeeded.push(file_id),
            Err(e) => self.failed.push(BatchFailure {
                file_id,
                error: e.to_string(),
            }),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct Lifecycle {
    blobs: BlobStore,
    metadata: Arc<dyn MetadataRepository>,
}

impl Lifecycle {
    pub fn new(blobs: BlobStore, metadata: Arc<dyn MetadataRepository>) -> Self {
        Self { blobs, metadata }
    }

    /// Active → Trashed.
    pub fn soft_delete(&self, file: FileRecord) -> VaultResult<SoftDeleteOutcome> {
        require_status(&file, LifecycleStatus::Active)?;

        let source = file.blob_location();
        let trashed = FileRecord {
            state: FileState::Trashed {
                blob: file.blob_name().to_string(),
                deleted_at: Utc::now(),
            },
            ..file
        };
        self.metadata.update_file(&trashed)?;

        let (blob_relocated, warning) = match self.blobs.move_to(&source, BlobArea::Trash) {
            Ok(_) => (true, None),
            Err(e) => {
                tracing::warn!(
                    file_id = %trashed.id,
                    blob = %source,
                    error = %e,
                    "File trashed but its blob could not be moved"
                );
                (false, Some(format!("content was not moved to trash: {e}")))
            }
        };

        tracing::info!(file_id = %trashed.id, blob_relocated, "File moved to trash");
        Ok(SoftDeleteOutcome {
            file: trashed,
            blob_relocated,
            warning,
        })
    }

    /// Trashed → Active.
    pub fn restore(&self, file: FileRecord) -> VaultResult<FileRecord> {
        require_status(&file, LifecycleStatus::Trashed)?;

        let source = file.blob_location();
        if !self.blobs.exists(&source) {
            return Err(VaultError::RestoreSourceMissing(file.id));
        }

        let restored_at = match self.blobs.move_to(&source, BlobArea::Active) {
            Ok(location) => location,
            Err(StorageError::NotFound(_)) => return Err(VaultError::RestoreSourceMissing(file.id)),
            Err(e) => return Err(e.into()),
        };

        let restored = FileRecord {
            state: FileState::Active {
                blob: file.blob_name().to_string(),
            },
            ..file
        };
        if let Err(e) = self.metadata.update_file(&restored) {
            // Put the blob back where the still-trashed record says it is.
            if let Err(undo) = self.blobs.move_to(&restored_at, BlobArea::Trash) {
                tracing::error!(
                    file_id = %restored.id,
                    error = %undo,
                    "Failed to return blob to trash after aborted restore"
                );
            }
            return Err(e.into());
        }

        tracing::info!(file_id = %restored.id, "File restored from trash");
        Ok(restored)
    }

    /// Trashed → Purged.
    pub fn purge(&self, file: FileRecord) -> VaultResult<PurgeOutcome> {
        require_status(&file, LifecycleStatus::Trashed)?;

        let mut names: Vec<String> = self
            .metadata
            .list_versions(file.id)?
            .into_iter()
            .map(|v| v.blob)
            .collect();
        if !names.iter().any(|n| n == file.blob_name()) {
            names.push(file.blob_name().to_string());
        }

        let current = file.blob_location();
        let mut blobs_deleted = 0;
        let mut trash_blob_missing = true;
        for name in &names {
            for area in [BlobArea::Trash, BlobArea::Active] {
                let location = BlobLocation::new(area, name.as_str());
                match self.blobs.delete(&location) {
                    Ok(()) => {
                        blobs_deleted += 1;
                        if location == current {
                            trash_blob_missing = false;
                        }
                    }
                    Err(StorageError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let purged = self.metadata.purge_file(file.id)?;

        tracing::info!(
            file_id = %file.id,
            versions = purged.versions,
            download_logs = purged.download_logs,
            blobs_deleted,
            trash_blob_missing,
            "File purged"
        );
        Ok(PurgeOutcome {
            file_id: file.id,
            status: LifecycleStatus::Purged,
            versions_removed: purged.versions,
            download_logs_removed: purged.download_logs,
            blobs_deleted,
            trash_blob_missing,
        })
    }
}

pub(crate) fn require_status(file: &FileRecord, expected: LifecycleStatus) -> VaultResult<()> {
    let actual = file.status();
    if actual == expected {
        Ok(())
    } else {
        Err(VaultError::InvalidState {
            file_id: file.id,
            expected,
            actual,
        })
    }
}
