// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted records: File, Version, DownloadLog.
//!
//! A File's lifecycle is a tagged [`FileState`] rather than a deletion flag
//! plus a nullable timestamp plus a path, so "deleted without a timestamp"
//! or "active but pointing into trash" cannot be written down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::blob_store::{BlobArea, BlobLocation};

/// Reported lifecycle status of a File.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Active,
    Trashed,
    /// Terminal. Never stored: a purged File has no record.
    Purged,
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleStatus::Active => write!(f, "active"),
            LifecycleStatus::Trashed => write!(f, "trashed"),
            LifecycleStatus::Purged => write!(f, "purged"),
        }
    }
}

/// Stored lifecycle state. The blob name is the same in both areas;
/// the state decides which area it is expected in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileState {
    Active {
        blob: String,
    },
    Trashed {
        blob: String,
        deleted_at: DateTime<Utc>,
    },
}

/// A logical artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub display_name: String,
    pub content_type: String,
    /// Plaintext size in bytes of the current content.
    pub size: u64,
    pub is_protected: bool,
    pub uploaded_at: DateTime<Utc>,
    /// IV of the current blob, base64.
    pub encryption_iv: String,
    pub state: FileState,
}

impl FileRecord {
    pub fn status(&self) -> LifecycleStatus {
        match self.state {
            FileState::Active { .. } => LifecycleStatus::Active,
            FileState::Trashed { .. } => LifecycleStatus::Trashed,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.state, FileState::Trashed { .. })
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            FileState::Trashed { deleted_at, .. } => Some(*deleted_at),
            FileState::Active { .. } => None,
        }
    }

    /// Name of the blob holding the current content.
    pub fn blob_name(&self) -> &str {
        match &self.state {
            FileState::Active { blob } | FileState::Trashed { blob, .. } => blob,
        }
    }

    /// Where the current blob is expected to live.
    pub fn blob_location(&self) -> BlobLocation {
        let area = match self.state {
            FileState::Active { .. } => BlobArea::Active,
            FileState::Trashed { .. } => BlobArea::Trash,
        };
        BlobLocation::new(area, self.blob_name())
    }
}

impl super::OwnedResource for FileRecord {
    fn owner_user_id(&self) -> &str {
        &self.owner_id
    }

    fn resource_label(&self) -> String {
        format!("file {}", self.id)
    }
}

/// One immutable encrypted snapshot of a File.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    /// Starts at 1, strictly increasing, never reused.
    pub number: u32,
    pub blob: String,
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn new(file_id: Uuid, number: u32, blob: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_id,
            number,
            blob: blob.into(),
            created_at: Utc::now(),
        }
    }

    /// Where this version's blob lives, given its File.
    ///
    /// Only the current blob follows the File into the trash; older
    /// versions stay in the active area.
    pub fn location_in(&self, file: &FileRecord) -> BlobLocation {
        if self.blob == file.blob_name() {
            file.blob_location()
        } else {
            BlobLocation::new(BlobArea::Active, &self.blob)
        }
    }
}

/// Audit record of a successful decrypt-and-serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLog {
    pub id: Uuid,
    pub user_id: String,
    pub file_id: Uuid,
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadLog {
    pub fn new(user_id: impl Into<String>, file_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            file_id,
            downloaded_at: Utc::now(),
        }
    }
}

/// Row counts removed by a cascade purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgedRecords {
    pub versions: usize,
    pub download_logs: usize,
}
