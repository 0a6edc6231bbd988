// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the vault storage layout.

use std::path::{Path, PathBuf};

/// Default root directory for blobs and metadata.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the blob root.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all vault data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Blob Areas ==========

    /// Blobs backing active files.
    pub fn active_dir(&self) -> PathBuf {
        self.root.join("active")
    }

    /// Blobs of soft-deleted files awaiting restore or purge.
    pub fn trash_dir(&self) -> PathBuf {
        self.root.join("trash")
    }

    /// Scratch space for in-flight writes. Lives on the same volume as the
    /// areas so publishing is a rename.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(".staging")
    }

    /// Path to a staged (unpublished) blob.
    pub fn staged_blob(&self, name: &str, token: &str) -> PathBuf {
        self.staging_dir().join(format!("{name}.{token}.part"))
    }

    // ========== Metadata ==========

    /// Embedded metadata database.
    pub fn metadata_db(&self) -> PathBuf {
        self.root.join("metadata.redb")
    }
}
