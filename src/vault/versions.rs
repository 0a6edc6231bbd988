// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Version chain: the append-only history of a File's blobs.

use std::sync::Arc;

use uuid::Uuid;

use super::error::{VaultError, VaultResult};
use crate::storage::{FileRecord, MetadataRepository, VersionRecord};

#[derive(Clone)]
pub struct VersionChain {
    metadata: Arc<dyn MetadataRepository>,
}

impl VersionChain {
    pub fn new(metadata: Arc<dyn MetadataRepository>) -> Self {
        Self { metadata }
    }

    /// Append `blob` as the next version and make `file` (already pointing
    /// at `blob`) the stored File record, in one metadata transaction.
    ///
    /// Callers hold the File's lock; the metadata store still rejects a
    /// stale number, so two writers can never both get the same one.
    pub fn append(&self, file: &FileRecord, blob: &str) -> VaultResult<VersionRecord> {
        let number = self.metadata.max_version_number(file.id)? + 1;
        let version = VersionRecord::new(file.id, number, blob);
        self.metadata.append_version(file, &version)?;
        Ok(version)
    }

    /// Highest recorded version. Reports the record even when its blob is
    /// gone; fetching the content is what surfaces the gap.
    pub fn latest(&self, file_id: Uuid) -> VaultResult<Option<VersionRecord>> {
        Ok(self.metadata.list_versions(file_id)?.pop())
    }

    /// All versions, ascending by number.
    pub fn list(&self, file_id: Uuid) -> VaultResult<Vec<VersionRecord>> {
        Ok(self.metadata.list_versions(file_id)?)
    }

    pub fn find(&self, file_id: Uuid, number: u32) -> VaultResult<VersionRecord> {
        self.metadata
            .list_versions(file_id)?
            .into_iter()
            .find(|v| v.number == number)
            .ok_or(VaultError::VersionNotFound { file_id, number })
    }
}
