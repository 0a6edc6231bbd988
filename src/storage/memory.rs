// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory metadata repository.
//!
//! Same contract as [`super::MetadataDb`] without durability. Used by tests
//! and by deployments that are happy to lose metadata on restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::metadata::{
    file_not_found, sort_files, MetadataError, MetadataRepository, MetadataResult,
};
use super::records::{DownloadLog, FileRecord, PurgedRecords, VersionRecord};

#[derive(Default)]
struct Tables {
    files: HashMap<Uuid, FileRecord>,
    versions: BTreeMap<(Uuid, u32), VersionRecord>,
    download_logs: HashMap<Uuid, Vec<DownloadLog>>,
}

impl Tables {
    fn max_version(&self, file_id: Uuid) -> u32 {
        self.versions
            .range((file_id, 0)..=(file_id, u32::MAX))
            .next_back()
            .map(|((_, n), _)| *n)
            .unwrap_or(0)
    }
}

#[derive(Default)]
pub struct InMemoryMetadata {
    tables: Mutex<Tables>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation completes before the guard drops, so a panic elsewhere
    // never leaves the tables half-written.
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scan_files(&self, keep: impl Fn(&FileRecord) -> bool) -> Vec<FileRecord> {
        let mut files: Vec<FileRecord> = self
            .lock()
            .files
            .values()
            .filter(|f| keep(*f))
            .cloned()
            .collect();
        sort_files(&mut files);
        files
    }
}

impl MetadataRepository for InMemoryMetadata {
    fn create_file(&self, file: &FileRecord, first: &VersionRecord) -> MetadataResult<()> {
        if first.number != 1 || first.file_id != file.id {
            return Err(MetadataError::VersionConflict {
                file_id: file.id,
                expected: 1,
                found: first.number,
            });
        }

        let mut tables = self.lock();
        if tables.files.contains_key(&file.id) {
            return Err(MetadataError::AlreadyExists(format!("file {}", file.id)));
        }
        tables.files.insert(file.id, file.clone());
        tables.versions.insert((file.id, 1), first.clone());
        Ok(())
    }

    fn get_file(&self, file_id: Uuid) -> MetadataResult<Option<FileRecord>> {
        Ok(self.lock().files.get(&file_id).cloned())
    }

    fn update_file(&self, file: &FileRecord) -> MetadataResult<()> {
        let mut tables = self.lock();
        match tables.files.get_mut(&file.id) {
            Some(existing) => {
                *existing = file.clone();
                Ok(())
            }
            None => Err(file_not_found(file.id)),
        }
    }

    fn max_version_number(&self, file_id: Uuid) -> MetadataResult<u32> {
        Ok(self.lock().max_version(file_id))
    }

    fn append_version(&self, file: &FileRecord, version: &VersionRecord) -> MetadataResult<()> {
        let mut tables = self.lock();
        if !tables.files.contains_key(&file.id) {
            return Err(file_not_found(file.id));
        }

        let expected = tables.max_version(file.id) + 1;
        if version.number != expected || version.file_id != file.id {
            return Err(MetadataError::VersionConflict {
                file_id: file.id,
                expected,
                found: version.number,
            });
        }

        tables
            .versions
            .insert((file.id, version.number), version.clone());
        tables.files.insert(file.id, file.clone());
        Ok(())
    }

    fn list_versions(&self, file_id: Uuid) -> MetadataResult<Vec<VersionRecord>> {
        Ok(self
            .lock()
            .versions
            .range((file_id, 0)..=(file_id, u32::MAX))
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn list_trashed(&self) -> MetadataResult<Vec<FileRecord>> {
        Ok(self.scan_files(FileRecord::is_deleted))
    }

    fn list_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<FileRecord>> {
        Ok(self.scan_files(|f| f.owner_id == owner_id))
    }

    fn record_download(&self, log: &DownloadLog) -> MetadataResult<()> {
        let mut tables = self.lock();
        if !tables.files.contains_key(&log.file_id) {
            return Err(file_not_found(log.file_id));
        }
        tables
            .download_logs
            .entry(log.file_id)
            .or_default()
            .push(log.clone());
        Ok(())
    }

    fn download_logs(&self, file_id: Uuid) -> MetadataResult<Vec<DownloadLog>> {
        Ok(self
            .lock()
            .download_logs
            .get(&file_id)
            .cloned()
            .unwrap_or_default())
    }

    fn purge_file(&self, file_id: Uuid) -> MetadataResult<PurgedRecords> {
        let mut tables = self.lock();
        if !tables.files.contains_key(&file_id) {
            return Err(file_not_found(file_id));
        }

        let download_logs = tables
            .download_logs
            .remove(&file_id)
            .map(|logs| logs.len())
            .unwrap_or(0);

        let version_keys: Vec<(Uuid, u32)> = tables
            .versions
            .range((file_id, 0)..=(file_id, u32::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in &version_keys {
            tables.versions.remove(key);
        }

        tables.files.remove(&file_id);

        Ok(PurgedRecords {
            versions: version_keys.len(),
            download_logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::metadata::contract;

    #[test]
    fn create_and_read() {
        contract::create_and_read(&InMemoryMetadata::new());
    }

    #[test]
    fn first_version_must_be_one() {
        contract::first_version_must_be_one(&InMemoryMetadata::new());
    }

    #[test]
    fn append_is_compare_and_swap() {
        contract::append_is_compare_and_swap(&InMemoryMetadata::new());
    }

    #[test]
    fn update_requires_existing() {
        contract::update_requires_existing(&InMemoryMetadata::new());
    }

    #[test]
    fn listings_filter_by_state_and_owner() {
        contract::listings_filter_by_state_and_owner(&InMemoryMetadata::new());
    }

    #[test]
    fn downloads_and_purge_cascade() {
        contract::downloads_and_purge_cascade(&InMemoryMetadata::new());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        use std::sync::Arc;

        let repo = Arc::new(InMemoryMetadata::new());
        let file = contract::file("alice", "b1");
        repo.create_file(&file, &VersionRecord::new(file.id, 1, "b1"))
            .unwrap();

        let clone = Arc::clone(&repo);
        let _ = std::thread::spawn(move || {
            let _guard = clone.tables.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert_eq!(repo.get_file(file.id).unwrap(), Some(file));
    }
}
