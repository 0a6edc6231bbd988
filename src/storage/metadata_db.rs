// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded metadata database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `files`: file_id (16 bytes) → serialized FileRecord
//! - `versions`: file_id ‖ number_be (20 bytes) → serialized VersionRecord
//! - `download_logs`: file_id ‖ time_be ‖ log_id (40 bytes) → serialized DownloadLog
//!
//! Child keys start with the parent id, so a File's versions and logs are a
//! single contiguous range and come back in order.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use uuid::Uuid;

use super::metadata::{
    file_not_found, sort_files, MetadataError, MetadataRepository, MetadataResult,
};
use super::records::{DownloadLog, FileRecord, PurgedRecords, VersionRecord};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: file_id → FileRecord (JSON bytes).
const FILES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("files");

/// Version chain: `file_id | number_be` → VersionRecord (JSON bytes).
const VERSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("versions");

/// Audit trail: `file_id | time_be | log_id` → DownloadLog (JSON bytes).
const DOWNLOAD_LOGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("download_logs");

// =============================================================================
// Key Helpers
// =============================================================================

fn version_key(file_id: Uuid, number: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(20);
    key.extend_from_slice(file_id.as_bytes());
    key.extend_from_slice(&number.to_be_bytes());
    key
}

fn version_number_from_key(key: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    if key.len() >= 20 {
        bytes.copy_from_slice(&key[16..20]);
    }
    u32::from_be_bytes(bytes)
}

fn log_key(log: &DownloadLog) -> Vec<u8> {
    // Flip the sign bit so negative timestamps still sort before positive ones.
    let time = (log.downloaded_at.timestamp_micros() as u64) ^ (1 << 63);
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(log.file_id.as_bytes());
    key.extend_from_slice(&time.to_be_bytes());
    key.extend_from_slice(log.id.as_bytes());
    key
}

/// Inclusive key bounds covering every child row of a File.
fn child_range(file_id: Uuid, suffix_len: usize) -> (Vec<u8>, Vec<u8>) {
    let mut start = file_id.as_bytes().to_vec();
    let mut end = start.clone();
    start.resize(16 + suffix_len, 0x00);
    end.resize(16 + suffix_len, 0xFF);
    (start, end)
}

// =============================================================================
// MetadataDb
// =============================================================================

/// Durable [`MetadataRepository`]. Every mutation is one redb write
/// transaction.
pub struct MetadataDb {
    db: Database,
}

impl MetadataDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> MetadataResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| MetadataError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(VERSIONS)?;
            let _ = write_txn.open_table(DOWNLOAD_LOGS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn scan_files(&self, keep: impl Fn(&FileRecord) -> bool) -> MetadataResult<Vec<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let file: FileRecord = serde_json::from_slice(value.value())?;
            if keep(&file) {
                files.push(file);
            }
        }
        sort_files(&mut files);
        Ok(files)
    }
}

impl MetadataRepository for MetadataDb {
    fn create_file(&self, file: &FileRecord, first: &VersionRecord) -> MetadataResult<()> {
        if first.number != 1 || first.file_id != file.id {
            return Err(MetadataError::VersionConflict {
                file_id: file.id,
                expected: 1,
                found: first.number,
            });
        }
        let file_json = serde_json::to_vec(file)?;
        let version_json = serde_json::to_vec(first)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut files = write_txn.open_table(FILES)?;
            if files.get(file.id.as_bytes().as_slice())?.is_some() {
                return Err(MetadataError::AlreadyExists(format!("file {}", file.id)));
            }
            files.insert(file.id.as_bytes().as_slice(), file_json.as_slice())?;

            let mut versions = write_txn.open_table(VERSIONS)?;
            let key = version_key(file.id, first.number);
            versions.insert(key.as_slice(), version_json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_file(&self, file_id: Uuid) -> MetadataResult<Option<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES)?;
        match table.get(file_id.as_bytes().as_slice())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn update_file(&self, file: &FileRecord) -> MetadataResult<()> {
        let json = serde_json::to_vec(file)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            if table.get(file.id.as_bytes().as_slice())?.is_none() {
                return Err(file_not_found(file.id));
            }
            table.insert(file.id.as_bytes().as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn max_version_number(&self, file_id: Uuid) -> MetadataResult<u32> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VERSIONS)?;
        let (start, end) = child_range(file_id, 4);

        let last = table
            .range(start.as_slice()..=end.as_slice())?
            .next_back()
            .transpose()?
            .map(|(key, _)| version_number_from_key(key.value()));
        Ok(last.unwrap_or(0))
    }

    fn append_version(&self, file: &FileRecord, version: &VersionRecord) -> MetadataResult<()> {
        let file_json = serde_json::to_vec(file)?;
        let version_json = serde_json::to_vec(version)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut files = write_txn.open_table(FILES)?;
            if files.get(file.id.as_bytes().as_slice())?.is_none() {
                return Err(file_not_found(file.id));
            }

            let mut versions = write_txn.open_table(VERSIONS)?;
            let (start, end) = child_range(file.id, 4);
            let current = versions
                .range(start.as_slice()..=end.as_slice())?
                .next_back()
                .transpose()?
                .map(|(key, _)| version_number_from_key(key.value()))
                .unwrap_or(0);

            let expected = current + 1;
            if version.number != expected || version.file_id != file.id {
                // Dropping the uncommitted transaction discards it.
                return Err(MetadataError::VersionConflict {
                    file_id: file.id,
                    expected,
                    found: version.number,
                });
            }

            let key = version_key(file.id, version.number);
            versions.insert(key.as_slice(), version_json.as_slice())?;
            files.insert(file.id.as_bytes().as_slice(), file_json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_versions(&self, file_id: Uuid) -> MetadataResult<Vec<VersionRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VERSIONS)?;
        let (start, end) = child_range(file_id, 4);

        let mut versions = Vec::new();
        for entry in table.range(start.as_slice()..=end.as_slice())? {
            let (_, value) = entry?;
            versions.push(serde_json::from_slice(value.value())?);
        }
        Ok(versions)
    }

    fn list_trashed(&self) -> MetadataResult<Vec<FileRecord>> {
        self.scan_files(FileRecord::is_deleted)
    }

    fn list_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<FileRecord>> {
        self.scan_files(|f| f.owner_id == owner_id)
    }

    fn record_download(&self, log: &DownloadLog) -> MetadataResult<()> {
        let json = serde_json::to_vec(log)?;

        let write_txn = self.db.begin_write()?;
        {
            let files = write_txn.open_table(FILES)?;
            if files.get(log.file_id.as_bytes().as_slice())?.is_none() {
                return Err(file_not_found(log.file_id));
            }

            let mut logs = write_txn.open_table(DOWNLOAD_LOGS)?;
            let key = log_key(log);
            logs.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn download_logs(&self, file_id: Uuid) -> MetadataResult<Vec<DownloadLog>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOWNLOAD_LOGS)?;
        let (start, end) = child_range(file_id, 24);

        let mut logs = Vec::new();
        for entry in table.range(start.as_slice()..=end.as_slice())? {
            let (_, value) = entry?;
            logs.push(serde_json::from_slice(value.value())?);
        }
        Ok(logs)
    }

    fn purge_file(&self, file_id: Uuid) -> MetadataResult<PurgedRecords> {
        let mut purged = PurgedRecords::default();

        let write_txn = self.db.begin_write()?;
        {
            let mut files = write_txn.open_table(FILES)?;
            if files.get(file_id.as_bytes().as_slice())?.is_none() {
                return Err(file_not_found(file_id));
            }

            // Children first, then the parent, all in this transaction.
            let mut logs = write_txn.open_table(DOWNLOAD_LOGS)?;
            let (start, end) = child_range(file_id, 24);
            let log_keys = collect_keys(&logs, &start, &end)?;
            for key in &log_keys {
                logs.remove(key.as_slice())?;
            }
            purged.download_logs = log_keys.len();

            let mut versions = write_txn.open_table(VERSIONS)?;
            let (start, end) = child_range(file_id, 4);
            let version_keys = collect_keys(&versions, &start, &end)?;
            for key in &version_keys {
                versions.remove(key.as_slice())?;
            }
            purged.versions = version_keys.len();

            files.remove(file_id.as_bytes().as_slice())?;
        }
        write_txn.commit()?;
        Ok(purged)
    }
}

/// Copy out the keys in `start..=end` so the table can be mutated afterwards.
fn collect_keys(
    table: &redb::Table<'_, &'static [u8], &'static [u8]>,
    start: &[u8],
    end: &[u8],
) -> MetadataResult<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    for entry in table.range(start..=end)? {
        let (key, _) = entry?;
        keys.push(key.value().to_vec());
    }
    Ok(keys)
}
