// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Metadata repository contract.
//!
//! The repository is the only authority on which Files exist and which blob
//! is current. Every mutation is a single durable step: an implementation
//! either applies all of it or none of it.

use uuid::Uuid;

use super::records::{DownloadLog, FileRecord, PurgedRecords, VersionRecord};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cannot create metadata directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("version conflict on file {file_id}: expected {expected}, got {found}")]
    VersionConflict {
        file_id: Uuid,
        expected: u32,
        found: u32,
    },
}

impl MetadataError {
    /// A concurrent writer got there first; retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MetadataError::VersionConflict { .. })
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Durable store for File, Version and DownloadLog records.
///
/// Calls are blocking; async callers run them on a blocking thread.
pub trait MetadataRepository: Send + Sync {
    /// Insert a new File together with its first Version.
    ///
    /// # Errors
    /// `AlreadyExists` if the id is taken, `VersionConflict` unless the
    /// version is number 1 of this File.
    fn create_file(&self, file: &FileRecord, first: &VersionRecord) -> MetadataResult<()>;

    fn get_file(&self, file_id: Uuid) -> MetadataResult<Option<FileRecord>>;

    /// Replace an existing File record.
    fn update_file(&self, file: &FileRecord) -> MetadataResult<()>;

    /// Highest recorded version number, 0 if none.
    fn max_version_number(&self, file_id: Uuid) -> MetadataResult<u32>;

    /// Append `version` and store `file` in the same transaction.
    ///
    /// Compare-and-swap on the chain head: the version number must be
    /// exactly `max + 1`, otherwise `VersionConflict` and nothing changes.
    fn append_version(&self, file: &FileRecord, version: &VersionRecord) -> MetadataResult<()>;

    /// All versions of a File, ascending by number.
    fn list_versions(&self, file_id: Uuid) -> MetadataResult<Vec<VersionRecord>>;

    /// Every File currently in the trash, oldest upload first.
    fn list_trashed(&self) -> MetadataResult<Vec<FileRecord>>;

    /// Every File of an owner regardless of state, oldest upload first.
    fn list_by_owner(&self, owner_id: &str) -> MetadataResult<Vec<FileRecord>>;

    /// Append a download record. The File must exist.
    fn record_download(&self, log: &DownloadLog) -> MetadataResult<()>;

    /// Download records of a File, oldest first.
    fn download_logs(&self, file_id: Uuid) -> MetadataResult<Vec<DownloadLog>>;

    /// Delete the File's download logs, then its versions, then the File.
    fn purge_file(&self, file_id: Uuid) -> MetadataResult<PurgedRecords>;
}

pub(crate) fn file_not_found(file_id: Uuid) -> MetadataError {
    MetadataError::NotFound(format!("file {file_id}"))
}

/// Orders listings the same way in every implementation.
pub(crate) fn sort_files(files: &mut [FileRecord]) {
    files.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
}
