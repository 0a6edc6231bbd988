// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem blob store with `active` and `trash` areas.
//!
//! ## Guarantees
//!
//! - Writes land in `.staging/` first and are published with a rename, so a
//!   reader never sees a partially written blob.
//! - Moves between areas are a single rename. When the areas sit on
//!   different volumes the move falls back to copy, fsync, publish, and only
//!   then removes the source.
//! - The store knows nothing about Files. Whether a blob is "current" is
//!   decided by the metadata repository, never by listing this directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::StoragePaths;

/// Error type for blob storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// Blob not found
    NotFound(String),
    /// Destination already occupied
    AlreadyExists(String),
    /// Storage not initialized
    NotInitialized,
    /// Integrity violation (health probe read back different bytes)
    IntegrityViolation(String),
    /// Write abandoned before it was published
    Cancelled(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::NotFound(entity) => write!(f, "Not found: {entity}"),
            StorageError::AlreadyExists(entity) => write!(f, "Already exists: {entity}"),
            StorageError::NotInitialized => write!(f, "Storage not initialized"),
            StorageError::IntegrityViolation(msg) => write!(f, "Integrity violation: {msg}"),
            StorageError::Cancelled(entity) => write!(f, "Write cancelled: {entity}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

impl StorageError {
    /// Map an I/O error, naming the blob when it is missing.
    fn for_blob(e: io::Error, location: &BlobLocation) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(location.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The two zones a blob can reside in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobArea {
    Active,
    Trash,
}

impl std::fmt::Display for BlobArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobArea::Active => write!(f, "active"),
            BlobArea::Trash => write!(f, "trash"),
        }
    }
}

/// A blob's area and generated name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobLocation {
    pub area: BlobArea,
    pub name: String,
}

impl BlobLocation {
    pub fn new(area: BlobArea, name: impl Into<String>) -> Self {
        Self {
            area,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.area, self.name)
    }
}

/// Longest part of the original file name kept in a blob name, in bytes.
pub const MAX_NAME_SUFFIX: usize = 100;

/// The last `max` bytes of `name`, starting on a char boundary.
fn tail_within(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut start = name.len() - max;
    while !name.is_char_boundary(start) {
        start += 1;
    }
    &name[start..]
}

/// Blob store rooted at [`StoragePaths`].
#[derive(Debug, Clone)]
pub struct BlobStore {
    paths: StoragePaths,
    initialized: bool,
}

impl BlobStore {
    /// Create a new BlobStore instance.
    ///
    /// Does NOT initialize the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the area and staging directories. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        let dirs = [
            self.paths.active_dir(),
            self.paths.trash_dir(),
            self.paths.staging_dir(),
        ];

        for dir in dirs {
            fs::create_dir_all(&dir)?;
        }

        self.initialized = true;
        Ok(())
    }

    /// Write-read-delete probe on the blob root.
    pub fn health_check(&self) -> StorageResult<()> {
        self.ensure_initialized()?;

        let test_file = self.paths.staging_dir().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }

        Ok(())
    }

    /// Collision-resistant blob name: random token plus the base name of
    /// the original file, cut to its last [`MAX_NAME_SUFFIX`] bytes so the
    /// name and its staging variants stay within filesystem limits.
    pub fn generate_name(original_name: &str) -> String {
        let base = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| {
                let clean = n
                    .chars()
                    .map(|c| if c.is_control() { '_' } else { c })
                    .collect::<String>();
                tail_within(&clean, MAX_NAME_SUFFIX).to_string()
            })
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "blob".to_string());
        format!("{}_{base}", Uuid::new_v4().simple())
    }

    /// Directory backing an area.
    pub fn area_dir(&self, area: BlobArea) -> PathBuf {
        match area {
            BlobArea::Active => self.paths.active_dir(),
            BlobArea::Trash => self.paths.trash_dir(),
        }
    }

    /// Filesystem path of a blob.
    pub fn blob_path(&self, location: &BlobLocation) -> PathBuf {
        self.area_dir(location.area).join(&location.name)
    }

    // ========== Blob Operations ==========

    /// Store a new blob in the active area.
    pub fn put(&self, name: &str, data: &[u8]) -> StorageResult<BlobLocation> {
        self.put_cancellable(name, data, &CancellationToken::new())
    }

    /// Store a new blob, abandoning it if `cancel` fires before publishing.
    ///
    /// The payload is written and fsynced under `.staging/`; only then is it
    /// renamed into `active/`. On cancellation or failure the staged file is
    /// removed and nothing becomes visible.
    pub fn put_cancellable(
        &self,
        name: &str,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> StorageResult<BlobLocation> {
        self.ensure_initialized()?;

        let location = BlobLocation::new(BlobArea::Active, name);
        let final_path = self.blob_path(&location);
        if final_path.exists() {
            return Err(StorageError::AlreadyExists(location.to_string()));
        }

        let staged = self
            .paths
            .staged_blob(name, &Uuid::new_v4().simple().to_string());

        let result = self.stage_and_publish(&staged, &final_path, data, cancel, &location);
        if result.is_err() {
            let _ = fs::remove_file(&staged);
        }
        result.map(|()| location)
    }

    fn stage_and_publish(
        &self,
        staged: &Path,
        final_path: &Path,
        data: &[u8],
        cancel: &CancellationToken,
        location: &BlobLocation,
    ) -> StorageResult<()> {
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(staged)?;
            file.write_all(data)?;
            file.sync_all()?;
        }

        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled(location.to_string()));
        }

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(staged, final_path)?;
        Ok(())
    }

    /// Read a blob.
    ///
    /// # Errors
    /// `StorageError::NotFound` if the blob is absent.
    pub fn get(&self, location: &BlobLocation) -> StorageResult<Vec<u8>> {
        self.ensure_initialized()?;

        let path = self.blob_path(location);
        let mut file = File::open(&path).map_err(|e| StorageError::for_blob(e, location))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Check whether a blob is present.
    pub fn exists(&self, location: &BlobLocation) -> bool {
        self.blob_path(location).is_file()
    }

    /// Move a blob to `destination`, keeping its name.
    ///
    /// Either the blob ends up fully in the destination or it stays fully
    /// in the source.
    pub fn move_to(
        &self,
        source: &BlobLocation,
        destination: BlobArea,
    ) -> StorageResult<BlobLocation> {
        self.ensure_initialized()?;

        let target = BlobLocation::new(destination, source.name.clone());
        if target == *source {
            return Ok(target);
        }

        let from = self.blob_path(source);
        let to = self.blob_path(&target);

        if !from.is_file() {
            return Err(StorageError::NotFound(source.to_string()));
        }
        if to.exists() {
            return Err(StorageError::AlreadyExists(target.to_string()));
        }
        fs::create_dir_all(self.area_dir(destination))?;

        match fs::rename(&from, &to) {
            Ok(()) => Ok(target),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                tracing::warn!(
                    source = %source,
                    destination = %target,
                    "Areas are on different volumes, moving blob by copy"
                );
                self.copy_then_remove(&from, &to)?;
                Ok(target)
            }
            Err(e) => Err(StorageError::for_blob(e, source)),
        }
    }

    /// Copy to a sibling temp file, fsync, rename into place, then delete
    /// the source. The source is untouched until the copy is durable.
    fn copy_then_remove(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let temp = to.with_extension(format!("{}.part", Uuid::new_v4().simple()));

        let copied = fs::copy(from, &temp)
            .and_then(|_| File::open(&temp)?.sync_all())
            .and_then(|()| fs::rename(&temp, to));
        if let Err(e) = copied {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::Io(e));
        }

        fs::remove_file(from)?;
        Ok(())
    }

    /// Delete a blob.
    ///
    /// # Errors
    /// `StorageError::NotFound` if the blob was already gone; callers that
    /// want idempotence match on it.
    pub fn delete(&self, location: &BlobLocation) -> StorageResult<()> {
        self.ensure_initialized()?;
        fs::remove_file(self.blob_path(location)).map_err(|e| StorageError::for_blob(e, location))
    }

    /// List blob names in an area.
    pub fn list(&self, area: BlobArea) -> StorageResult<Vec<String>> {
        self.ensure_initialized()?;

        let dir = self.area_dir(area);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn ensure_initialized(&self) -> StorageResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }
}
