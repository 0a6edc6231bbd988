// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-file advisory locks.
//!
//! Every operation that reads-then-writes a File (new version, lifecycle
//! transition, download) holds that File's lock. Different Files never
//! share a lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Held for the duration of one operation on one File. Owned so it can be
/// moved onto the blocking thread that does the work.
pub type FileGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct FileLocks {
    entries: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `file_id`.
    pub async fn acquire(&self, file_id: Uuid) -> FileGuard {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            // Nobody holds or waits on an entry whose only reference is the map.
            entries.retain(|id, lock| *id == file_id || Arc::strong_count(lock) > 1);
            Arc::clone(entries.entry(file_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of Files with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
