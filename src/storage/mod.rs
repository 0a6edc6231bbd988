// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Storage Module
//!
//! Encrypted blobs live on a plain filesystem; everything that says what
//! those blobs *mean* lives in the metadata repository.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   active/{token}_{name}     # blobs of active files and all older versions
//!   trash/{token}_{name}      # current blob of each soft-deleted file
//!   .staging/*.part           # in-flight writes, never read
//!   metadata.redb             # File / Version / DownloadLog records
//! ```
//!
//! ## Important Notes
//!
//! - Blobs are already ciphertext when they reach this module; nothing here
//!   sees a passphrase.
//! - Listing a directory is never evidence that a File exists. Ask the
//!   [`MetadataRepository`].

pub mod blob_store;
pub mod memory;
pub mod metadata;
pub mod metadata_db;
pub mod ownership;
pub mod paths;
pub mod records;

pub use blob_store::{BlobArea, BlobLocation, BlobStore, StorageError, StorageResult};
pub use memory::InMemoryMetadata;
pub use metadata::{MetadataError, MetadataRepository, MetadataResult};
pub use metadata_db::MetadataDb;
pub use ownership::{AccessDenied, OwnedResource, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use records::{
    DownloadLog, FileRecord, FileState, LifecycleStatus, PurgedRecords, VersionRecord,
};
