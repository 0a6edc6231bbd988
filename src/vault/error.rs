// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the vault core.

use std::time::Duration;

use uuid::Uuid;

use crate::crypto::CryptoError;
use crate::storage::{AccessDenied, LifecycleStatus, MetadataError, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Rejected input; nothing was changed.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Decryption failed. A wrong passphrase and a corrupted blob look the
    /// same without an integrity tag.
    #[error("incorrect passphrase")]
    WrongPassphraseOrCorruptBlob,

    #[error("file {0} not found")]
    FileNotFound(Uuid),

    #[error("version {number} of file {file_id} not found")]
    VersionNotFound { file_id: Uuid, number: u32 },

    /// Metadata references a blob that is not on disk.
    #[error("content of file {file_id} is missing ({location})")]
    BlobMissing { file_id: Uuid, location: String },

    /// Restore asked for, but the trash holds no blob for the File.
    #[error("no trashed content to restore for file {0}")]
    RestoreSourceMissing(Uuid),

    #[error("file {file_id} is {actual}, expected {expected}")]
    InvalidState {
        file_id: Uuid,
        expected: LifecycleStatus,
        actual: LifecycleStatus,
    },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("blob storage failure: {0}")]
    Io(#[source] StorageError),

    #[error("metadata failure: {0}")]
    Metadata(#[source] MetadataError),

    #[error("crypto failure: {0}")]
    Crypto(#[source] CryptoError),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        VaultError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether the same call may succeed if simply tried again.
    pub fn is_retryable(&self) -> bool {
        match self {
            VaultError::Timeout(_) | VaultError::Cancelled | VaultError::Io(_) => true,
            VaultError::Metadata(e) => e.is_conflict(),
            _ => false,
        }
    }
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::WrongPassphraseOrCorruptBlob | CryptoError::MalformedBlob { .. } => {
                VaultError::WrongPassphraseOrCorruptBlob
            }
            CryptoError::EmptyPassphrase => {
                VaultError::validation("passphrase", "must not be empty")
            }
            other => VaultError::Crypto(other),
        }
    }
}

impl From<StorageError> for VaultError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Cancelled(_) => VaultError::Cancelled,
            other => VaultError::Io(other),
        }
    }
}

impl From<AccessDenied> for VaultError {
    fn from(e: AccessDenied) -> Self {
        VaultError::PermissionDenied(e.to_string())
    }
}

impl From<MetadataError> for VaultError {
    fn from(e: MetadataError) -> Self {
        VaultError::Metadata(e)
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
