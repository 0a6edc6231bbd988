// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Vault - Encrypted, Versioned File Store
//!
//! Every file is encrypted under a passphrase chosen by its owner, stored as
//! an opaque blob, and moves through an active -> trashed -> restored/purged
//! lifecycle with a full version history.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Requester identity and roles
//! - `crypto` - Passphrase key derivation and the blob cipher
//! - `storage` - Blob areas on disk and the metadata store (redb)
//! - `vault` - Upload, download, versions and lifecycle operations

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod state;
pub mod storage;
pub mod vault;
