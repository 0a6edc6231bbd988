// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! The vault does not authenticate users itself. A gateway in front of it
//! does, and forwards the outcome as two headers.
//!
//! ## Identity Flow
//!
//! 1. Gateway authenticates the caller
//! 2. Gateway sets `x-user-id: <canonical id>` and optionally
//!    `x-user-role: admin|client`
//! 3. Vault handlers extract a [`Requester`] via the [`Auth`] extractor
//!
//! ## Security
//!
//! - All non-health endpoints require an identity
//! - The only authorization rule applied here is "owner or admin"
//! - Never expose the vault directly; the headers are trusted as-is

pub mod error;
pub mod extractor;
pub mod requester;
pub mod roles;

pub use error::AuthError;
pub use extractor::Auth;
pub use requester::Requester;
pub use roles::Role;
