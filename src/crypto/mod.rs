// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Blob Cryptography
//!
//! Passphrase-based encryption of uploaded artifacts.
//!
//! ## Wire Format
//!
//! ```text
//! [16-byte IV][AES-256-CBC ciphertext, PKCS#7 padded]
//! ```
//!
//! No length prefix, no magic bytes, no integrity tag. The IV doubles as
//! the PBKDF2 salt for the passphrase, so the blob alone is enough to
//! re-derive the key.
//!
//! ## Limitations
//!
//! Without an authentication tag a wrong passphrase and a corrupted blob
//! look the same: both surface as [`CryptoError::WrongPassphraseOrCorruptBlob`].
//! A wrong key still passes the padding check roughly once in 256 attempts,
//! in which case the output is garbage rather than an error.

pub mod cipher;
pub mod kdf;

pub use cipher::{decrypt, encode_iv, encrypt, verify_passphrase, EncryptedBlob};
pub use kdf::{derive_key, DerivedKey, PBKDF2_ITERATIONS};

/// AES block size and IV length in bytes.
pub const IV_LEN: usize = 16;

/// PBKDF2 salt length in bytes (the IV is used as salt).
pub const SALT_LEN: usize = IV_LEN;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Errors raised by key derivation and the cipher codec.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The passphrase was empty. Callers validate this before reaching the
    /// codec; hitting it here is a caller bug, not a crypto failure.
    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    /// Input is too short to contain an IV.
    #[error("malformed blob: {len} bytes is shorter than the {IV_LEN}-byte IV")]
    MalformedBlob { len: usize },

    /// Decryption or unpadding failed.
    #[error("incorrect passphrase or corrupt blob")]
    WrongPassphraseOrCorruptBlob,

    /// The system random generator failed to produce an IV.
    #[error("secure random generator unavailable")]
    Randomness,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
