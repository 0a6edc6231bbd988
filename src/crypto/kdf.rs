// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Passphrase stretching: PBKDF2-HMAC-SHA256 → 256-bit AES key.

use std::num::NonZeroU32;

use ring::pbkdf2;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{CryptoError, CryptoResult, KEY_LEN, SALT_LEN};

/// Fixed iteration count. Changing it makes every existing blob undecryptable.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

const ITERATIONS: NonZeroU32 = match NonZeroU32::new(PBKDF2_ITERATIONS) {
    Some(n) => n,
    None => panic!("PBKDF2 iteration count must be non-zero"),
};

/// A derived AES-256 key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DerivedKey").field(&"[REDACTED]").finish()
    }
}

/// Derive the 32-byte key for `passphrase` and `salt`.
///
/// Deterministic: the same inputs always give the same key, which is what
/// lets decryption re-derive the key from the IV stored in the blob.
///
/// # Errors
/// [`CryptoError::EmptyPassphrase`] if `passphrase` is empty.
pub fn derive_key(passphrase: &str, salt: &[u8; SALT_LEN]) -> CryptoResult<DerivedKey> {
    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase);
    }
    Ok(DerivedKey(stretch(passphrase.as_bytes(), salt, ITERATIONS)))
}

fn stretch(secret: &[u8], salt: &[u8], iterations: NonZeroU32) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, iterations, salt, secret, &mut out);
    out
}
