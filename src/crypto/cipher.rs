// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-CBC codec that owns the blob framing.

use aes::Aes256;
use base64ct::{Base64, Encoding};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};

use super::kdf::derive_key;
use super::{CryptoError, CryptoResult, IV_LEN};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// An encrypted payload framed as `IV ‖ ciphertext`.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    bytes: Vec<u8>,
}

impl EncryptedBlob {
    /// Wrap raw bytes read from storage.
    ///
    /// # Errors
    /// [`CryptoError::MalformedBlob`] if the input cannot hold an IV.
    pub fn from_bytes(bytes: Vec<u8>) -> CryptoResult<Self> {
        if bytes.len() < IV_LEN {
            return Err(CryptoError::MalformedBlob { len: bytes.len() });
        }
        Ok(Self { bytes })
    }

    pub fn iv(&self) -> [u8; IV_LEN] {
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&self.bytes[..IV_LEN]);
        iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[IV_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Encrypt `plaintext` under `passphrase` with a fresh random IV.
pub fn encrypt(plaintext: &[u8], passphrase: &str) -> CryptoResult<EncryptedBlob> {
    let iv = generate_iv()?;
    let key = derive_key(passphrase, &iv)?;

    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), (&iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut bytes = Vec::with_capacity(IV_LEN + ciphertext.len());
    bytes.extend_from_slice(&iv);
    bytes.extend_from_slice(&ciphertext);
    Ok(EncryptedBlob { bytes })
}

/// Decrypt a framed blob with `passphrase`.
///
/// # Errors
/// - [`CryptoError::MalformedBlob`] when the input is shorter than the IV;
///   no cipher work is attempted.
/// - [`CryptoError::WrongPassphraseOrCorruptBlob`] when decryption or
///   unpadding fails. The two causes are indistinguishable.
pub fn decrypt(blob: &[u8], passphrase: &str) -> CryptoResult<Vec<u8>> {
    if blob.len() < IV_LEN {
        return Err(CryptoError::MalformedBlob { len: blob.len() });
    }
    let (iv_bytes, ciphertext) = blob.split_at(IV_LEN);
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(iv_bytes);

    let key = derive_key(passphrase, &iv)?;

    Aes256CbcDec::new(key.as_bytes().into(), (&iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::WrongPassphraseOrCorruptBlob)
}

/// Trial decryption used as proof that the caller knows the passphrase.
/// The plaintext is dropped before returning.
pub fn verify_passphrase(blob: &[u8], passphrase: &str) -> bool {
    decrypt(blob, passphrase).is_ok()
}

/// Text form of an IV for the metadata record.
pub fn encode_iv(iv: &[u8; IV_LEN]) -> String {
    Base64::encode_string(iv)
}

fn generate_iv() -> CryptoResult<[u8; IV_LEN]> {
    let mut iv = [0u8; IV_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| CryptoError::Randomness)?;
    Ok(iv)
}
