//! Passphrase sealing for vault blobs
//!
//! Sealed layout: `[16-byte salt][24-byte nonce][XChaCha20-Poly1305 ciphertext]`.
//! The key is derived from the passphrase and salt with Argon2id, so every
//! seal uses a fresh key and nonce.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::rand_core::RngCore;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use std::fmt;
use thiserror::Error;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;

/// Secret string that never shows up in logs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(passphrase.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(***)")
    }
}

#[derive(Error, Debug)]
pub enum SealError {
    #[error("Sealed blob is truncated ({0} bytes)")]
    Truncated(usize),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Wrong passphrase or tampered blob
    #[error("Blob could not be opened")]
    Open,

    #[error("Blob could not be sealed")]
    Seal,
}

/// Seals and opens blobs with a key derived from a passphrase.
///
/// Key derivation is CPU-heavy; call from a blocking context.
#[derive(Clone)]
pub struct Sealer {
    passphrase: Passphrase,
    params: Params,
}

impl Sealer {
    pub fn new(passphrase: Passphrase) -> Self {
        Self {
            passphrase,
            params: Params::default(),
        }
    }

    /// Minimum-cost key derivation, for tests only
    #[cfg(test)]
    pub(crate) fn cheap(passphrase: &str) -> Self {
        Self {
            passphrase: Passphrase::new(passphrase),
            params: Params::new(Params::MIN_M_COST, 1, 1, None).expect("valid argon2 params"),
        }
    }

    fn cipher(&self, salt: &[u8]) -> Result<XChaCha20Poly1305, SealError> {
        let mut key = [0u8; 32];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
            .hash_password_into(self.passphrase.expose().as_bytes(), salt, &mut key)
            .map_err(|e| SealError::KeyDerivation(e.to_string()))?;
        Ok(XChaCha20Poly1305::new(Key::from_slice(&key)))
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher(&salt)?
            .encrypt(&nonce, plaintext)
            .map_err(|_| SealError::Seal)?;

        let mut sealed = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&salt);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        if sealed.len() < SALT_LEN + NONCE_LEN {
            return Err(SealError::Truncated(sealed.len()));
        }
        let (salt, rest) = sealed.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        self.cipher(salt)?
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| SealError::Open)
    }
}

impl fmt::Debug for Sealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sealer")
            .field("passphrase", &self.passphrase)
            .finish()
    }
}
