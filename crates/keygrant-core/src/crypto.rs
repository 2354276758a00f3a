//! Wrapping-key derivation and authenticated encryption.
//!
//! # Algorithms
//!
//! - **Key Derivation**: HKDF-SHA256. The salt is `SHA-256(secret)` and the
//!   info string is fixed, so the same hardware secret always yields the same
//!   wrapping key. The wrapping key is never persisted. Identity archives use
//!   a sibling key under a separate info string, so data sealed for storage
//!   can never be opened as an archive or the reverse.
//! - **Encryption**: ChaCha20-Poly1305 with a fresh random 96-bit nonce per
//!   call.

use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce, aead::Aead};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Domain-separation string for wrapping-key derivation.
pub const WRAPPING_KEY_INFO: &[u8] = b"keygrant/wrapping-key/v1";

/// HKDF info for the key that seals identity archives.
pub const ARCHIVE_KEY_INFO: &[u8] = b"keygrant/archive-key/v1";

/// Wrapping key length (256 bits).
pub const WRAPPING_KEY_LEN: usize = 32;

/// Nonce length for ChaCha20-Poly1305 (12 bytes).
pub const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 auth tag length (16 bytes).
pub const AUTH_TAG_LEN: usize = 16;

/// Symmetric key derived from a hardware secret.
///
/// Lives only in memory and is zeroized when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WrappingKey {
    bytes: [u8; WRAPPING_KEY_LEN],
}

impl fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappingKey").finish_non_exhaustive()
    }
}

/// Ciphertext plus the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub iv: Vec<u8>,
}

impl WrappingKey {
    /// Derive the wrapping key for a hardware secret.
    ///
    /// Deterministic: a later session holding the same secret derives the
    /// same key and can open archives sealed by an earlier one.
    pub fn derive(secret: &[u8]) -> Result<Self> {
        Self::derive_with_info(secret, WRAPPING_KEY_INFO)
    }

    /// Derive the key that seals identity archives for a hardware secret.
    pub fn derive_archive_key(secret: &[u8]) -> Result<Self> {
        Self::derive_with_info(secret, ARCHIVE_KEY_INFO)
    }

    fn derive_with_info(secret: &[u8], info: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::KeyDerivation("hardware secret is empty".into()));
        }

        let salt = Sha256::digest(secret);
        let hk = Hkdf::<Sha256>::new(Some(salt.as_slice()), secret);

        let mut bytes = [0u8; WRAPPING_KEY_LEN];
        hk.expand(info, &mut bytes)
            .map_err(|e| Error::KeyDerivation(format!("HKDF expand failed: {e}")))?;

        Ok(Self { bytes })
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedBox> {
        let nonce: [u8; NONCE_LEN] = random_bytes();
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        Ok(SealedBox {
            ciphertext,
            iv: nonce.to_vec(),
        })
    }

    /// Decrypt a sealed box.
    ///
    /// Fails with [`Error::Decryption`] if the tag does not verify, which
    /// covers both the wrong key and tampered ciphertext.
    pub fn open(&self, sealed: &SealedBox) -> Result<Vec<u8>> {
        if sealed.iv.len() != NONCE_LEN {
            return Err(Error::Decryption);
        }
        self.cipher()
            .decrypt(Nonce::from_slice(&sealed.iv), sealed.ciphertext.as_slice())
            .map_err(|_| Error::Decryption)
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.bytes))
    }
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
