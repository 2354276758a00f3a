//! Signing identities and their archives.
//!
//! # Security
//!
//! - **Zeroization on drop**: `IdentityKey` wraps `ed25519-dalek`'s
//!   `SigningKey`, which zeroizes on drop. `KeyArchive` zeroizes its secret
//!   bytes the same way.
//! - **No Debug leakage**: both types print only the DID.
//!
//! These types are meant to live inside the signing core's isolation
//! boundary. Only a sealed archive (see [`crate::crypto`]) leaves it.

use crate::{Did, Error, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Archive format version.
pub const ARCHIVE_VERSION: u8 = 1;

/// Signature algorithm recorded in archives.
pub const ARCHIVE_ALGORITHM: &str = "Ed25519";

/// The identity's signing key.
pub struct IdentityKey {
    signing_key: SigningKey,
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKey")
            .field("did", &self.did().to_string())
            .finish_non_exhaustive()
    }
}

impl IdentityKey {
    /// Generate a new random identity key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from a 32-byte seed.
    ///
    /// The caller should zeroize the source bytes afterwards.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Reconstruct a key from its archive, checking the recorded DID.
    pub fn from_archive(archive: &KeyArchive) -> Result<Self> {
        if archive.version != ARCHIVE_VERSION {
            return Err(Error::InvalidArchive(format!(
                "unsupported archive version {}",
                archive.version
            )));
        }
        if archive.algorithm != ARCHIVE_ALGORITHM {
            return Err(Error::InvalidArchive(format!(
                "unsupported algorithm {}",
                archive.algorithm
            )));
        }

        let seed: Zeroizing<[u8; 32]> = Zeroizing::new(
            archive
                .secret
                .as_slice()
                .try_into()
                .map_err(|_| Error::InvalidArchive("secret must be 32 bytes".into()))?,
        );
        let key = Self::from_bytes(&seed);

        if key.did().to_string() != archive.did {
            return Err(Error::InvalidArchive("DID does not match key".into()));
        }
        Ok(key)
    }

    /// Export a self-describing archive of this key.
    pub fn to_archive(&self) -> KeyArchive {
        KeyArchive {
            version: ARCHIVE_VERSION,
            algorithm: ARCHIVE_ALGORITHM.to_string(),
            did: self.did().to_string(),
            secret: self.signing_key.to_bytes().to_vec(),
        }
    }

    /// Get the DID for this key.
    pub fn did(&self) -> Did {
        Did::new(self.signing_key.verifying_key())
    }

    /// Get the public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Check a signature against this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match Signature::from_slice(signature) {
            Ok(signature) => self.verifying_key().verify(message, &signature).is_ok(),
            Err(_) => false,
        }
    }
}

/// A self-describing export of an identity key.
///
/// Holds raw secret material; seal it before it leaves the signing core.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyArchive {
    pub version: u8,
    pub algorithm: String,
    pub did: String,
    #[serde(with = "serde_bytes")]
    secret: Vec<u8>,
}

impl fmt::Debug for KeyArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyArchive")
            .field("version", &self.version)
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

impl KeyArchive {
    /// Encode as CBOR. The returned buffer is zeroized on drop.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut out = Zeroizing::new(Vec::new());
        ciborium::ser::into_writer(self, &mut *out)
            .map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(out)
    }

    /// Decode from CBOR.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| Error::InvalidArchive(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key = IdentityKey::generate();
        assert!(key.did().to_string().starts_with("did:key:z6Mk"));
    }

    #[test]
    fn test_sign_verify() {
        let key = IdentityKey::generate();
        let signature = key.sign(b"hello world");

        assert!(key.verify(b"hello world", &signature.to_bytes()));
        assert!(!key.verify(b"hello there", &signature.to_bytes()));
        assert!(!key.verify(b"hello world", b"short"));
    }

    #[test]
    fn test_archive_roundtrip() {
        let key = IdentityKey::generate();
        let bytes = key.to_archive().to_bytes().unwrap();

        let archive = KeyArchive::from_bytes(&bytes).unwrap();
        let restored = IdentityKey::from_archive(&archive).unwrap();
        assert_eq!(restored.did(), key.did());
    }

    #[test]
    fn test_archive_did_mismatch_rejected() {
        let key = IdentityKey::generate();
        let other = IdentityKey::generate();
        let mut archive = key.to_archive();
        archive.did = other.did().to_string();

        assert!(matches!(
            IdentityKey::from_archive(&archive),
            Err(Error::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_known_seed() {
        let seed: [u8; 32] =
            hex::decode("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")
                .unwrap()
                .try_into()
                .unwrap();
        let key = IdentityKey::from_bytes(&seed);
        assert_eq!(
            hex::encode(key.verifying_key().as_bytes()),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    #[test]
    fn test_debug_does_not_leak_secrets() {
        let key = IdentityKey::generate();
        let debug_output = format!("{:?}", key);
        assert!(debug_output.contains("did:key:"));
        assert!(!debug_output.to_lowercase().contains("secret"));
        assert!(debug_output.contains(".."));

        let archive_output = format!("{:?}", key.to_archive());
        assert!(!archive_output.contains("secret"));
    }
}
