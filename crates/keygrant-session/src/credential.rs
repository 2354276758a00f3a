//! Hardware credential adapters.
//!
//! A credential yields a high-entropy secret on every successful
//! authentication ceremony. The secret is what the signing core derives its
//! wrapping key from; it is never persisted and is zeroized on drop.

use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hkdf::Hkdf;
use keygrant_core::IdentityKey;
use keygrant_core::crypto::random_bytes;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::CredentialError;

pub type Result<T> = std::result::Result<T, CredentialError>;

const CREDENTIAL_ID_INFO: &[u8] = b"keygrant/software-credential/id/v1";
const CREDENTIAL_KEY_INFO: &[u8] = b"keygrant/software-credential/key/v1";
const PRF_INFO: &[u8] = b"keygrant/software-credential/prf/v1";

/// Secret released by a credential ceremony.
#[derive(Clone)]
pub struct CredentialSecret(Zeroizing<Vec<u8>>);

impl CredentialSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CredentialSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSecret").finish_non_exhaustive()
    }
}

/// A credential as returned by registration.
#[derive(Debug, Clone)]
pub struct HardwareCredential {
    /// Opaque credential id; safe to persist.
    pub id: String,
    pub public_key: Vec<u8>,
    pub secret: CredentialSecret,
}

/// Platform authenticator seam.
#[async_trait]
pub trait CredentialAdapter: Send + Sync {
    /// Return this device's credential, registering one if needed.
    async fn get_or_create_credential(&self) -> Result<HardwareCredential>;

    /// Run an authentication ceremony for a known credential id.
    async fn authenticate(&self, credential_id: &str) -> Result<CredentialSecret>;
}

/// How the software adapter produces secrets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecretMode {
    /// Keyed derivation over the credential id, standing in for a PRF
    /// extension.
    #[default]
    Prf,
    /// The raw credential id, as authenticators without PRF support give.
    Fallback,
}

/// Authenticator emulated in software from a 32-byte device key.
///
/// Each device key has exactly one credential, whose id and public key are
/// derived from it. Useful for tests and hosts without an authenticator.
pub struct SoftwareCredentialAdapter {
    device_key: Zeroizing<[u8; 32]>,
    mode: SecretMode,
}

impl fmt::Debug for SoftwareCredentialAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareCredentialAdapter")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SoftwareCredentialAdapter {
    pub fn new(device_key: [u8; 32]) -> Self {
        Self {
            device_key: Zeroizing::new(device_key),
            mode: SecretMode::Prf,
        }
    }

    /// An adapter with a fresh random device key.
    pub fn generate() -> Self {
        Self::new(random_bytes())
    }

    pub fn with_mode(mut self, mode: SecretMode) -> Self {
        self.mode = mode;
        self
    }

    /// The credential id this adapter answers to.
    pub fn credential_id(&self) -> Result<String> {
        let mut id = [0u8; 16];
        self.expand(None, CREDENTIAL_ID_INFO, &mut id)?;
        Ok(URL_SAFE_NO_PAD.encode(id))
    }

    fn public_key(&self) -> Result<Vec<u8>> {
        let mut seed = Zeroizing::new([0u8; 32]);
        self.expand(None, CREDENTIAL_KEY_INFO, &mut seed[..])?;
        Ok(IdentityKey::from_bytes(&seed).verifying_key().to_bytes().to_vec())
    }

    fn secret_for(&self, credential_id: &str) -> Result<CredentialSecret> {
        match self.mode {
            SecretMode::Prf => {
                let mut out = Zeroizing::new(vec![0u8; 32]);
                self.expand(Some(credential_id.as_bytes()), PRF_INFO, &mut out[..])?;
                Ok(CredentialSecret(out))
            }
            SecretMode::Fallback => Ok(CredentialSecret::new(credential_id.as_bytes().to_vec())),
        }
    }

    fn expand(&self, salt: Option<&[u8]>, info: &[u8], out: &mut [u8]) -> Result<()> {
        Hkdf::<Sha256>::new(salt, &self.device_key[..])
            .expand(info, out)
            .map_err(|e| CredentialError::KeyDerivation(e.to_string()))
    }
}

#[async_trait]
impl CredentialAdapter for SoftwareCredentialAdapter {
    async fn get_or_create_credential(&self) -> Result<HardwareCredential> {
        let id = self.credential_id()?;
        debug!(credential_id = %id, mode = ?self.mode, "Software credential ready");
        Ok(HardwareCredential {
            public_key: self.public_key()?,
            secret: self.secret_for(&id)?,
            id,
        })
    }

    async fn authenticate(&self, credential_id: &str) -> Result<CredentialSecret> {
        if credential_id != self.credential_id()? {
            return Err(CredentialError::UnknownCredential(credential_id.to_string()));
        }
        self.secret_for(credential_id)
    }
}
