//! Request/response messages crossing the signing core boundary.
//!
//! One variant per operation. Nothing in an [`EnclaveResponse`] carries
//! private key material: identities leave the core as a DID plus public
//! key, and archives leave it sealed under the wrapping key.

use keygrant_core::{Did, SealedBox};
use std::fmt;
use zeroize::Zeroizing;

/// Operations understood by the signing core.
pub enum EnclaveRequest {
    /// Derive the wrapping key from a hardware secret.
    Initialize { secret: Zeroizing<Vec<u8>> },
    /// Generate a fresh identity, replacing any held one.
    GenerateIdentity,
    /// Unseal a stored archive and hold its key.
    LoadIdentity { archive: SealedBox },
    Encrypt { plaintext: Vec<u8> },
    Decrypt { sealed: SealedBox },
    Sign { payload: Vec<u8> },
    Verify { payload: Vec<u8>, signature: Vec<u8> },
    PublicIdentity,
    Shutdown,
}

impl EnclaveRequest {
    /// Operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::GenerateIdentity => "generate_identity",
            Self::LoadIdentity { .. } => "load_identity",
            Self::Encrypt { .. } => "encrypt",
            Self::Decrypt { .. } => "decrypt",
            Self::Sign { .. } => "sign",
            Self::Verify { .. } => "verify",
            Self::PublicIdentity => "public_identity",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Debug for EnclaveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnclaveRequest")
            .field("op", &self.name())
            .finish_non_exhaustive()
    }
}

/// Public half of the held identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIdentity {
    pub did: Did,
    pub public_key: [u8; 32],
}

/// A newly generated identity and its sealed archive.
#[derive(Debug, Clone)]
pub struct GeneratedIdentity {
    pub identity: PublicIdentity,
    pub archive: SealedBox,
}

/// Replies from the signing core, one per request variant.
#[derive(Debug)]
pub enum EnclaveResponse {
    Initialized,
    Generated(GeneratedIdentity),
    Loaded(PublicIdentity),
    Sealed(SealedBox),
    Plaintext(Vec<u8>),
    Signature(Vec<u8>),
    Verified(bool),
    Identity(Option<PublicIdentity>),
    ShutDown,
}

/// A request tagged with its correlation id.
pub(crate) struct Envelope {
    pub request_id: u64,
    pub request: EnclaveRequest,
    pub reply: tokio::sync::oneshot::Sender<Reply>,
}

/// A response tagged with the id of the request it answers.
#[derive(Debug)]
pub(crate) struct Reply {
    pub request_id: u64,
    pub result: keygrant_core::Result<EnclaveResponse>,
}
