//! Error and warning types for sessions and the delegation lifecycle.

use chrono::{DateTime, Utc};
use keygrant_codec::CodecError;
use keygrant_core::Did;
use keygrant_enclave::EnclaveError;
use keygrant_registry::RegistryError;
use thiserror::Error;

/// Errors from delegation operations.
#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("Delegation {id} expired at {expired_at}")]
    Expired {
        id: String,
        expired_at: DateTime<Utc>,
    },

    #[error("Delegation {id} has been revoked")]
    Revoked {
        id: String,
        revoked_at: Option<DateTime<Utc>>,
        revoked_by: Option<Did>,
    },

    #[error(transparent)]
    Revocation(#[from] RevocationError),

    #[error("Unsupported token format: {0}")]
    UnsupportedFormat(String),

    #[error("No signing identity: {0}")]
    NotInitialized(String),

    #[error("Capability escalation: {0}")]
    CapabilityEscalation(String),

    #[error("Expiration out of range: {0}")]
    InvalidExpiration(String),

    #[error("Delegation not found: {0}")]
    NotFound(String),

    #[error("Token error: {0}")]
    Codec(CodecError),

    #[error("Signing core error: {0}")]
    Enclave(EnclaveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Core(#[from] keygrant_core::Error),
}

impl From<CodecError> for DelegationError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::UnsupportedFormat(reason) => Self::UnsupportedFormat(reason),
            other => Self::Codec(other),
        }
    }
}

impl From<EnclaveError> for DelegationError {
    fn from(e: EnclaveError) -> Self {
        if e.is_not_initialized() {
            Self::NotInitialized(e.to_string())
        } else {
            Self::Enclave(e)
        }
    }
}

/// Errors from `revoke`.
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("Delegation not found: {0}")]
    NotFound(String),

    #[error("{caller} may not revoke {id}: only its issuer or audience can")]
    Unauthorized { id: String, caller: Did },

    #[error("Registry did not accept the revocation: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors from a persistent store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store key: {0}")]
    InvalidKey(String),

    #[error("Corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Errors from a hardware credential adapter.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential not recognized: {0}")]
    UnknownCredential(String),

    #[error("Credential ceremony cancelled")]
    Cancelled,

    #[error("Authenticator unavailable: {0}")]
    Unavailable(String),

    #[error("Credential key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Non-fatal conditions reported alongside a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The delegation is addressed to another DID than the session's.
    DidMismatch { expected: Did, actual: Did },
    /// The token used the unsigned legacy JSON form.
    LegacyFormat,
    /// The proof chain could not be fully checked offline.
    Unverified { reason: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DidMismatch { expected, actual } => {
                write!(f, "delegation is addressed to {actual}, not {expected}")
            }
            Self::LegacyFormat => f.write_str("token uses the unsigned legacy JSON format"),
            Self::Unverified { reason } => write!(f, "delegation is unverified: {reason}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, DelegationError>;
