//! Error types for keygrant-registry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry could not be reached (connection, timeout, offline).
    #[error("Registry unreachable: {0}")]
    Network(String),

    #[error("Registry returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),

    #[error("Invalid registry URL: {0}")]
    InvalidUrl(String),

    /// The request is malformed or its signature does not verify.
    #[error("Invalid revocation request: {0}")]
    InvalidRequest(String),

    /// The signer is neither issuer nor audience of the delegation.
    #[error("Not authorized to revoke: {0}")]
    Unauthorized(String),
}

impl RegistryError {
    /// Failures where the registry never gave an answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
