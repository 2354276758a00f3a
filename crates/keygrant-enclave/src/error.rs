//! Error types for the signing core boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnclaveError {
    /// A cryptographic failure inside the core, passed through unchanged.
    #[error(transparent)]
    Core(#[from] keygrant_core::Error),

    #[error("Signing core unavailable (shut down or crashed)")]
    Unavailable,

    #[error("Signing core protocol violation: {0}")]
    Protocol(String),
}

impl EnclaveError {
    /// Whether this is the core's "not initialized" sequencing error.
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::Core(keygrant_core::Error::NotInitialized(_)))
    }
}

pub type Result<T> = std::result::Result<T, EnclaveError>;
