//! Error types for keygrant-codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// None of the supported token formats parsed.
    #[error("Unsupported token format: {0}")]
    UnsupportedFormat(String),

    /// A signature is present but does not verify.
    #[error("Invalid signature on {0}")]
    InvalidSignature(String),

    #[error("Broken proof chain: {0}")]
    BrokenChain(String),

    #[error("CBOR error: {0}")]
    Cbor(String),

    #[error(transparent)]
    Core(#[from] keygrant_core::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
