//! Error types for keygrant-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Decryption failed: authentication tag mismatch (wrong key or tampered data)")]
    Decryption,

    #[error("Signing core not initialized: {0}")]
    NotInitialized(&'static str),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Invalid DID format: {0}")]
    InvalidDid(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid capability: {0}")]
    InvalidCapability(String),

    #[error("Invalid key archive: {0}")]
    InvalidArchive(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Encoding(String),

    #[error("Invalid base58 encoding: {0}")]
    Base58(String),
}
