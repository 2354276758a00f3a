//! # keygrant-core
//!
//! Core identity primitives for keygrant.
//!
//! This crate provides:
//! - HKDF wrapping-key derivation and ChaCha20-Poly1305 sealing
//! - Ed25519 signing identities and their self-describing archives
//! - `did:key` creation and parsing
//! - Capabilities and signed delegation payloads
//! - JCS canonicalization for signed JSON requests

pub mod capability;
pub mod crypto;
pub mod delegation;
pub mod did;
pub mod error;
pub mod keys;
pub mod signing;

pub use capability::Capability;
pub use crypto::{SealedBox, WrappingKey};
pub use delegation::{DelegationPayload, SignedPayload};
pub use did::Did;
pub use error::Error;
pub use keys::{IdentityKey, KeyArchive};

/// Result type for keygrant-core operations.
pub type Result<T> = std::result::Result<T, Error>;
