//! # keygrant
//!
//! Hardware-bound signing identities and revocable capability delegation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn demo() -> keygrant::Result<()> {
//! use std::sync::Arc;
//! use keygrant::{MemoryRegistry, MemoryStore, Session, SessionConfig, SoftwareCredentialAdapter};
//!
//! let session = Session::open(
//!     &SoftwareCredentialAdapter::generate(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryRegistry::new()),
//!     SessionConfig::default(),
//! )
//! .await?;
//! println!("DID: {}", session.did());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`core`] - DIDs, keys, capabilities and signed payloads
//! - [`enclave`] - Isolated signing core
//! - [`codec`] - Token encoding, content ids and chain verification
//! - [`registry`] - Revocation registry client
//! - [`session`] - Sessions and the delegation lifecycle

pub use keygrant_codec as codec;
pub use keygrant_core as core;
pub use keygrant_enclave as enclave;
pub use keygrant_registry as registry;
pub use keygrant_session as session;

// Re-export common types at root
pub use keygrant_codec::{Base, Format};
pub use keygrant_core::{Capability, Did};
pub use keygrant_registry::{HttpRegistry, MemoryRegistry, RegistryConfig};
pub use keygrant_session::{
    Delegation, DelegationError, DelegationState, Expiration, FileStore, MemoryStore, Result,
    Session, SessionConfig, SoftwareCredentialAdapter, Warning,
};
