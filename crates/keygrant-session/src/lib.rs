//! Sessions and the delegation lifecycle for keygrant.
//!
//! A [`Session`] authenticates a hardware credential, unlocks the signing
//! identity inside the signing core and exposes a [`DelegationManager`]
//! for creating, importing, validating and revoking delegations.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> keygrant_session::Result<()> {
//! use std::sync::Arc;
//! use keygrant_core::Capability;
//! use keygrant_registry::MemoryRegistry;
//! use keygrant_session::{Expiration, MemoryStore, Session, SessionConfig, SoftwareCredentialAdapter};
//!
//! let registry = Arc::new(MemoryRegistry::new());
//! let alice = Session::open(
//!     &SoftwareCredentialAdapter::generate(),
//!     Arc::new(MemoryStore::new()),
//!     registry.clone(),
//!     SessionConfig::default(),
//! )
//! .await?;
//! let bob = Session::open(
//!     &SoftwareCredentialAdapter::generate(),
//!     Arc::new(MemoryStore::new()),
//!     registry,
//!     SessionConfig::default(),
//! )
//! .await?;
//!
//! let me = alice.did().to_string();
//! let grant = alice
//!     .delegations()
//!     .create(bob.did(), vec![Capability::new(&me, "upload")?], Expiration::Never, &[])
//!     .await?;
//! let imported = bob.delegations().import(&grant.token, None).await?;
//! bob.delegations().validate(&imported.delegation).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod credential;
pub mod error;
pub mod manager;
pub mod record;
pub mod session;
pub mod store;

pub use cache::{RevocationCache, RevocationCacheEntry};
pub use config::SessionConfig;
pub use credential::{
    CredentialAdapter, CredentialSecret, HardwareCredential, SecretMode, SoftwareCredentialAdapter,
};
pub use error::{
    CredentialError, DelegationError, Result, RevocationError, StoreError, Warning,
};
pub use manager::DelegationManager;
pub use record::{Delegation, DelegationState, Expiration, Imported};
pub use session::Session;
pub use store::{FileStore, KeyValueStore, MemoryStore};
