//! Remote revocation registry for keygrant delegations.
//!
//! The registry is the source of truth for revocation. Clients ask it about
//! one delegation id at a time and submit signed revocation requests.
//!
//! - [`RevocationRegistry`]: the async seam the session depends on
//! - [`HttpRegistry`]: reqwest client with an explicit timeout and no retry
//! - [`MemoryRegistry`]: shared in-memory registry with an availability switch

pub mod client;
pub mod error;
pub mod memory;
pub mod protocol;

pub use client::{HttpRegistry, RegistryConfig, RevocationRegistry};
pub use error::{RegistryError, Result};
pub use memory::MemoryRegistry;
pub use protocol::{RevocationReceipt, RevocationRequest, RevocationStatus};
