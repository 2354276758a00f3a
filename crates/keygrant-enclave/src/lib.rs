//! Isolated signing core for keygrant.
//!
//! The core owns the wrapping key and the decrypted signing key. Callers
//! reach it only through [`Enclave`], an async handle that sends tagged
//! requests to a dedicated thread and awaits correlated replies. Decrypted
//! key material never crosses this boundary.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> keygrant_enclave::Result<()> {
//! use keygrant_enclave::Enclave;
//!
//! let enclave = Enclave::spawn()?;
//! enclave.initialize(b"hardware secret").await?;
//! let generated = enclave.generate_signing_identity().await?;
//! let signature = enclave.sign(b"payload").await?;
//! assert!(enclave.verify(b"payload", &signature).await?);
//! println!("{}", generated.identity.did);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod protocol;
pub mod service;
mod state;

pub use error::{EnclaveError, Result};
pub use protocol::{GeneratedIdentity, PublicIdentity};
pub use service::Enclave;
