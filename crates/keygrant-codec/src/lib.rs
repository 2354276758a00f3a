//! Delegation token codec.
//!
//! Tokens are multibase text over a CBOR archive that embeds the signed
//! delegation and its proofs. Decoding also accepts unprefixed archives and
//! the unsigned legacy JSON form, and reports which one it saw.
//!
//! ```
//! # fn main() -> keygrant_codec::Result<()> {
//! use keygrant_codec::{Chain, Delegation, Format, decode, encode};
//! use keygrant_core::{Capability, DelegationPayload, IdentityKey};
//!
//! let alice = IdentityKey::generate();
//! let bob = IdentityKey::generate();
//! let payload = DelegationPayload::new(
//!     &alice.did(),
//!     &bob.did(),
//!     vec![Capability::new(alice.did().to_string(), "upload")?],
//!     None,
//!     vec![],
//! )?;
//! let sig = alice.sign(&payload.signing_bytes()?).to_bytes().to_vec();
//! let delegation = Delegation::from_chain(Chain::new(payload.into_signed(sig), vec![]))?;
//!
//! let token = encode(&delegation)?;
//! assert!(token.starts_with('m'));
//! let decoded = decode(&token)?;
//! assert_eq!(decoded.format, Format::Base64);
//! assert_eq!(decoded.delegation, delegation);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod base;
pub mod delegation;
pub mod error;
mod legacy;
pub mod token;
pub mod verify;

pub use archive::{Chain, content_id};
pub use base::Base;
pub use delegation::{Delegation, Format, Verification};
pub use error::{CodecError, Result};
pub use token::{Decoded, decode, decode_bytes, encode, encode_legacy, encode_with};
