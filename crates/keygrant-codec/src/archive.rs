//! The binary delegation archive and content addressing.
//!
//! An archive is a CBOR document holding the root signed payload and the
//! signed payloads of every proof it depends on, so a chain can be checked
//! without fetching anything.

use crate::{CodecError, Result};
use cid::Cid;
use keygrant_core::SignedPayload;
use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};

/// Version tag written into every archive.
pub const ARCHIVE_VERSION: &str = "keygrant/delegation@1";

/// Multicodec for DAG-CBOR content.
pub const DAG_CBOR: u64 = 0x71;

/// Multicodec for DAG-JSON content.
pub const DAG_JSON: u64 = 0x0129;

/// A signed delegation together with its embedded proofs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub root: SignedPayload,
    pub proofs: Vec<SignedPayload>,
}

#[derive(Serialize, Deserialize)]
struct Archive {
    v: String,
    root: SignedPayload,
    #[serde(default)]
    proofs: Vec<SignedPayload>,
}

impl Chain {
    pub fn new(root: SignedPayload, proofs: Vec<SignedPayload>) -> Self {
        Self { root, proofs }
    }

    /// Serialize as an archive.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let archive = Archive {
            v: ARCHIVE_VERSION.to_string(),
            root: self.root.clone(),
            proofs: self.proofs.clone(),
        };
        let mut out = Vec::new();
        ciborium::ser::into_writer(&archive, &mut out).map_err(|e| CodecError::Cbor(e.to_string()))?;
        Ok(out)
    }

    /// Parse an archive, rejecting unknown versions.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let archive: Archive =
            ciborium::de::from_reader(bytes).map_err(|e| CodecError::Cbor(e.to_string()))?;
        if archive.v != ARCHIVE_VERSION {
            return Err(CodecError::UnsupportedFormat(format!(
                "archive version {}",
                archive.v
            )));
        }
        Ok(Self {
            root: archive.root,
            proofs: archive.proofs,
        })
    }

    /// Content id of the root delegation.
    pub fn content_id(&self) -> Result<String> {
        content_id(&self.root)
    }
}

/// CIDv1 (dag-cbor, sha2-256) of a signed payload.
///
/// The nonce and issue time are part of the signed payload, so two grants
/// with identical capabilities still get distinct ids.
pub fn content_id(signed: &SignedPayload) -> Result<String> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(signed, &mut bytes).map_err(|e| CodecError::Cbor(e.to_string()))?;
    Ok(cid_for(DAG_CBOR, &bytes))
}

pub(crate) fn cid_for(codec: u64, bytes: &[u8]) -> String {
    Cid::new_v1(codec, Code::Sha2_256.digest(bytes)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygrant_core::{Capability, DelegationPayload, IdentityKey};

    fn signed(issuer: &IdentityKey) -> SignedPayload {
        let did = issuer.did();
        let payload = DelegationPayload::new(
            &did,
            &IdentityKey::generate().did(),
            vec![Capability::new(did.to_string(), "upload").unwrap()],
            None,
            vec![],
        )
        .unwrap();
        let sig = issuer.sign(&payload.signing_bytes().unwrap()).to_bytes().to_vec();
        payload.into_signed(sig)
    }

    #[test]
    fn test_content_id_is_cidv1_dag_cbor() {
        let key = IdentityKey::generate();
        let id = content_id(&signed(&key)).unwrap();
        assert!(id.starts_with("bafy"), "{id}");

        let parsed: Cid = id.parse().unwrap();
        assert_eq!(parsed.codec(), DAG_CBOR);
        assert_eq!(parsed.hash().code(), 0x12);
    }

    #[test]
    fn test_same_grant_different_nonce_is_distinct() {
        let key = IdentityKey::generate();
        let a = signed(&key);
        let mut b = a.clone();
        b.payload.nnc = "another-nonce".into();
        assert_ne!(content_id(&a).unwrap(), content_id(&b).unwrap());
        assert_eq!(content_id(&a).unwrap(), content_id(&a.clone()).unwrap());
    }

    #[test]
    fn test_archive_round_trip() {
        let key = IdentityKey::generate();
        let chain = Chain::new(signed(&key), vec![signed(&key)]);
        let bytes = chain.to_cbor().unwrap();
        assert_eq!(Chain::from_cbor(&bytes).unwrap(), chain);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let key = IdentityKey::generate();
        let archive = Archive {
            v: "keygrant/delegation@9".into(),
            root: signed(&key),
            proofs: vec![],
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&archive, &mut bytes).unwrap();
        assert!(matches!(
            Chain::from_cbor(&bytes),
            Err(CodecError::UnsupportedFormat(_))
        ));
    }
}
