//! `did:key` identifiers for Ed25519 signing identities.
//!
//! A keygrant identity is self-certifying: the DID is a pure function of the
//! Ed25519 public key, so anyone holding the DID can check signatures made
//! by the identity without a resolver round-trip.
//!
//! Text form: `did:key:z` followed by base58btc of the two-byte Ed25519
//! multicodec tag and the 32-byte public key.

use crate::{Error, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const METHOD: &str = "did:key:";
const MULTIBASE_BASE58BTC: char = 'z';
/// Unsigned varint of multicodec 0xed (ed25519-pub).
const ED25519_PUB: [u8; 2] = [0xed, 0x01];

/// An Ed25519 `did:key` identifier.
///
/// Holds only the public key; the point is checked on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Did {
    public_key: [u8; 32],
}

impl Did {
    pub fn new(public_key: VerifyingKey) -> Self {
        Self {
            public_key: public_key.to_bytes(),
        }
    }

    /// Build from raw key bytes. Fails unless they are 32 bytes forming a
    /// valid curve point.
    pub fn from_public_key_bytes(bytes: &[u8]) -> Result<Self> {
        let Ok(public_key) = <[u8; 32]>::try_from(bytes) else {
            return Err(Error::InvalidDid(format!(
                "Ed25519 keys are 32 bytes, not {}",
                bytes.len()
            )));
        };
        VerifyingKey::from_bytes(&public_key)
            .map_err(|e| Error::InvalidDid(format!("not an Ed25519 point: {e}")))?;
        Ok(Self { public_key })
    }

    pub fn public_key_bytes(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub fn public_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.public_key).map_err(|e| Error::InvalidDid(e.to_string()))
    }

    /// Check a detached signature made by this identity.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::from_slice(signature).map_err(|_| Error::InvalidSignature)?;
        self.public_key()?
            .verify(message, &signature)
            .map_err(|_| Error::InvalidSignature)
    }

    /// The method-specific id: `z` plus base58btc of tag and key.
    pub fn key_id(&self) -> String {
        let tagged: Vec<u8> = ED25519_PUB.iter().chain(&self.public_key).copied().collect();
        let mut id = String::with_capacity(50);
        id.push(MULTIBASE_BASE58BTC);
        id.push_str(&bs58::encode(tagged).into_string());
        id
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(METHOD)?;
        f.write_str(&self.key_id())
    }
}

impl FromStr for Did {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some(id) = s.strip_prefix(METHOD) else {
            return Err(Error::InvalidDid(format!("not a did:key identifier: {s:?}")));
        };
        let Some(encoded) = id.strip_prefix(MULTIBASE_BASE58BTC) else {
            return Err(Error::InvalidDid(
                "did:key ids must be base58btc ('z' multibase)".into(),
            ));
        };

        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| Error::Base58(e.to_string()))?;

        match decoded.strip_prefix(&ED25519_PUB[..]) {
            Some(key) => Self::from_public_key_bytes(key),
            None => Err(Error::InvalidDid(
                "only Ed25519 did:key identifiers are supported".into(),
            )),
        }
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn fresh() -> (SigningKey, Did) {
        let key = SigningKey::generate(&mut OsRng);
        let did = Did::new(key.verifying_key());
        (key, did)
    }

    #[test]
    fn test_text_form() {
        let (_, did) = fresh();
        let text = did.to_string();
        assert!(text.starts_with("did:key:z6Mk"), "got: {text}");
        assert_eq!(text.parse::<Did>().unwrap(), did);
    }

    #[test]
    fn test_w3c_vector() {
        let text = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK";
        assert_eq!(text.parse::<Did>().unwrap().to_string(), text);
    }

    #[test]
    fn test_rejects_other_forms() {
        for text in [
            "did:web:example.com",
            "did:key:f6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK",
            "did:key:z0OIl",
            "did:key:z",
        ] {
            assert!(text.parse::<Did>().is_err(), "{text}");
        }
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(matches!(
            Did::from_public_key_bytes(&[7u8; 31]),
            Err(Error::InvalidDid(_))
        ));
    }

    #[test]
    fn test_verify() {
        let (key, did) = fresh();
        let sig = key.sign(b"grant").to_bytes();

        did.verify(b"grant", &sig).unwrap();
        assert!(matches!(did.verify(b"other", &sig), Err(Error::InvalidSignature)));
        assert!(matches!(did.verify(b"grant", &sig[..12]), Err(Error::InvalidSignature)));
    }

    #[test]
    fn test_serde_string() {
        let (_, did) = fresh();
        let json = serde_json::to_value(&did).unwrap();
        assert_eq!(json, serde_json::Value::String(did.to_string()));
        assert_eq!(serde_json::from_value::<Did>(json).unwrap(), did);
    }
}
