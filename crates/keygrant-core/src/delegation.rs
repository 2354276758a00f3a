//! Signed delegation payloads.
//!
//! A delegation grants capabilities from an issuer DID to an audience DID,
//! optionally until an expiry, chained to the parent delegations (`prf`) that
//! prove the issuer's own authority. The payload is signed over its CBOR
//! encoding; field order is fixed by the struct definition, which makes the
//! encoding canonical.

use crate::capability::{self, Capability};
use crate::{Did, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The unsigned body of a delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPayload {
    /// Issuer DID.
    pub iss: String,
    /// Audience DID.
    pub aud: String,
    /// Granted capabilities, sorted and deduplicated.
    pub att: Vec<Capability>,
    /// Expiry (unix seconds); `None` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Nonce making otherwise identical grants distinct.
    pub nnc: String,
    /// Content ids of parent delegations, in chain order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prf: Vec<String>,
}

impl DelegationPayload {
    /// Create a new payload issued now.
    pub fn new(
        issuer: &Did,
        audience: &Did,
        capabilities: Vec<Capability>,
        expires_at: Option<DateTime<Utc>>,
        proofs: Vec<String>,
    ) -> Result<Self> {
        let payload = Self {
            iss: issuer.to_string(),
            aud: audience.to_string(),
            att: capability::normalize(capabilities),
            exp: expires_at.map(|t| t.timestamp()),
            iat: Utc::now().timestamp(),
            nnc: Uuid::now_v7().to_string(),
            prf: proofs,
        };
        payload.validate_basic()?;
        Ok(payload)
    }

    /// Structural checks that do not need a clock or keys.
    pub fn validate_basic(&self) -> Result<()> {
        self.issuer()?;
        self.audience()?;
        if self.att.is_empty() {
            return Err(Error::InvalidCapability("capabilities are empty".into()));
        }
        for cap in &self.att {
            cap.check()?;
        }
        Ok(())
    }

    /// Bytes covered by the issuer's signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out).map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(out)
    }

    pub fn issuer(&self) -> Result<Did> {
        self.iss.parse()
    }

    pub fn audience(&self) -> Result<Did> {
        self.aud.parse()
    }

    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Issue time as a timestamp.
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// `now > exp`; a payload without expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp.is_some_and(|exp| now.timestamp() > exp)
    }

    /// Attach a signature.
    pub fn into_signed(self, signature: Vec<u8>) -> SignedPayload {
        SignedPayload {
            payload: self,
            sig: signature,
        }
    }
}

/// A payload with the issuer's Ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub payload: DelegationPayload,
    #[serde(with = "serde_bytes")]
    pub sig: Vec<u8>,
}

impl SignedPayload {
    /// Check the signature against the issuer's DID key.
    pub fn verify(&self) -> Result<()> {
        let issuer = self.payload.issuer()?;
        let message = self.payload.signing_bytes()?;
        issuer.verify(&message, &self.sig)
    }
}
