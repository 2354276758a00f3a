//! Format-neutral view of a decoded delegation.

use crate::archive::Chain;
use crate::base::Base;
use crate::Result;
use chrono::{DateTime, Utc};
use keygrant_core::{Capability, Did};
use serde::{Deserialize, Serialize};

/// How a token was encoded when it was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// Multibase `m` archive.
    #[serde(rename = "base64")]
    Base64,
    /// Multibase `u` archive.
    #[serde(rename = "base64url")]
    Base64Url,
    /// Archive without a multibase prefix.
    #[serde(rename = "raw")]
    Raw,
    /// Unsigned JSON from older clients.
    #[serde(rename = "legacy-json")]
    LegacyJson,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::Base64Url => "base64url",
            Self::Raw => "raw",
            Self::LegacyJson => "legacy-json",
        }
    }
}

impl From<Base> for Format {
    fn from(base: Base) -> Self {
        match base {
            Base::Base64 => Self::Base64,
            Base::Base64Url => Self::Base64Url,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of offline chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Verification {
    /// Every signature checked and every proof was embedded and linked.
    Verified,
    /// Nothing was found to be wrong, but something could not be checked.
    Unverified { reason: String },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// A delegation independent of its wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub content_id: String,
    pub issuer: Did,
    pub audience: Did,
    pub capabilities: Vec<Capability>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub nonce: Option<String>,
    /// Content ids of parent delegations.
    pub proofs: Vec<String>,
    /// The signed blocks, absent for legacy JSON.
    pub chain: Option<Chain>,
}

impl Delegation {
    /// Build the view of a signed chain. Signatures are not checked here.
    pub fn from_chain(chain: Chain) -> Result<Self> {
        let payload = &chain.root.payload;
        payload.validate_basic()?;
        Ok(Self {
            content_id: chain.content_id()?,
            issuer: payload.issuer()?,
            audience: payload.audience()?,
            capabilities: payload.att.clone(),
            expires_at: payload.expires_at(),
            issued_at: Some(payload.issued_at()),
            nonce: Some(payload.nnc.clone()),
            proofs: payload.prf.clone(),
            chain: Some(chain),
        })
    }

    /// `now > expires_at`; no expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    pub fn is_signed(&self) -> bool {
        self.chain.is_some()
    }
}
