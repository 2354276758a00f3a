//! Delegations as tracked by a session.

use chrono::{DateTime, Duration, Utc};
use keygrant_codec::{Decoded, Format, Verification};
use keygrant_core::{Capability, Did};
use serde::{Deserialize, Serialize};

use crate::error::{DelegationError, Result, Warning};

/// Requested lifetime of a new delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    #[default]
    Never,
    RelativeHours(u32),
}

impl Expiration {
    /// Absolute expiry for a delegation issued at `now`.
    ///
    /// Fails when the lifetime runs past the representable date range.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        match self {
            Self::Never => Ok(None),
            Self::RelativeHours(hours) => now
                .checked_add_signed(Duration::hours(i64::from(hours)))
                .map(Some)
                .ok_or_else(|| {
                    DelegationError::InvalidExpiration(format!("{hours} hours from {now}"))
                }),
        }
    }
}

/// Lifecycle state as of a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegationState {
    Active,
    Expired,
    Revoked,
}

/// A created or received delegation.
///
/// Everything except the `revoked*` fields is fixed once stored, and those
/// only move from not revoked to revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegation {
    pub content_id: String,
    pub issuer: Did,
    pub audience: Did,
    pub capabilities: Vec<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proofs: Vec<String>,
    /// The token as created or imported.
    pub token: String,

    #[serde(default)]
    pub revoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_by: Option<Did>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub format: Format,
    pub verification: Verification,
    #[serde(default)]
    pub did_mismatch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<DateTime<Utc>>,
}

impl Delegation {
    pub(crate) fn from_decoded(decoded: Decoded, token: String) -> Self {
        let Decoded {
            delegation,
            format,
            verification,
        } = decoded;
        Self {
            content_id: delegation.content_id,
            issuer: delegation.issuer,
            audience: delegation.audience,
            capabilities: delegation.capabilities,
            expires_at: delegation.expires_at,
            proofs: delegation.proofs,
            token,
            revoked: false,
            revoked_at: None,
            revoked_by: None,
            name: None,
            format,
            verification,
            did_mismatch: false,
            issued_at: delegation.issued_at,
            nonce: delegation.nonce,
            imported_at: None,
        }
    }

    /// `now > expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Local view of the state. Revoked wins over expired.
    pub fn state_at(&self, now: DateTime<Utc>) -> DelegationState {
        if self.revoked {
            DelegationState::Revoked
        } else if self.is_expired_at(now) {
            DelegationState::Expired
        } else {
            DelegationState::Active
        }
    }

    /// Whether `did` may revoke this delegation.
    pub fn is_party(&self, did: &Did) -> bool {
        &self.issuer == did || &self.audience == did
    }

    pub(crate) fn mark_revoked(&mut self, at: DateTime<Utc>, by: Option<Did>) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.revoked_at = Some(at);
        self.revoked_by = by;
        true
    }
}

/// Result of importing a token.
#[derive(Debug, Clone)]
pub struct Imported {
    pub delegation: Delegation,
    pub warnings: Vec<Warning>,
    /// False when the content id was already known and the stored record
    /// was kept.
    pub added: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiration_resolve() {
        let now = Utc::now();
        assert_eq!(Expiration::Never.resolve(now).unwrap(), None);
        assert_eq!(
            Expiration::RelativeHours(2).resolve(now).unwrap(),
            Some(now + Duration::hours(2))
        );
    }

    #[test]
    fn test_expiration_out_of_range() {
        assert!(matches!(
            Expiration::RelativeHours(u32::MAX).resolve(Utc::now()),
            Err(DelegationError::InvalidExpiration(_))
        ));
    }
}
