//! Revocation messages exchanged with a registry.
//!
//! A request is signed by the revoker over the canonical JSON form of the
//! request without its `signature` field (sorted keys, no whitespace).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use keygrant_codec::Delegation;
use keygrant_core::Did;
use keygrant_core::signing::canonicalize_without;
use serde::{Deserialize, Serialize};

use crate::{RegistryError, Result};

/// Value of the `type` field.
pub const REQUEST_TYPE: &str = "DelegationRevocation";

/// Current request version.
pub const REQUEST_VERSION: &str = "1";

/// A signed request to revoke one delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub delegation_id: String,
    /// The encoded delegation, so the registry can check who may revoke it.
    pub token: String,
    pub revoked_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub effective_at: DateTime<Utc>,
    /// Base64 Ed25519 signature; empty until signed.
    #[serde(default)]
    pub signature: String,
}

impl RevocationRequest {
    /// An unsigned request effective now.
    pub fn new(
        delegation_id: impl Into<String>,
        token: impl Into<String>,
        revoked_by: &Did,
        reason: Option<String>,
    ) -> Self {
        Self {
            kind: REQUEST_TYPE.to_string(),
            version: REQUEST_VERSION.to_string(),
            delegation_id: delegation_id.into(),
            token: token.into(),
            revoked_by: revoked_by.to_string(),
            reason,
            effective_at: Utc::now(),
            signature: String::new(),
        }
    }

    /// Bytes the revoker signs.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        canonicalize_without(self, "signature")
            .map_err(|e| RegistryError::InvalidRequest(e.to_string()))
    }

    pub fn with_signature(mut self, signature: &[u8]) -> Self {
        self.signature = STANDARD.encode(signature);
        self
    }

    /// Check the request as a registry must before recording it.
    ///
    /// Returns the decoded delegation on success.
    pub fn check(&self) -> Result<Delegation> {
        if self.kind != REQUEST_TYPE {
            return Err(RegistryError::InvalidRequest(format!(
                "unexpected type {}",
                self.kind
            )));
        }
        if self.version != REQUEST_VERSION {
            return Err(RegistryError::InvalidRequest(format!(
                "unsupported version {}",
                self.version
            )));
        }

        let revoker: Did = self
            .revoked_by
            .parse()
            .map_err(|e: keygrant_core::Error| RegistryError::InvalidRequest(e.to_string()))?;
        let signature = STANDARD
            .decode(&self.signature)
            .map_err(|e| RegistryError::InvalidRequest(format!("signature encoding: {e}")))?;
        revoker
            .verify(&self.signing_bytes()?, &signature)
            .map_err(|_| RegistryError::InvalidRequest("signature does not verify".into()))?;

        let delegation = keygrant_codec::decode(&self.token)
            .map_err(|e| RegistryError::InvalidRequest(format!("token: {e}")))?
            .delegation;
        if delegation.content_id != self.delegation_id {
            return Err(RegistryError::InvalidRequest(format!(
                "token content id {} does not match {}",
                delegation.content_id, self.delegation_id
            )));
        }
        if revoker != delegation.issuer && revoker != delegation.audience {
            return Err(RegistryError::Unauthorized(format!(
                "{revoker} is neither issuer nor audience"
            )));
        }
        Ok(delegation)
    }
}

/// What a registry knows about a revoked delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationReceipt {
    pub delegation_id: String,
    pub revoked_by: String,
    pub revoked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RevocationReceipt {
    pub fn from_request(request: &RevocationRequest) -> Self {
        Self {
            delegation_id: request.delegation_id.clone(),
            revoked_by: request.revoked_by.clone(),
            revoked_at: request.effective_at,
            reason: request.reason.clone(),
        }
    }
}

/// Answer to a status lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    NotRevoked,
    Revoked(RevocationReceipt),
}

impl RevocationStatus {
    pub fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygrant_codec::Chain;
    use keygrant_core::{Capability, DelegationPayload, IdentityKey};

    fn grant(issuer: &IdentityKey, audience: &Did) -> (String, String) {
        let me = issuer.did().to_string();
        let payload = DelegationPayload::new(
            &issuer.did(),
            audience,
            vec![Capability::new(&me, "upload").unwrap()],
            None,
            vec![],
        )
        .unwrap();
        let sig = issuer.sign(&payload.signing_bytes().unwrap()).to_bytes().to_vec();
        let delegation =
            Delegation::from_chain(Chain::new(payload.into_signed(sig), vec![])).unwrap();
        (
            delegation.content_id.clone(),
            keygrant_codec::encode(&delegation).unwrap(),
        )
    }

    fn signed_by(key: &IdentityKey, id: &str, token: &str) -> RevocationRequest {
        let request = RevocationRequest::new(id, token, &key.did(), Some("rotated".into()));
        let sig = key.sign(&request.signing_bytes().unwrap()).to_bytes();
        request.with_signature(&sig)
    }

    #[test]
    fn test_wire_field_names() {
        let key = IdentityKey::generate();
        let request = RevocationRequest::new("bafyid", "mtoken", &key.did(), None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "DelegationRevocation");
        assert_eq!(json["delegationId"], "bafyid");
        assert_eq!(json["revokedBy"], key.did().to_string());
        assert!(json.get("effectiveAt").is_some());
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_signing_bytes_exclude_signature() {
        let key = IdentityKey::generate();
        let request = RevocationRequest::new("bafyid", "mtoken", &key.did(), None);
        let before = request.signing_bytes().unwrap();
        let after = request.with_signature(&[7u8; 64]).signing_bytes().unwrap();
        assert_eq!(before, after);
        assert!(!String::from_utf8(before).unwrap().contains("signature"));
    }

    #[test]
    fn test_issuer_and_audience_may_revoke() {
        let alice = IdentityKey::generate();
        let bob = IdentityKey::generate();
        let (id, token) = grant(&alice, &bob.did());

        assert!(signed_by(&alice, &id, &token).check().is_ok());
        assert!(signed_by(&bob, &id, &token).check().is_ok());
    }

    #[test]
    fn test_third_party_unauthorized() {
        let alice = IdentityKey::generate();
        let bob = IdentityKey::generate();
        let mallory = IdentityKey::generate();
        let (id, token) = grant(&alice, &bob.did());

        assert!(matches!(
            signed_by(&mallory, &id, &token).check(),
            Err(RegistryError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_forged_signature_rejected() {
        let alice = IdentityKey::generate();
        let mallory = IdentityKey::generate();
        let (id, token) = grant(&alice, &IdentityKey::generate().did());

        // Claims to be alice but signs with another key.
        let request = RevocationRequest::new(&id, &token, &alice.did(), None);
        let sig = mallory.sign(&request.signing_bytes().unwrap()).to_bytes();
        assert!(matches!(
            request.with_signature(&sig).check(),
            Err(RegistryError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_content_id_must_match_token() {
        let alice = IdentityKey::generate();
        let (_, token) = grant(&alice, &IdentityKey::generate().did());
        assert!(matches!(
            signed_by(&alice, "bafyother", &token).check(),
            Err(RegistryError::InvalidRequest(_))
        ));
    }
}
