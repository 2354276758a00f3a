//! Unsigned JSON tokens written by older clients.
//!
//! `{"issuer", "audience", "capabilities": [{"resource", "action"}],
//! "expiration"?: unix seconds, "proofs"?: [cid]}`

use crate::archive::{DAG_JSON, cid_for};
use crate::delegation::Delegation;
use crate::{CodecError, Result};
use chrono::DateTime;
use keygrant_core::capability::{self, Capability};
use keygrant_core::signing::canonicalize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LegacyToken {
    issuer: String,
    audience: String,
    capabilities: Vec<LegacyCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiration: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    proofs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LegacyCapability {
    #[serde(alias = "with")]
    resource: String,
    #[serde(alias = "can")]
    action: String,
}

impl LegacyToken {
    pub(crate) fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| CodecError::UnsupportedFormat(format!("legacy JSON: {e}")))
    }

    pub(crate) fn into_delegation(self) -> Result<Delegation> {
        let capabilities = self
            .capabilities
            .into_iter()
            .map(|c| Capability::new(c.resource, c.action))
            .collect::<keygrant_core::Result<Vec<_>>>()?;
        if capabilities.is_empty() {
            return Err(keygrant_core::Error::InvalidCapability("capabilities are empty".into()).into());
        }

        let expires_at = match self.expiration {
            Some(secs) => Some(DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                CodecError::UnsupportedFormat(format!("expiration out of range: {secs}"))
            })?),
            None => None,
        };

        let mut delegation = Delegation {
            content_id: String::new(),
            issuer: self.issuer.parse()?,
            audience: self.audience.parse()?,
            capabilities: capability::normalize(capabilities),
            expires_at,
            issued_at: None,
            nonce: None,
            proofs: self.proofs,
            chain: None,
        };
        // Id over the normalized canonical form, so key and capability order do not matter.
        delegation.content_id = cid_for(DAG_JSON, &canonicalize(&Self::from_delegation(&delegation))?);
        Ok(delegation)
    }

    pub(crate) fn from_delegation(delegation: &Delegation) -> Self {
        Self {
            issuer: delegation.issuer.to_string(),
            audience: delegation.audience.to_string(),
            capabilities: delegation
                .capabilities
                .iter()
                .map(|c| LegacyCapability {
                    resource: c.resource.clone(),
                    action: c.action.clone(),
                })
                .collect(),
            expiration: delegation.expires_at.map(|t| t.timestamp()),
            proofs: delegation.proofs.clone(),
        }
    }
}
