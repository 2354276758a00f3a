//! Capabilities: (resource, action) pairs carried by delegations.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard matching any resource or any action.
pub const WILDCARD: &str = "*";

/// A permitted operation on a resource.
///
/// On the wire the resource is `with` and the action is `can`. Legacy JSON
/// tokens spell them `resource` and `action`, which are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "with", alias = "resource")]
    pub resource: String,
    #[serde(rename = "can", alias = "action")]
    pub action: String,
}

impl Capability {
    /// Create a capability, rejecting empty parts.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Result<Self> {
        let cap = Self {
            resource: resource.into(),
            action: action.into(),
        };
        cap.check()?;
        Ok(cap)
    }

    /// Reject empty or whitespace-only parts.
    pub fn check(&self) -> Result<()> {
        if self.resource.trim().is_empty() {
            return Err(Error::InvalidCapability("resource is empty".into()));
        }
        if self.action.trim().is_empty() {
            return Err(Error::InvalidCapability("action is empty".into()));
        }
        Ok(())
    }

    /// Whether holding `self` is enough to grant `other`.
    ///
    /// Resources match exactly or through `*`. Actions match exactly,
    /// through `*`, or through a namespace wildcard such as `space/*`.
    pub fn covers(&self, other: &Capability) -> bool {
        let resource_ok = self.resource == WILDCARD || self.resource == other.resource;
        let action_ok = self.action == WILDCARD
            || self.action == other.action
            || self
                .action
                .strip_suffix(WILDCARD)
                .is_some_and(|ns| ns.ends_with('/') && other.action.starts_with(ns));
        resource_ok && action_ok
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.action, self.resource)
    }
}

/// Sort and deduplicate, giving capability lists set semantics.
pub fn normalize(mut capabilities: Vec<Capability>) -> Vec<Capability> {
    capabilities.sort();
    capabilities.dedup();
    capabilities
}

/// Capabilities in `requested` that no entry of `held` covers.
pub fn uncovered<'a>(held: &[Capability], requested: &'a [Capability]) -> Vec<&'a Capability> {
    requested
        .iter()
        .filter(|want| !held.iter().any(|have| have.covers(want)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(resource: &str, action: &str) -> Capability {
        Capability::new(resource, action).unwrap()
    }

    #[test]
    fn test_exact_match() {
        assert!(cap("did:key:zA", "upload").covers(&cap("did:key:zA", "upload")));
        assert!(!cap("did:key:zA", "upload").covers(&cap("did:key:zA", "list")));
        assert!(!cap("did:key:zA", "upload").covers(&cap("did:key:zB", "upload")));
    }

    #[test]
    fn test_wildcards() {
        assert!(cap("*", "upload").covers(&cap("did:key:zA", "upload")));
        assert!(cap("did:key:zA", "*").covers(&cap("did:key:zA", "space/blob/add")));
        assert!(cap("did:key:zA", "space/*").covers(&cap("did:key:zA", "space/blob/add")));
        assert!(!cap("did:key:zA", "space/*").covers(&cap("did:key:zA", "store/add")));
        // A bare trailing "*" without a namespace separator is not a prefix match.
        assert!(!cap("did:key:zA", "up*").covers(&cap("did:key:zA", "upload")));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(Capability::new("", "upload").is_err());
        assert!(Capability::new("did:key:zA", "  ").is_err());
    }

    #[test]
    fn test_normalize_and_uncovered() {
        let caps = normalize(vec![
            cap("r", "list"),
            cap("r", "upload"),
            cap("r", "list"),
        ]);
        assert_eq!(caps, vec![cap("r", "list"), cap("r", "upload")]);

        let held = vec![cap("r", "upload")];
        let missing = uncovered(&held, &caps);
        assert_eq!(missing, vec![&cap("r", "list")]);
    }

    #[test]
    fn test_legacy_aliases() {
        let c: Capability =
            serde_json::from_str(r#"{"resource":"did:key:zA","action":"upload"}"#).unwrap();
        assert_eq!(c, cap("did:key:zA", "upload"));
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"with":"did:key:zA","can":"upload"}"#);
    }
}
