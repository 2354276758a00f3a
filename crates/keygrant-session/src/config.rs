//! Session configuration.

use std::time::Duration;

use keygrant_codec::Base;
use keygrant_registry::RegistryConfig;

/// Tunables for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a "not revoked" answer from the registry is trusted.
    pub revocation_ttl: Duration,
    /// Timeout for registry requests made by HTTP registries built from
    /// this config.
    pub registry_timeout: Duration,
    /// Multibase used for newly created tokens.
    pub default_base: Base,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            revocation_ttl: Duration::from_secs(5 * 60),
            registry_timeout: Duration::from_secs(8),
            default_base: Base::Base64,
        }
    }
}

impl SessionConfig {
    /// Registry client settings for `base_url` with this config's timeout.
    pub fn registry_config(&self, base_url: impl Into<String>) -> RegistryConfig {
        RegistryConfig {
            base_url: base_url.into(),
            timeout: self.registry_timeout,
            ..Default::default()
        }
    }
}
