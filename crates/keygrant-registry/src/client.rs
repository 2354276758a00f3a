//! The registry seam and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::protocol::{RevocationReceipt, RevocationRequest, RevocationStatus};
use crate::{RegistryError, Result};

/// Where revocation truth lives.
#[async_trait]
pub trait RevocationRegistry: Send + Sync {
    /// Look up whether `delegation_id` has been revoked.
    async fn status(&self, delegation_id: &str) -> Result<RevocationStatus>;

    /// Record a signed revocation. Re-submitting an already revoked id
    /// returns the existing receipt.
    async fn submit(&self, request: &RevocationRequest) -> Result<RevocationReceipt>;
}

/// Configuration for [`HttpRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    /// Per-request timeout. Requests are never retried.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8600".to_string(),
            timeout: Duration::from_secs(8),
            user_agent: concat!("keygrant/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RegistryConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Registry client speaking `GET /revocations/{id}` and `POST /`.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    base: Url,
    client: reqwest::Client,
}

impl HttpRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| RegistryError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(RegistryError::InvalidUrl(config.base_url));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn status_url(&self, delegation_id: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RegistryError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("revocations")
            .push(delegation_id);
        Ok(url)
    }
}

#[async_trait]
impl RevocationRegistry for HttpRegistry {
    async fn status(&self, delegation_id: &str) -> Result<RevocationStatus> {
        let url = self.status_url(delegation_id)?;
        debug!(delegation_id = %delegation_id, url = %url, "Querying revocation registry");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(RevocationStatus::NotRevoked),
            status if status.is_success() => {
                let receipt: RevocationReceipt = response
                    .json()
                    .await
                    .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
                if receipt.delegation_id != delegation_id {
                    return Err(RegistryError::InvalidResponse(format!(
                        "asked about {delegation_id}, answered about {}",
                        receipt.delegation_id
                    )));
                }
                Ok(RevocationStatus::Revoked(receipt))
            }
            status => Err(error_status(status, response).await),
        }
    }

    async fn submit(&self, request: &RevocationRequest) -> Result<RevocationReceipt> {
        debug!(delegation_id = %request.delegation_id, "Submitting revocation");

        let response = self
            .client
            .post(self.base.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_status(status, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))
    }
}

async fn error_status(status: StatusCode, response: reqwest::Response) -> RegistryError {
    RegistryError::Status {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url() {
        let registry = HttpRegistry::new(RegistryConfig::with_base_url("http://r.example")).unwrap();
        assert_eq!(
            registry.status_url("bafyabc").unwrap().as_str(),
            "http://r.example/revocations/bafyabc"
        );

        let nested =
            HttpRegistry::new(RegistryConfig::with_base_url("http://r.example/v1")).unwrap();
        assert_eq!(nested.base_url().as_str(), "http://r.example/v1/");
        assert_eq!(
            nested.status_url("bafyabc").unwrap().as_str(),
            "http://r.example/v1/revocations/bafyabc"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpRegistry::new(RegistryConfig::with_base_url("not a url")),
            Err(RegistryError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(RegistryConfig::default().timeout, Duration::from_secs(8));
    }
}
