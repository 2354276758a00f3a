//! In-process registry for tests and offline use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::info;

use crate::client::RevocationRegistry;
use crate::protocol::{RevocationReceipt, RevocationRequest, RevocationStatus};
use crate::{RegistryError, Result};

/// A registry held in memory. Clones share state, so several sessions can
/// observe each other's revocations.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    revoked: Mutex<HashMap<String, RevocationReceipt>>,
    available: AtomicBool,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                revoked: Mutex::new(HashMap::new()),
                available: AtomicBool::new(true),
            }),
        }
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a partition: while unavailable every call fails `Network`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Number of revoked delegations recorded.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RevocationReceipt>> {
        self.inner.revoked.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RegistryError::Network("registry offline".into()))
        }
    }
}

#[async_trait]
impl RevocationRegistry for MemoryRegistry {
    async fn status(&self, delegation_id: &str) -> Result<RevocationStatus> {
        self.ensure_available()?;
        Ok(match self.lock().get(delegation_id) {
            Some(receipt) => RevocationStatus::Revoked(receipt.clone()),
            None => RevocationStatus::NotRevoked,
        })
    }

    async fn submit(&self, request: &RevocationRequest) -> Result<RevocationReceipt> {
        self.ensure_available()?;
        request.check()?;

        let mut revoked = self.lock();
        let receipt = revoked
            .entry(request.delegation_id.clone())
            .or_insert_with(|| {
                info!(
                    delegation_id = %request.delegation_id,
                    revoked_by = %request.revoked_by,
                    "Delegation revoked"
                );
                RevocationReceipt::from_request(request)
            })
            .clone();
        Ok(receipt)
    }
}
