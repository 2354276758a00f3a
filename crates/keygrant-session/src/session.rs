//! An authenticated session for one identity.

use std::sync::Arc;

use keygrant_core::{Did, SealedBox};
use keygrant_enclave::{Enclave, PublicIdentity};
use keygrant_registry::RevocationRegistry;
use tracing::info;

use crate::config::SessionConfig;
use crate::credential::{CredentialAdapter, CredentialSecret};
use crate::error::{Result, StoreError};
use crate::manager::DelegationManager;
use crate::store::{KeyValueStore, from_cbor, keys, to_cbor};

/// One authenticated identity with its signing core and delegations.
///
/// Sessions are independent: opening two over different stores gives two
/// identities that share nothing but the registry.
pub struct Session {
    enclave: Enclave,
    identity: PublicIdentity,
    credential_id: String,
    manager: DelegationManager,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.identity.did)
            .field("credential_id", &self.credential_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Authenticate and unlock the identity kept in `store`, creating both
    /// credential and identity on first use.
    pub async fn open(
        adapter: &dyn CredentialAdapter,
        store: Arc<dyn KeyValueStore>,
        registry: Arc<dyn RevocationRegistry>,
        config: SessionConfig,
    ) -> Result<Self> {
        let (credential_id, secret) = authenticate(adapter, store.as_ref()).await?;

        let enclave = Enclave::spawn()?;
        enclave.initialize(secret.as_bytes()).await?;
        drop(secret);

        let identity = match store.get(keys::IDENTITY_ARCHIVE)? {
            Some(bytes) => {
                let archive: SealedBox = from_cbor(keys::IDENTITY_ARCHIVE, &bytes)?;
                let identity = enclave.load_signing_identity(&archive).await?;
                info!(did = %identity.did, "Signing identity unlocked");
                identity
            }
            None => {
                let generated = enclave.generate_signing_identity().await?;
                store.set(
                    keys::IDENTITY_ARCHIVE,
                    &to_cbor(keys::IDENTITY_ARCHIVE, &generated.archive)?,
                )?;
                info!(did = %generated.identity.did, "Signing identity created");
                generated.identity
            }
        };

        let manager = DelegationManager::load(
            identity.did.clone(),
            enclave.clone(),
            store,
            registry,
            config,
        )
        .await?;

        Ok(Self {
            enclave,
            identity,
            credential_id,
            manager,
        })
    }

    pub fn did(&self) -> &Did {
        &self.identity.did
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.identity.public_key
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    pub fn delegations(&self) -> &DelegationManager {
        &self.manager
    }

    /// Sign arbitrary bytes with the session identity.
    pub async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        Ok(self.enclave.sign(payload).await?)
    }

    /// End the session and wipe the signing core.
    pub async fn lock(self) -> Result<()> {
        self.enclave.shutdown().await?;
        info!(did = %self.identity.did, "Session locked");
        Ok(())
    }
}

async fn authenticate(
    adapter: &dyn CredentialAdapter,
    store: &dyn KeyValueStore,
) -> Result<(String, CredentialSecret)> {
    if let Some(bytes) = store.get(keys::CREDENTIAL_ID)? {
        let id = String::from_utf8(bytes).map_err(|e| StoreError::Corrupt {
            key: keys::CREDENTIAL_ID.to_string(),
            reason: e.to_string(),
        })?;
        let secret = adapter.authenticate(&id).await?;
        return Ok((id, secret));
    }

    let credential = adapter.get_or_create_credential().await?;
    store.set(keys::CREDENTIAL_ID, credential.id.as_bytes())?;
    info!(credential_id = %credential.id, "Credential registered");
    Ok((credential.id, credential.secret))
}
