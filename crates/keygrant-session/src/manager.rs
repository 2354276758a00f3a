//! The delegation lifecycle: create, import, validate, revoke.
//!
//! Records and the revocation cache live behind one mutex and are written
//! back to the store, sealed by the signing core, after every change.
//! Registry calls are made without holding the lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keygrant_codec::verify::verify_chain;
use keygrant_codec::{Base, Chain, Decoded, Format, Verification, encode_legacy, encode_with};
use keygrant_core::capability::{self, Capability};
use keygrant_core::{DelegationPayload, Did, SealedBox, SignedPayload};
use keygrant_enclave::Enclave;
use keygrant_registry::{RevocationRegistry, RevocationRequest, RevocationStatus};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{RevocationCache, RevocationCacheEntry};
use crate::config::SessionConfig;
use crate::error::{DelegationError, Result, RevocationError, StoreError, Warning};
use crate::record::{Delegation, Expiration, Imported};
use crate::store::{KeyValueStore, from_cbor, keys, to_cbor};

/// Creates, imports, validates and revokes delegations for one identity.
pub struct DelegationManager {
    did: Did,
    enclave: Enclave,
    store: Arc<dyn KeyValueStore>,
    registry: Arc<dyn RevocationRegistry>,
    config: SessionConfig,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    created: Vec<Delegation>,
    received: Vec<Delegation>,
    cache: RevocationCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Created,
    Received,
    Cache,
}

impl State {
    fn find(&self, id: &str) -> Option<&Delegation> {
        self.created
            .iter()
            .chain(self.received.iter())
            .find(|d| d.content_id == id)
    }

    /// Revocation known without asking the registry.
    fn local_revocation(&self, id: &str) -> Option<DelegationError> {
        if let Some(record) = self.find(id).filter(|d| d.revoked) {
            return Some(revoked_error(record));
        }
        self.cache
            .get(id)
            .filter(|entry| entry.revoked)
            .map(|entry| DelegationError::Revoked {
                id: id.to_string(),
                revoked_at: Some(entry.checked_at),
                revoked_by: None,
            })
    }

    fn mark_revoked(&mut self, id: &str, at: DateTime<Utc>, by: Option<Did>) -> Vec<Slot> {
        let mut slots = Vec::new();
        if mark_in(&mut self.created, id, at, &by) {
            slots.push(Slot::Created);
        }
        if mark_in(&mut self.received, id, at, &by) {
            slots.push(Slot::Received);
        }
        slots
    }
}

fn mark_in(list: &mut [Delegation], id: &str, at: DateTime<Utc>, by: &Option<Did>) -> bool {
    let mut changed = false;
    for record in list.iter_mut().filter(|d| d.content_id == id) {
        changed |= record.mark_revoked(at, by.clone());
    }
    changed
}

fn revoked_error(record: &Delegation) -> DelegationError {
    DelegationError::Revoked {
        id: record.content_id.clone(),
        revoked_at: record.revoked_at,
        revoked_by: record.revoked_by.clone(),
    }
}

impl DelegationManager {
    /// Load persisted records and cache for the identity held by `enclave`.
    pub async fn load(
        did: Did,
        enclave: Enclave,
        store: Arc<dyn KeyValueStore>,
        registry: Arc<dyn RevocationRegistry>,
        config: SessionConfig,
    ) -> Result<Self> {
        let created: Vec<Delegation> = load_sealed(&enclave, store.as_ref(), keys::CREATED)
            .await?
            .unwrap_or_default();
        let received: Vec<Delegation> = load_sealed(&enclave, store.as_ref(), keys::RECEIVED)
            .await?
            .unwrap_or_default();
        let entries: Vec<RevocationCacheEntry> =
            load_sealed(&enclave, store.as_ref(), keys::REVOCATION_CACHE)
                .await?
                .unwrap_or_default();

        let mut cache = RevocationCache::with_entries(config.revocation_ttl, entries);
        let pruned = cache.prune_at(Utc::now());
        debug!(
            created = created.len(),
            received = received.len(),
            cached = cache.len(),
            pruned,
            "Loaded delegation state"
        );

        Ok(Self {
            did,
            enclave,
            store,
            registry,
            config,
            state: Mutex::new(State {
                created,
                received,
                cache,
            }),
        })
    }

    /// The DID delegations are issued from and expected to be addressed to.
    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Issue a delegation from this identity to `audience`.
    ///
    /// Without proofs every capability must be on a resource named by this
    /// identity's DID. With proofs, every capability must be covered by a
    /// usable proof granted to this identity, and the expiry is clamped to
    /// the earliest expiry among them.
    pub async fn create(
        &self,
        audience: &Did,
        capabilities: Vec<Capability>,
        expiration: Expiration,
        proofs: &[String],
    ) -> Result<Delegation> {
        let now = Utc::now();
        let capabilities = capability::normalize(capabilities);
        let mut expires_at = expiration.resolve(now)?;
        let mut embedded: Vec<SignedPayload> = Vec::new();
        let mut used: Vec<String> = Vec::new();

        if proofs.is_empty() {
            let me = self.did.to_string();
            if let Some(cap) = capabilities.iter().find(|c| c.resource != me) {
                return Err(DelegationError::CapabilityEscalation(format!(
                    "{cap} is not owned by {me} and no proof was given"
                )));
            }
        } else {
            let mut held = Vec::new();
            for id in proofs {
                let proof = self.get(id).await?;
                if proof.audience != self.did {
                    return Err(DelegationError::CapabilityEscalation(format!(
                        "proof {id} was granted to {}, not {}",
                        proof.audience, self.did
                    )));
                }
                if proof.format == Format::LegacyJson || !proof.verification.is_verified() {
                    return Err(DelegationError::CapabilityEscalation(format!(
                        "proof {id} is not a verified signed chain"
                    )));
                }
                match self.validate_at(&proof, now).await {
                    Ok(()) => {}
                    Err(e @ (DelegationError::Expired { .. } | DelegationError::Revoked { .. })) => {
                        debug!(proof = %id, error = %e, "Skipping unusable proof");
                        continue;
                    }
                    Err(e) => return Err(e),
                }

                used.push(id.clone());
                held.extend(proof.capabilities.iter().cloned());
                if let Some(proof_exp) = proof.expires_at {
                    expires_at = Some(expires_at.map_or(proof_exp, |own| own.min(proof_exp)));
                }
                if let Some(chain) = keygrant_codec::decode(&proof.token)?.delegation.chain {
                    for block in std::iter::once(chain.root).chain(chain.proofs) {
                        if !embedded.contains(&block) {
                            embedded.push(block);
                        }
                    }
                }
            }

            let missing = capability::uncovered(&held, &capabilities);
            if !missing.is_empty() {
                let missing: Vec<String> = missing.iter().map(|c| c.to_string()).collect();
                return Err(DelegationError::CapabilityEscalation(format!(
                    "no usable proof covers {}",
                    missing.join(", ")
                )));
            }
        }

        let payload =
            DelegationPayload::new(&self.did, audience, capabilities, expires_at, used)?;
        let signature = self.enclave.sign(&payload.signing_bytes()?).await?;
        let chain = Chain::new(payload.into_signed(signature), embedded);
        let verification = verify_chain(&chain)?;
        let delegation = keygrant_codec::Delegation::from_chain(chain)?;

        let base = self.config.default_base;
        let token = encode_with(&delegation, base)?;
        let record = Delegation::from_decoded(
            Decoded {
                delegation,
                format: base.into(),
                verification,
            },
            token,
        );

        let mut state = self.state.lock().await;
        state.created.push(record.clone());
        self.persist(&state, &[Slot::Created]).await?;

        info!(
            delegation_id = %record.content_id,
            audience = %record.audience,
            capabilities = record.capabilities.len(),
            "Delegation created"
        );
        Ok(record)
    }

    /// Decode and store a delegation received from someone else.
    ///
    /// A delegation addressed to another DID is still stored, flagged with
    /// `did_mismatch`. Importing a known content id returns the stored
    /// record unchanged.
    pub async fn import(&self, token: &str, name: Option<String>) -> Result<Imported> {
        let decoded = keygrant_codec::decode(token)?;

        let mut warnings = Vec::new();
        if decoded.format == Format::LegacyJson {
            warnings.push(Warning::LegacyFormat);
        }
        if let Verification::Unverified { reason } = &decoded.verification {
            warnings.push(Warning::Unverified {
                reason: reason.clone(),
            });
        }
        let did_mismatch = decoded.delegation.audience != self.did;
        if did_mismatch {
            warn!(
                delegation_id = %decoded.delegation.content_id,
                audience = %decoded.delegation.audience,
                did = %self.did,
                "Imported delegation is addressed to another DID"
            );
            warnings.push(Warning::DidMismatch {
                expected: self.did.clone(),
                actual: decoded.delegation.audience.clone(),
            });
        }

        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .received
            .iter()
            .find(|d| d.content_id == decoded.delegation.content_id)
        {
            debug!(delegation_id = %existing.content_id, "Delegation already imported");
            return Ok(Imported {
                delegation: existing.clone(),
                warnings,
                added: false,
            });
        }

        let mut record = Delegation::from_decoded(decoded, token.trim().to_string());
        record.name = name;
        record.did_mismatch = did_mismatch;
        record.imported_at = Some(Utc::now());
        if let Some(DelegationError::Revoked {
            revoked_at,
            revoked_by,
            ..
        }) = state.local_revocation(&record.content_id)
        {
            record.mark_revoked(revoked_at.unwrap_or_else(Utc::now), revoked_by);
        }

        state.received.push(record.clone());
        self.persist(&state, &[Slot::Received]).await?;

        info!(
            delegation_id = %record.content_id,
            issuer = %record.issuer,
            format = %record.format,
            "Delegation imported"
        );
        Ok(Imported {
            delegation: record,
            warnings,
            added: true,
        })
    }

    /// Check that a delegation is usable now.
    pub async fn validate(&self, delegation: &Delegation) -> Result<()> {
        self.validate_at(delegation, Utc::now()).await
    }

    /// Check that a delegation is usable at `now`.
    ///
    /// Expiry is checked first and locally. An expired delegation that is
    /// also known to be revoked is reported as revoked, without a registry
    /// call. Otherwise revocation is checked through [`Self::is_revoked`].
    pub async fn validate_at(&self, delegation: &Delegation, now: DateTime<Utc>) -> Result<()> {
        let id = &delegation.content_id;

        if let Some(expired_at) = delegation.expires_at.filter(|exp| now > *exp) {
            if delegation.revoked {
                return Err(revoked_error(delegation));
            }
            let state = self.state.lock().await;
            return Err(state
                .local_revocation(id)
                .unwrap_or_else(|| DelegationError::Expired {
                    id: id.clone(),
                    expired_at,
                }));
        }

        if delegation.revoked || self.is_revoked(id, false).await? {
            let state = self.state.lock().await;
            return Err(state
                .local_revocation(id)
                .unwrap_or_else(|| revoked_error(delegation)));
        }
        Ok(())
    }

    /// Whether `id` has been revoked.
    ///
    /// Local knowledge of a revocation answers immediately. A fresh cached
    /// answer is used unless `force_refresh` is set. Otherwise the registry
    /// is asked and the cache updated. If the registry cannot be reached the
    /// answer is `false` and nothing is cached.
    pub async fn is_revoked(&self, id: &str, force_refresh: bool) -> Result<bool> {
        {
            let state = self.state.lock().await;
            if state.local_revocation(id).is_some() {
                return Ok(true);
            }
            if !force_refresh && let Some(entry) = state.cache.lookup_at(id, Utc::now()) {
                debug!(delegation_id = %id, revoked = entry.revoked, "Revocation answered from cache");
                return Ok(entry.revoked);
            }
        }

        let status = match self.registry.status(id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    delegation_id = %id,
                    error = %e,
                    "Revocation registry unavailable; treating delegation as not revoked"
                );
                return Ok(false);
            }
        };

        let mut state = self.state.lock().await;
        let mut slots = Vec::new();
        if state.cache.record(RevocationCacheEntry {
            delegation_id: id.to_string(),
            revoked: status.is_revoked(),
            checked_at: Utc::now(),
        }) {
            slots.push(Slot::Cache);
        }
        if let RevocationStatus::Revoked(receipt) = &status {
            info!(
                delegation_id = %id,
                revoked_by = %receipt.revoked_by,
                "Registry reports delegation revoked"
            );
            let by = receipt.revoked_by.parse().ok();
            slots.extend(state.mark_revoked(id, receipt.revoked_at, by));
        }
        self.persist(&state, &slots).await?;

        Ok(status.is_revoked())
    }

    /// Revoke a delegation this identity issued or received.
    ///
    /// Irreversible. Revoking an already revoked delegation returns it
    /// unchanged. Once the registry accepts the request the call succeeds;
    /// a failed local write is logged and retried by the next persist.
    pub async fn revoke(&self, id: &str, reason: Option<String>) -> Result<Delegation> {
        let record = self.get(id).await.map_err(|e| match e {
            DelegationError::NotFound(id) => RevocationError::NotFound(id).into(),
            other => other,
        })?;

        if !record.is_party(&self.did) {
            warn!(delegation_id = %id, caller = %self.did, "Refusing revocation by a third party");
            return Err(RevocationError::Unauthorized {
                id: id.to_string(),
                caller: self.did.clone(),
            }
            .into());
        }
        if record.revoked {
            debug!(delegation_id = %id, "Delegation already revoked");
            return Ok(record);
        }

        let request = RevocationRequest::new(id, &record.token, &self.did, reason);
        let signing_bytes = request.signing_bytes().map_err(RevocationError::Registry)?;
        let signature = self.enclave.sign(&signing_bytes).await?;
        let request = request.with_signature(&signature);

        let receipt = self
            .registry
            .submit(&request)
            .await
            .map_err(RevocationError::Registry)?;

        let mut state = self.state.lock().await;
        let by = receipt.revoked_by.parse().unwrap_or_else(|_| self.did.clone());
        let mut slots = state.mark_revoked(id, receipt.revoked_at, Some(by));
        if state.cache.record(RevocationCacheEntry {
            delegation_id: id.to_string(),
            revoked: true,
            checked_at: Utc::now(),
        }) {
            slots.push(Slot::Cache);
        }
        // The registry already holds the revocation; a local write failure
        // must not report it as undone.
        if let Err(e) = self.persist(&state, &slots).await {
            warn!(delegation_id = %id, error = %e, "Revocation accepted but not persisted locally");
        }

        info!(delegation_id = %id, revoked_by = %self.did, "Delegation revoked");
        state
            .find(id)
            .cloned()
            .ok_or_else(|| RevocationError::NotFound(id.to_string()).into())
    }

    /// Delegations issued by this identity, oldest first.
    pub async fn list_created(&self) -> Vec<Delegation> {
        self.state.lock().await.created.clone()
    }

    /// Delegations imported into this session, oldest first.
    pub async fn list_received(&self) -> Vec<Delegation> {
        self.state.lock().await.received.clone()
    }

    pub async fn get(&self, id: &str) -> Result<Delegation> {
        self.state
            .lock()
            .await
            .find(id)
            .cloned()
            .ok_or_else(|| DelegationError::NotFound(id.to_string()))
    }

    /// Re-encode a stored delegation. Unsigned legacy delegations can only
    /// be exported as legacy JSON.
    pub async fn export(&self, id: &str, base: Base) -> Result<String> {
        let record = self.get(id).await?;
        let decoded = keygrant_codec::decode(&record.token)?;
        if decoded.delegation.is_signed() {
            Ok(encode_with(&decoded.delegation, base)?)
        } else {
            Ok(encode_legacy(&decoded.delegation)?)
        }
    }

    /// Look up and validate a delegation before acting on it.
    pub async fn ensure_usable(&self, id: &str) -> Result<Delegation> {
        let record = self.get(id).await?;
        self.validate(&record).await?;
        Ok(record)
    }

    async fn persist(&self, state: &State, slots: &[Slot]) -> Result<()> {
        for slot in slots {
            match slot {
                Slot::Created => self.save_sealed(keys::CREATED, &state.created).await?,
                Slot::Received => self.save_sealed(keys::RECEIVED, &state.received).await?,
                Slot::Cache => {
                    let entries: Vec<&RevocationCacheEntry> = state.cache.entries().collect();
                    self.save_sealed(keys::REVOCATION_CACHE, &entries).await?
                }
            }
        }
        Ok(())
    }

    async fn save_sealed<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let plaintext = serde_json::to_vec(value).map_err(keygrant_core::Error::from)?;
        let sealed = self.enclave.encrypt(&plaintext).await?;
        self.store.set(key, &to_cbor(key, &sealed)?)?;
        Ok(())
    }
}

async fn load_sealed<T: DeserializeOwned>(
    enclave: &Enclave,
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    let sealed: SealedBox = from_cbor(key, &bytes)?;
    let plaintext = enclave.decrypt(&sealed).await?;
    let value = serde_json::from_slice(&plaintext).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(value))
}
