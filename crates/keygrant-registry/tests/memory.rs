//! MemoryRegistry semantics shared by every registry.

use keygrant_codec::{Chain, Delegation};
use keygrant_core::{Capability, DelegationPayload, IdentityKey};
use keygrant_registry::{MemoryRegistry, RegistryError, RevocationRegistry, RevocationRequest};

fn grant(issuer: &IdentityKey, audience: &IdentityKey) -> (String, String) {
    let me = issuer.did().to_string();
    let payload = DelegationPayload::new(
        &issuer.did(),
        &audience.did(),
        vec![Capability::new(&me, "list").unwrap()],
        None,
        vec![],
    )
    .unwrap();
    let sig = issuer.sign(&payload.signing_bytes().unwrap()).to_bytes().to_vec();
    let delegation = Delegation::from_chain(Chain::new(payload.into_signed(sig), vec![])).unwrap();
    (
        delegation.content_id.clone(),
        keygrant_codec::encode(&delegation).unwrap(),
    )
}

fn request(key: &IdentityKey, id: &str, token: &str) -> RevocationRequest {
    let request = RevocationRequest::new(id, token, &key.did(), None);
    let sig = key.sign(&request.signing_bytes().unwrap()).to_bytes();
    request.with_signature(&sig)
}

#[tokio::test]
async fn test_submit_then_status() {
    let registry = MemoryRegistry::new();
    let alice = IdentityKey::generate();
    let bob = IdentityKey::generate();
    let (id, token) = grant(&alice, &bob);

    assert!(!registry.status(&id).await.unwrap().is_revoked());
    registry.submit(&request(&alice, &id, &token)).await.unwrap();
    assert!(registry.status(&id).await.unwrap().is_revoked());
}

#[tokio::test]
async fn test_resubmission_keeps_first_receipt() {
    let registry = MemoryRegistry::new();
    let alice = IdentityKey::generate();
    let bob = IdentityKey::generate();
    let (id, token) = grant(&alice, &bob);

    let first = registry.submit(&request(&alice, &id, &token)).await.unwrap();
    let second = registry.submit(&request(&bob, &id, &token)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_clones_share_state() {
    let registry = MemoryRegistry::new();
    let other = registry.clone();
    let alice = IdentityKey::generate();
    let (id, token) = grant(&alice, &IdentityKey::generate());

    registry.submit(&request(&alice, &id, &token)).await.unwrap();
    assert!(other.status(&id).await.unwrap().is_revoked());
}

#[tokio::test]
async fn test_unavailable_fails_network() {
    let registry = MemoryRegistry::new();
    registry.set_available(false);
    let err = registry.status("bafyany").await.unwrap_err();
    assert!(err.is_unavailable());

    registry.set_available(true);
    assert!(registry.status("bafyany").await.is_ok());
}

#[tokio::test]
async fn test_third_party_rejected() {
    let registry = MemoryRegistry::new();
    let alice = IdentityKey::generate();
    let mallory = IdentityKey::generate();
    let (id, token) = grant(&alice, &IdentityKey::generate());

    assert!(matches!(
        registry.submit(&request(&mallory, &id, &token)).await,
        Err(RegistryError::Unauthorized(_))
    ));
    assert!(registry.is_empty());
}
