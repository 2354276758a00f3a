//! Grant, import, validate and revoke a delegation between two sessions.
//!
//! Run with `cargo run -p keygrant --example delegate`.

use std::sync::Arc;

use keygrant::{
    Capability, Expiration, MemoryRegistry, MemoryStore, Session, SessionConfig,
    SoftwareCredentialAdapter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let registry = Arc::new(MemoryRegistry::new());
    let config = SessionConfig {
        revocation_ttl: std::time::Duration::ZERO,
        ..Default::default()
    };

    let alice = Session::open(
        &SoftwareCredentialAdapter::generate(),
        Arc::new(MemoryStore::new()),
        registry.clone(),
        config.clone(),
    )
    .await?;
    let bob = Session::open(
        &SoftwareCredentialAdapter::generate(),
        Arc::new(MemoryStore::new()),
        registry,
        config,
    )
    .await?;

    println!("alice: {}", alice.did());
    println!("bob:   {}", bob.did());

    let me = alice.did().to_string();
    let grant = alice
        .delegations()
        .create(
            bob.did(),
            vec![Capability::new(&me, "storage/upload")?],
            Expiration::RelativeHours(24),
            &[],
        )
        .await?;
    println!("\ntoken: {}", grant.token);

    let imported = bob.delegations().import(&grant.token, Some("uploads".into())).await?;
    bob.delegations().validate(&imported.delegation).await?;
    println!("bob holds {} (valid)", imported.delegation.content_id);

    alice
        .delegations()
        .revoke(&grant.content_id, Some("rotated".into()))
        .await?;

    match bob.delegations().validate(&imported.delegation).await {
        Ok(()) => println!("still valid"),
        Err(e) => println!("after revocation: {e}"),
    }

    alice.lock().await?;
    bob.lock().await?;
    Ok(())
}
