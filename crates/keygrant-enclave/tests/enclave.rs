//! Behaviour of the signing core as seen through its async handle.

use keygrant_core::Did;
use keygrant_enclave::{Enclave, EnclaveError};

#[tokio::test]
async fn test_sign_before_initialize_is_rejected() {
    let enclave = Enclave::spawn().unwrap();
    let err = enclave.sign(b"payload").await.unwrap_err();
    assert!(err.is_not_initialized());

    let err = enclave.generate_signing_identity().await.unwrap_err();
    assert!(err.is_not_initialized());
}

#[tokio::test]
async fn test_generate_sign_verify() {
    let enclave = Enclave::spawn().unwrap();
    enclave.initialize(b"device-secret").await.unwrap();
    let generated = enclave.generate_signing_identity().await.unwrap();

    let signature = enclave.sign(b"hello").await.unwrap();
    assert_eq!(signature.len(), 64);
    assert!(enclave.verify(b"hello", &signature).await.unwrap());
    assert!(!enclave.verify(b"goodbye", &signature).await.unwrap());

    // Signatures check out against the public DID alone.
    let did: Did = generated.identity.did.to_string().parse().unwrap();
    did.verify(b"hello", &signature).unwrap();

    let held = enclave.public_identity().await.unwrap();
    assert_eq!(held, Some(generated.identity));
}

#[tokio::test]
async fn test_same_secret_reloads_identity_across_instances() {
    let first = Enclave::spawn().unwrap();
    first.initialize(b"device-secret").await.unwrap();
    let generated = first.generate_signing_identity().await.unwrap();
    first.shutdown().await.unwrap();

    let second = Enclave::spawn().unwrap();
    second.initialize(b"device-secret").await.unwrap();
    let loaded = second.load_signing_identity(&generated.archive).await.unwrap();
    assert_eq!(loaded, generated.identity);
}

#[tokio::test]
async fn test_different_secret_cannot_unseal() {
    let first = Enclave::spawn().unwrap();
    first.initialize(b"device-secret").await.unwrap();
    let generated = first.generate_signing_identity().await.unwrap();

    let second = Enclave::spawn().unwrap();
    second.initialize(b"other-secret").await.unwrap();
    let err = second
        .load_signing_identity(&generated.archive)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EnclaveError::Core(keygrant_core::Error::Decryption)
    ));
}

#[tokio::test]
async fn test_encrypt_decrypt() {
    let enclave = Enclave::spawn().unwrap();
    enclave.initialize(b"device-secret").await.unwrap();

    let sealed = enclave.encrypt(b"cache contents").await.unwrap();
    assert_eq!(sealed.iv.len(), 12);
    assert_ne!(sealed.ciphertext, b"cache contents");
    assert_eq!(enclave.decrypt(&sealed).await.unwrap(), b"cache contents");
}

#[tokio::test]
async fn test_archive_cannot_be_opened_with_decrypt() {
    let enclave = Enclave::spawn().unwrap();
    enclave.initialize(b"device-secret").await.unwrap();
    let generated = enclave.generate_signing_identity().await.unwrap();

    let err = enclave.decrypt(&generated.archive).await.unwrap_err();
    assert!(matches!(
        err,
        EnclaveError::Core(keygrant_core::Error::Decryption)
    ));

    // The archive still loads through the dedicated path.
    let loaded = enclave.load_signing_identity(&generated.archive).await.unwrap();
    assert_eq!(loaded, generated.identity);
}

#[tokio::test]
async fn test_concurrent_requests_are_answered_in_order() {
    let enclave = Enclave::spawn().unwrap();
    enclave.initialize(b"device-secret").await.unwrap();
    enclave.generate_signing_identity().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..32u32 {
        let enclave = enclave.clone();
        handles.push(tokio::spawn(async move {
            let payload = i.to_be_bytes();
            let signature = enclave.sign(&payload).await.unwrap();
            (payload, signature)
        }));
    }

    for handle in handles {
        let (payload, signature) = handle.await.unwrap();
        assert!(enclave.verify(&payload, &signature).await.unwrap());
    }
}

#[tokio::test]
async fn test_shutdown_makes_handle_unavailable() {
    let enclave = Enclave::spawn().unwrap();
    enclave.initialize(b"device-secret").await.unwrap();
    enclave.shutdown().await.unwrap();

    let err = enclave.sign(b"x").await.unwrap_err();
    assert!(matches!(err, EnclaveError::Unavailable));

    // Shutting down twice is harmless.
    enclave.shutdown().await.unwrap();
}
