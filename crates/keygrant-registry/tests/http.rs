//! HttpRegistry against stub axum servers on ephemeral ports.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use keygrant_core::IdentityKey;
use keygrant_registry::{
    HttpRegistry, RegistryConfig, RegistryError, RevocationReceipt, RevocationRegistry,
    RevocationRequest, RevocationStatus,
};
use tokio::net::TcpListener;

async fn serve(app: Router) -> HttpRegistry {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    HttpRegistry::new(RegistryConfig {
        base_url: format!("http://{addr}"),
        timeout: Duration::from_millis(500),
        ..Default::default()
    })
    .unwrap()
}

fn receipt(id: &str) -> RevocationReceipt {
    RevocationReceipt {
        delegation_id: id.to_string(),
        revoked_by: IdentityKey::generate().did().to_string(),
        revoked_at: Utc::now(),
        reason: None,
    }
}

fn signed_request(id: &str) -> RevocationRequest {
    let key = IdentityKey::generate();
    let request = RevocationRequest::new(id, "mtoken", &key.did(), None);
    let sig = key.sign(&request.signing_bytes().unwrap()).to_bytes();
    request.with_signature(&sig)
}

#[tokio::test]
async fn test_not_found_means_not_revoked() {
    let app = Router::new().route(
        "/revocations/{id}",
        get(|| async { StatusCode::NOT_FOUND }),
    );

    let status = serve(app).await.status("bafyone").await.unwrap();
    assert_eq!(status, RevocationStatus::NotRevoked);
}

#[tokio::test]
async fn test_ok_means_revoked() {
    let expected = receipt("bafytwo");
    let body = expected.clone();
    let app = Router::new().route(
        "/revocations/bafytwo",
        get(move || async move { Json(body) }),
    );

    match serve(app).await.status("bafytwo").await.unwrap() {
        RevocationStatus::Revoked(got) => assert_eq!(got, expected),
        other => panic!("expected revoked, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mismatched_answer_is_invalid() {
    let body = receipt("bafyother");
    let app = Router::new().route(
        "/revocations/{id}",
        get(move || async move { Json(body) }),
    );

    assert!(matches!(
        serve(app).await.status("bafythree").await,
        Err(RegistryError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_server_error_is_status() {
    let app = Router::new().route(
        "/revocations/{id}",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );

    match serve(app).await.status("bafyfour").await {
        Err(RegistryError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let app = Router::new().route(
        "/revocations/{id}",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::NOT_FOUND
        }),
    );

    let err = serve(app).await.status("bafyslow").await.unwrap_err();
    assert!(err.is_unavailable(), "{err:?}");
}

#[tokio::test]
async fn test_unreachable_is_network_error() {
    let registry = HttpRegistry::new(RegistryConfig {
        base_url: "http://127.0.0.1:1".into(),
        timeout: Duration::from_millis(500),
        ..Default::default()
    })
    .unwrap();
    assert!(registry.status("bafyany").await.unwrap_err().is_unavailable());
}

#[tokio::test]
async fn test_submit_posts_to_root() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/",
        post(move |Json(request): Json<RevocationRequest>| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.delegation_id, "bafyfive");
            (
                StatusCode::CREATED,
                Json(RevocationReceipt::from_request(&request)),
            )
        }),
    );

    let request = signed_request("bafyfive");
    let got = serve(app).await.submit(&request).await.unwrap();
    assert_eq!(got, RevocationReceipt::from_request(&request));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_submit_rejection_surfaces_status() {
    let app = Router::new().route(
        "/",
        post(|| async { (StatusCode::FORBIDDEN, "not yours") }),
    );

    assert!(matches!(
        serve(app).await.submit(&signed_request("bafysix")).await,
        Err(RegistryError::Status { status: 403, .. })
    ));
}
