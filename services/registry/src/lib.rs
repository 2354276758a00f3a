//! Revocation Registry Service
//!
//! Records signed revocations and answers status lookups:
//!
//! - `GET /revocations/{id}`: 200 with the receipt, or 404 if not revoked
//! - `POST /`: submit a signed revocation request (201, 400 or 403)
//! - `GET /health`

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use keygrant_registry::{
    MemoryRegistry, RegistryError, RevocationRegistry, RevocationRequest, RevocationStatus,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 8600).into(),
        }
    }
}

/// Shared state: an in-memory registry, which also performs request checks.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub registry: MemoryRegistry,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "keygrant-registry"
    }))
}

async fn revocation_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.status(&id).await {
        Ok(RevocationStatus::Revoked(receipt)) => Json(receipt).into_response(),
        Ok(RevocationStatus::NotRevoked) => error_response(StatusCode::NOT_FOUND, "not revoked"),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

async fn submit_revocation(
    State(state): State<AppState>,
    Json(request): Json<RevocationRequest>,
) -> Response {
    match state.registry.submit(&request).await {
        Ok(receipt) => {
            info!(
                delegation_id = %receipt.delegation_id,
                revoked_by = %receipt.revoked_by,
                "Revocation recorded"
            );
            (StatusCode::CREATED, Json(receipt)).into_response()
        }
        Err(RegistryError::Unauthorized(reason)) => {
            warn!(delegation_id = %request.delegation_id, %reason, "Unauthorized revocation");
            error_response(StatusCode::FORBIDDEN, reason)
        }
        Err(RegistryError::InvalidRequest(reason)) => {
            warn!(delegation_id = %request.delegation_id, %reason, "Invalid revocation");
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// Build the router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/revocations/{id}", get(revocation_status))
        .route("/", post(submit_revocation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use keygrant_codec::{Chain, Delegation};
    use keygrant_core::{Capability, DelegationPayload, IdentityKey};
    use tower::ServiceExt;

    fn grant(issuer: &IdentityKey, audience: &IdentityKey) -> (String, String) {
        let me = issuer.did().to_string();
        let payload = DelegationPayload::new(
            &issuer.did(),
            &audience.did(),
            vec![Capability::new(&me, "upload").unwrap()],
            None,
            vec![],
        )
        .unwrap();
        let sig = issuer.sign(&payload.signing_bytes().unwrap()).to_bytes().to_vec();
        let delegation =
            Delegation::from_chain(Chain::new(payload.into_signed(sig), vec![])).unwrap();
        (
            delegation.content_id.clone(),
            keygrant_codec::encode(&delegation).unwrap(),
        )
    }

    fn signed(key: &IdentityKey, id: &str, token: &str) -> RevocationRequest {
        let request = RevocationRequest::new(id, token, &key.did(), None);
        let sig = key.sign(&request.signing_bytes().unwrap()).to_bytes();
        request.with_signature(&sig)
    }

    fn post(request: &RevocationRequest) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(request).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(AppState::default());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_is_not_found() {
        let app = build_router(AppState::default());
        let response = app.oneshot(get("/revocations/bafyunknown")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_then_lookup() {
        let state = AppState::default();
        let alice = IdentityKey::generate();
        let bob = IdentityKey::generate();
        let (id, token) = grant(&alice, &bob);

        let response = build_router(state.clone())
            .oneshot(post(&signed(&alice, &id, &token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = build_router(state.clone())
            .oneshot(get(&format!("/revocations/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Idempotent.
        let response = build_router(state)
            .oneshot(post(&signed(&bob, &id, &token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_third_party_forbidden() {
        let alice = IdentityKey::generate();
        let mallory = IdentityKey::generate();
        let (id, token) = grant(&alice, &IdentityKey::generate());

        let response = build_router(AppState::default())
            .oneshot(post(&signed(&mallory, &id, &token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unsigned_request_rejected() {
        let alice = IdentityKey::generate();
        let (id, token) = grant(&alice, &IdentityKey::generate());
        let unsigned = RevocationRequest::new(&id, &token, &alice.did(), None);

        let response = build_router(AppState::default())
            .oneshot(post(&unsigned))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
