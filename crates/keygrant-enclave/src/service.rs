//! The enclave thread and the async handle used to reach it.
//!
//! The signing core runs on one dedicated OS thread. Requests are queued on
//! a channel and handled strictly in submission order, so concurrent callers
//! are serialized by the core itself. Each request carries an id that the
//! reply must echo back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use keygrant_core::SealedBox;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{EnclaveError, Result};
use crate::protocol::{
    EnclaveRequest, EnclaveResponse, Envelope, GeneratedIdentity, PublicIdentity, Reply,
};
use crate::state::SigningCore;

/// Maximum queued requests before callers wait.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Handle to a running signing core.
///
/// Cheap to clone; all clones talk to the same core. The core thread exits
/// when [`Enclave::shutdown`] is called or the last handle is dropped.
#[derive(Debug, Clone)]
pub struct Enclave {
    request_tx: mpsc::Sender<Envelope>,
    next_id: Arc<AtomicU64>,
}

impl Enclave {
    /// Spawn a signing core on its own thread.
    pub fn spawn() -> Result<Self> {
        Self::spawn_with_queue(DEFAULT_QUEUE_DEPTH)
    }

    pub fn spawn_with_queue(queue_depth: usize) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<Envelope>(queue_depth.max(1));

        std::thread::Builder::new()
            .name("keygrant-enclave".into())
            .spawn(move || run(request_rx))
            .map_err(|e| EnclaveError::Protocol(format!("failed to spawn enclave thread: {e}")))?;

        info!("Signing core started");

        Ok(Self {
            request_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Derive the wrapping key from a hardware secret.
    pub async fn initialize(&self, secret: &[u8]) -> Result<()> {
        let secret = Zeroizing::new(secret.to_vec());
        match self.call(EnclaveRequest::Initialize { secret }).await? {
            EnclaveResponse::Initialized => Ok(()),
            other => Err(unexpected("initialize", &other)),
        }
    }

    /// Generate a new signing identity, replacing any held one.
    pub async fn generate_signing_identity(&self) -> Result<GeneratedIdentity> {
        match self.call(EnclaveRequest::GenerateIdentity).await? {
            EnclaveResponse::Generated(generated) => Ok(generated),
            other => Err(unexpected("generate_identity", &other)),
        }
    }

    /// Unseal a stored archive inside the core and hold its key.
    pub async fn load_signing_identity(&self, archive: &SealedBox) -> Result<PublicIdentity> {
        let request = EnclaveRequest::LoadIdentity {
            archive: archive.clone(),
        };
        match self.call(request).await? {
            EnclaveResponse::Loaded(identity) => Ok(identity),
            other => Err(unexpected("load_identity", &other)),
        }
    }

    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<SealedBox> {
        let request = EnclaveRequest::Encrypt {
            plaintext: plaintext.to_vec(),
        };
        match self.call(request).await? {
            EnclaveResponse::Sealed(sealed) => Ok(sealed),
            other => Err(unexpected("encrypt", &other)),
        }
    }

    pub async fn decrypt(&self, sealed: &SealedBox) -> Result<Vec<u8>> {
        let request = EnclaveRequest::Decrypt {
            sealed: sealed.clone(),
        };
        match self.call(request).await? {
            EnclaveResponse::Plaintext(plaintext) => Ok(plaintext),
            other => Err(unexpected("decrypt", &other)),
        }
    }

    /// Sign with the held identity.
    pub async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let request = EnclaveRequest::Sign {
            payload: payload.to_vec(),
        };
        match self.call(request).await? {
            EnclaveResponse::Signature(signature) => Ok(signature),
            other => Err(unexpected("sign", &other)),
        }
    }

    /// Check a signature against the held identity.
    pub async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool> {
        let request = EnclaveRequest::Verify {
            payload: payload.to_vec(),
            signature: signature.to_vec(),
        };
        match self.call(request).await? {
            EnclaveResponse::Verified(ok) => Ok(ok),
            other => Err(unexpected("verify", &other)),
        }
    }

    /// The held identity's public half, if any.
    pub async fn public_identity(&self) -> Result<Option<PublicIdentity>> {
        match self.call(EnclaveRequest::PublicIdentity).await? {
            EnclaveResponse::Identity(identity) => Ok(identity),
            other => Err(unexpected("public_identity", &other)),
        }
    }

    /// Drop all secret state and stop the core thread.
    pub async fn shutdown(&self) -> Result<()> {
        match self.call(EnclaveRequest::Shutdown).await {
            Ok(EnclaveResponse::ShutDown) | Err(EnclaveError::Unavailable) => Ok(()),
            Ok(other) => Err(unexpected("shutdown", &other)),
            Err(e) => Err(e),
        }
    }

    async fn call(&self, request: EnclaveRequest) -> Result<EnclaveResponse> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.request_tx
            .send(Envelope {
                request_id,
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EnclaveError::Unavailable)?;

        let reply = reply_rx.await.map_err(|_| EnclaveError::Unavailable)?;
        if reply.request_id != request_id {
            return Err(EnclaveError::Protocol(format!(
                "reply for request {} arrived on request {}",
                reply.request_id, request_id
            )));
        }
        Ok(reply.result?)
    }
}

fn unexpected(op: &str, response: &EnclaveResponse) -> EnclaveError {
    EnclaveError::Protocol(format!("unexpected response to {op}: {response:?}"))
}

/// Enclave thread body.
fn run(mut request_rx: mpsc::Receiver<Envelope>) {
    let mut core = SigningCore::default();

    while let Some(envelope) = request_rx.blocking_recv() {
        let Envelope {
            request_id,
            request,
            reply,
        } = envelope;
        let op = request.name();
        let shutdown = matches!(request, EnclaveRequest::Shutdown);

        let result = core.handle(request);
        match &result {
            Ok(_) => debug!(request_id, op, "Signing core request completed"),
            Err(e) => warn!(request_id, op, error = %e, "Signing core request failed"),
        }

        // The caller may have given up; nothing to do if so.
        let _ = reply.send(Reply { request_id, result });

        if shutdown {
            break;
        }
    }

    info!("Signing core stopped");
}
