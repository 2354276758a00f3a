//! The state held inside the boundary and the handler for each request.

use keygrant_core::{Error, IdentityKey, KeyArchive, Result, WrappingKey};

use crate::protocol::{EnclaveRequest, EnclaveResponse, GeneratedIdentity, PublicIdentity};

/// Secret state of the signing core. Never leaves the enclave thread.
#[derive(Debug, Default)]
pub(crate) struct SigningCore {
    wrapping_key: Option<WrappingKey>,
    /// Seals identity archives only; never reachable through `Encrypt`/`Decrypt`.
    archive_key: Option<WrappingKey>,
    identity: Option<IdentityKey>,
}

impl SigningCore {
    pub(crate) fn handle(&mut self, request: EnclaveRequest) -> Result<EnclaveResponse> {
        match request {
            EnclaveRequest::Initialize { secret } => {
                let key = WrappingKey::derive(&secret)?;
                let archive_key = WrappingKey::derive_archive_key(&secret)?;
                // A new secret invalidates whatever identity was unsealed before.
                self.identity = None;
                self.wrapping_key = Some(key);
                self.archive_key = Some(archive_key);
                Ok(EnclaveResponse::Initialized)
            }
            EnclaveRequest::GenerateIdentity => {
                let archive_key = self.archive_key()?;
                let identity = IdentityKey::generate();
                let archive = archive_key.seal(&identity.to_archive().to_bytes()?)?;
                let public = public_identity(&identity);
                self.identity = Some(identity);
                Ok(EnclaveResponse::Generated(GeneratedIdentity {
                    identity: public,
                    archive,
                }))
            }
            EnclaveRequest::LoadIdentity { archive } => {
                let plaintext = zeroize::Zeroizing::new(self.archive_key()?.open(&archive)?);
                let identity = IdentityKey::from_archive(&KeyArchive::from_bytes(&plaintext)?)?;
                let public = public_identity(&identity);
                self.identity = Some(identity);
                Ok(EnclaveResponse::Loaded(public))
            }
            EnclaveRequest::Encrypt { plaintext } => {
                Ok(EnclaveResponse::Sealed(self.wrapping_key()?.seal(&plaintext)?))
            }
            EnclaveRequest::Decrypt { sealed } => {
                Ok(EnclaveResponse::Plaintext(self.wrapping_key()?.open(&sealed)?))
            }
            EnclaveRequest::Sign { payload } => {
                let signature = self.identity()?.sign(&payload);
                Ok(EnclaveResponse::Signature(signature.to_bytes().to_vec()))
            }
            EnclaveRequest::Verify { payload, signature } => Ok(EnclaveResponse::Verified(
                self.identity()?.verify(&payload, &signature),
            )),
            EnclaveRequest::PublicIdentity => Ok(EnclaveResponse::Identity(
                self.identity.as_ref().map(public_identity),
            )),
            EnclaveRequest::Shutdown => {
                self.identity = None;
                self.wrapping_key = None;
                self.archive_key = None;
                Ok(EnclaveResponse::ShutDown)
            }
        }
    }

    fn wrapping_key(&self) -> Result<&WrappingKey> {
        self.wrapping_key
            .as_ref()
            .ok_or(Error::NotInitialized("no wrapping key; initialize with a hardware secret first"))
    }

    fn archive_key(&self) -> Result<&WrappingKey> {
        self.archive_key
            .as_ref()
            .ok_or(Error::NotInitialized("no archive key; initialize with a hardware secret first"))
    }

    fn identity(&self) -> Result<&IdentityKey> {
        self.identity
            .as_ref()
            .ok_or(Error::NotInitialized("no signing identity; generate or load one first"))
    }
}

fn public_identity(key: &IdentityKey) -> PublicIdentity {
    PublicIdentity {
        did: key.did(),
        public_key: key.verifying_key().to_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroizing;

    fn init(core: &mut SigningCore, secret: &[u8]) {
        core.handle(EnclaveRequest::Initialize {
            secret: Zeroizing::new(secret.to_vec()),
        })
        .unwrap();
    }

    fn generate(core: &mut SigningCore) -> GeneratedIdentity {
        match core.handle(EnclaveRequest::GenerateIdentity).unwrap() {
            EnclaveResponse::Generated(generated) => generated,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_sign_requires_identity() {
        let mut core = SigningCore::default();
        let result = core.handle(EnclaveRequest::Sign {
            payload: b"x".to_vec(),
        });
        assert!(matches!(result, Err(Error::NotInitialized(_))));

        init(&mut core, b"secret");
        let result = core.handle(EnclaveRequest::Sign {
            payload: b"x".to_vec(),
        });
        assert!(matches!(result, Err(Error::NotInitialized(_))));
    }

    #[test]
    fn test_generate_requires_wrapping_key() {
        let mut core = SigningCore::default();
        assert!(matches!(
            core.handle(EnclaveRequest::GenerateIdentity),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn test_reload_in_fresh_core() {
        let mut first = SigningCore::default();
        init(&mut first, b"hardware-secret");
        let generated = generate(&mut first);

        let mut second = SigningCore::default();
        init(&mut second, b"hardware-secret");
        match second
            .handle(EnclaveRequest::LoadIdentity {
                archive: generated.archive,
            })
            .unwrap()
        {
            EnclaveResponse::Loaded(public) => assert_eq!(public, generated.identity),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_reload_with_wrong_secret_fails() {
        let mut first = SigningCore::default();
        init(&mut first, b"hardware-secret");
        let generated = generate(&mut first);

        let mut second = SigningCore::default();
        init(&mut second, b"different-secret");
        let result = second.handle(EnclaveRequest::LoadIdentity {
            archive: generated.archive,
        });
        assert!(matches!(result, Err(Error::Decryption)));
    }

    #[test]
    fn test_archive_does_not_open_through_decrypt() {
        let mut core = SigningCore::default();
        init(&mut core, b"hardware-secret");
        let generated = generate(&mut core);

        let result = core.handle(EnclaveRequest::Decrypt {
            sealed: generated.archive,
        });
        assert!(matches!(result, Err(Error::Decryption)));
    }

    #[test]
    fn test_sealed_data_does_not_load_as_identity() {
        let mut core = SigningCore::default();
        init(&mut core, b"hardware-secret");
        let sealed = match core
            .handle(EnclaveRequest::Encrypt {
                plaintext: b"not an archive".to_vec(),
            })
            .unwrap()
        {
            EnclaveResponse::Sealed(sealed) => sealed,
            other => panic!("unexpected response: {other:?}"),
        };

        let result = core.handle(EnclaveRequest::LoadIdentity { archive: sealed });
        assert!(matches!(result, Err(Error::Decryption)));
    }

    #[test]
    fn test_reinitialize_drops_identity() {
        let mut core = SigningCore::default();
        init(&mut core, b"one");
        generate(&mut core);
        init(&mut core, b"two");

        match core.handle(EnclaveRequest::PublicIdentity).unwrap() {
            EnclaveResponse::Identity(None) => {}
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
