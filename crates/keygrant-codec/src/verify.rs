//! Offline verification of an archive's proof chain.

use std::collections::HashMap;

use keygrant_core::SignedPayload;
use keygrant_core::capability::uncovered;

use crate::archive::{Chain, content_id};
use crate::delegation::Verification;
use crate::{CodecError, Result};

/// Deepest proof chain accepted.
pub const MAX_CHAIN_DEPTH: usize = 16;

/// Most proofs one archive may embed.
pub const MAX_EMBEDDED_PROOFS: usize = 64;

/// Check every signature and every link of `chain`.
///
/// Wrong signatures, proofs addressed to someone other than the child's
/// issuer, and children claiming more than their proofs hold are errors.
/// Proofs that are referenced but not embedded, and root authority that is
/// not the issuer's own, leave the result unverified.
///
/// Each embedded proof is walked once however many children share it.
pub fn verify_chain(chain: &Chain) -> Result<Verification> {
    if chain.proofs.len() > MAX_EMBEDDED_PROOFS {
        return Err(CodecError::BrokenChain(format!(
            "{} embedded proofs, at most {MAX_EMBEDDED_PROOFS} allowed",
            chain.proofs.len()
        )));
    }

    chain
        .root
        .verify()
        .map_err(|_| CodecError::InvalidSignature("root delegation".into()))?;

    let mut embedded = HashMap::with_capacity(chain.proofs.len());
    for proof in &chain.proofs {
        let id = content_id(proof)?;
        proof
            .verify()
            .map_err(|_| CodecError::InvalidSignature(format!("proof {id}")))?;
        embedded.insert(id, proof);
    }

    let mut walk = Walk {
        embedded: &embedded,
        heights: HashMap::with_capacity(embedded.len()),
        gaps: Vec::new(),
    };
    walk.check_link(&chain.root, 0)?;

    if walk.gaps.is_empty() {
        Ok(Verification::Verified)
    } else {
        Ok(Verification::Unverified {
            reason: walk.gaps.join("; "),
        })
    }
}

struct Walk<'a> {
    embedded: &'a HashMap<String, &'a SignedPayload>,
    /// Proofs already checked, with the length of the chain below them.
    heights: HashMap<String, usize>,
    gaps: Vec<String>,
}

impl Walk<'_> {
    /// Check `child` and everything below it. Returns the chain height
    /// under `child`.
    fn check_link(&mut self, child: &SignedPayload, depth: usize) -> Result<usize> {
        if depth > MAX_CHAIN_DEPTH {
            return Err(too_deep());
        }

        let payload = &child.payload;
        if payload.prf.is_empty() {
            for cap in payload.att.iter().filter(|c| c.resource != payload.iss) {
                self.gaps
                    .push(format!("authority over {} is not proven", cap.resource));
            }
            return Ok(0);
        }

        let embedded = self.embedded;
        let mut held = Vec::new();
        let mut complete = true;
        let mut height = 0;
        for id in &payload.prf {
            let Some(proof) = embedded.get(id).copied() else {
                self.gaps.push(format!("proof {id} is not embedded"));
                complete = false;
                continue;
            };
            if proof.payload.aud != payload.iss {
                return Err(CodecError::BrokenChain(format!(
                    "proof {id} is addressed to {}, not {}",
                    proof.payload.aud, payload.iss
                )));
            }
            held.extend(proof.payload.att.iter().cloned());

            let below = match self.heights.get(id) {
                Some(&below) => below,
                None => {
                    let below = self.check_link(proof, depth + 1)?;
                    self.heights.insert(id.clone(), below);
                    below
                }
            };
            if depth + 1 + below > MAX_CHAIN_DEPTH {
                return Err(too_deep());
            }
            height = height.max(below + 1);
        }

        if complete && let Some(cap) = uncovered(&held, &payload.att).first() {
            return Err(CodecError::BrokenChain(format!(
                "{cap} exceeds the authority of its proofs"
            )));
        }
        Ok(height)
    }
}

fn too_deep() -> CodecError {
    CodecError::BrokenChain(format!("chain deeper than {MAX_CHAIN_DEPTH}"))
}
