//! Token encoding and format-detecting decoding.

use tracing::debug;

use crate::archive::Chain;
use crate::base::Base;
use crate::delegation::{Delegation, Format, Verification};
use crate::legacy::LegacyToken;
use crate::verify::verify_chain;
use crate::{CodecError, Result};

/// A decoded token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub delegation: Delegation,
    pub format: Format,
    pub verification: Verification,
}

/// Encode a signed delegation with the default multibase (`m`).
pub fn encode(delegation: &Delegation) -> Result<String> {
    encode_with(delegation, Base::default())
}

/// Encode a signed delegation with an explicit multibase.
pub fn encode_with(delegation: &Delegation, base: Base) -> Result<String> {
    let chain = delegation.chain.as_ref().ok_or_else(|| {
        CodecError::UnsupportedFormat("unsigned delegation has no binary archive".into())
    })?;
    Ok(base.encode(&chain.to_cbor()?))
}

/// Encode as legacy JSON, the only form an unsigned delegation has.
pub fn encode_legacy(delegation: &Delegation) -> Result<String> {
    serde_json::to_string(&LegacyToken::from_delegation(delegation))
        .map_err(|e| CodecError::Core(e.into()))
}

/// Decode a text token.
///
/// Tried in order: multibase-prefixed archive, unprefixed base64 or
/// base64url archive, legacy JSON.
pub fn decode(token: &str) -> Result<Decoded> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CodecError::UnsupportedFormat("empty token".into()));
    }

    let mut chars = token.chars();
    if let Some(base) = chars.next().and_then(Base::from_prefix)
        && let Some(bytes) = base.decode_unprefixed(chars.as_str())
        && let Ok(chain) = Chain::from_cbor(&bytes)
    {
        return finish(chain, base.into());
    }

    for base in [Base::Base64, Base::Base64Url] {
        if let Some(bytes) = base.decode_unprefixed(token)
            && let Ok(chain) = Chain::from_cbor(&bytes)
        {
            return finish(chain, Format::Raw);
        }
    }

    if token.starts_with('{') {
        let delegation = LegacyToken::parse(token)?.into_delegation()?;
        debug!(content_id = %delegation.content_id, "Decoded legacy JSON token");
        return Ok(Decoded {
            delegation,
            format: Format::LegacyJson,
            verification: Verification::Unverified {
                reason: "legacy JSON tokens carry no signature".into(),
            },
        });
    }

    Err(CodecError::UnsupportedFormat(
        "not a multibase archive, raw archive or legacy JSON".into(),
    ))
}

/// Decode bytes: a raw CBOR archive, or any text form [`decode`] accepts.
pub fn decode_bytes(bytes: &[u8]) -> Result<Decoded> {
    if let Ok(chain) = Chain::from_cbor(bytes) {
        return finish(chain, Format::Raw);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CodecError::UnsupportedFormat("binary data is not an archive".into()))?;
    decode(text)
}

fn finish(chain: Chain, format: Format) -> Result<Decoded> {
    let verification = verify_chain(&chain)?;
    let delegation = Delegation::from_chain(chain)?;
    debug!(
        content_id = %delegation.content_id,
        format = %format,
        verified = verification.is_verified(),
        "Decoded delegation archive"
    );
    Ok(Decoded {
        delegation,
        format,
        verification,
    })
}
