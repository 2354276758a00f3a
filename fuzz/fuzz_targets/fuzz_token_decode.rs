//! Fuzz target for delegation token decoding.
//!
//! Covers the prefixed archive, bare base64 and legacy JSON paths, plus
//! raw CBOR bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = keygrant_codec::decode_bytes(data);

    if let Ok(text) = std::str::from_utf8(data)
        && let Ok(decoded) = keygrant_codec::decode(text)
        && decoded.delegation.is_signed()
    {
        // Anything that decodes as a signed archive must re-encode.
        let _ = keygrant_codec::encode(&decoded.delegation);
    }
});
