//! Parsing arbitrary text as a DID must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str::FromStr;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data)
        && let Ok(did) = keygrant_core::Did::from_str(input)
    {
        // A parsed DID must render back to the same text.
        assert_eq!(did.to_string(), input);
    }
});
