//! Multibase text encodings for delegation archives.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// A multibase alphabet. Output is never padded; input may be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Base {
    /// RFC 4648 base64, prefix `m`.
    #[default]
    Base64,
    /// RFC 4648 base64url, prefix `u`.
    Base64Url,
}

impl Base {
    pub fn prefix(self) -> char {
        match self {
            Self::Base64 => 'm',
            Self::Base64Url => 'u',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'm' => Some(Self::Base64),
            'u' => Some(Self::Base64Url),
            _ => None,
        }
    }

    /// Prefixed text for `bytes`.
    pub fn encode(self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(1 + bytes.len().div_ceil(3) * 4);
        out.push(self.prefix());
        self.engine().encode_string(bytes, &mut out);
        out
    }

    /// Decode unprefixed text in this alphabet.
    pub fn decode_unprefixed(self, text: &str) -> Option<Vec<u8>> {
        self.engine().decode(text.trim_end()).ok()
    }

    fn engine(self) -> &'static GeneralPurpose {
        match self {
            Self::Base64 => &STANDARD,
            Self::Base64Url => &URL_SAFE,
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 => f.write_str("base64"),
            Self::Base64Url => f.write_str("base64url"),
        }
    }
}

impl FromStr for Base {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base64" | "m" => Ok(Self::Base64),
            "base64url" | "u" => Ok(Self::Base64Url),
            other => Err(format!("unknown multibase encoding: {other}")),
        }
    }
}
