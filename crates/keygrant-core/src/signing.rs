//! JCS-style canonical JSON for signed requests.
//!
//! Revocation requests travel as JSON, so their signatures are computed over
//! a canonical form: object keys sorted, no insignificant whitespace, and
//! strings escaped by `serde_json`.

use crate::Result;
use serde::Serialize;
use serde_json::Value;

/// Canonicalize any serializable value.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_value(value)?;
    let mut out = String::new();
    write_canonical(&json, &mut out)?;
    Ok(out.into_bytes())
}

/// Canonicalize with one top-level field removed, typically the signature.
pub fn canonicalize_without<T: Serialize>(value: &T, field: &str) -> Result<Vec<u8>> {
    let mut json = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut json {
        map.remove(field);
    }
    let mut out = String::new();
    write_canonical(&json, &mut out)?;
    Ok(out.into_bytes())
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key], out)?;
            }
            out.push('}');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}
