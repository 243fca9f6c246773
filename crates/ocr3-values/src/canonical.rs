//! Canonical serialization and fingerprinting of [`Value`]s (RFC 8785-class).
//!
//! The canonical form is the wire representation rendered as compact JSON
//! with:
//! - object keys ordered by UTF-16 code units (RFC 8785 §3.2.3)
//! - integer-valued floats written as integers; NaN/Infinity rejected
//!
//! A [`Fingerprint`] is the SHA-256 of that form. Two structurally equal
//! values fingerprint identically no matter how their maps were built.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{Result, ValueError};
use crate::value::Value;
use crate::wire::to_wire;

/// SHA-256 over the canonical encoding of a value.
///
/// Ordered by raw bytes, which is the tie-break used wherever several
/// candidates share a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Full lower-case hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form (first 12 hex chars), for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Write `value` as compact JSON with object keys in UTF-16 code unit order
/// (RFC 8785 §3.2.3).
///
/// `serde_json::Map` iterates in its own key order, so objects are rendered
/// here rather than rebuilt and handed to `to_string`.
fn write_sorted(value: &serde_json::Value, out: &mut String) -> Result<()> {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            for (i, (key, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_sorted(v, out)?;
            }
            out.push('}');
        }
        serde_json::Value::Array(arr) => {
            out.push('[');
            for (i, v) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_sorted(v, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// Normalize numbers: integer-valued floats → integer repr; reject NaN/Infinity.
fn normalize_numbers(value: &serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map.iter() {
                normalized.insert(k.clone(), normalize_numbers(v)?);
            }
            Ok(serde_json::Value::Object(normalized))
        }
        serde_json::Value::Array(arr) => Ok(serde_json::Value::Array(
            arr.iter().map(normalize_numbers).collect::<Result<Vec<_>>>()?,
        )),
        serde_json::Value::Number(n) if !(n.is_i64() || n.is_u64()) => {
            let Some(f) = n.as_f64() else {
                return Ok(serde_json::Value::Number(n.clone()));
            };
            if !f.is_finite() {
                return Err(ValueError::NonFiniteFloat);
            }
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(serde_json::Value::Number(serde_json::Number::from(f as i64)))
            } else {
                Ok(serde_json::Value::Number(n.clone()))
            }
        }
        other => Ok(other.clone()),
    }
}

/// Render a value in canonical form: wire shape → normalize numbers → compact JSON with sorted keys.
pub fn canonical_json(value: &Value) -> Result<String> {
    let wire = serde_json::to_value(to_wire(value)?)?;
    let normalized = normalize_numbers(&wire)?;
    let mut out = String::new();
    write_sorted(&normalized, &mut out)?;
    Ok(out)
}

/// Compute the SHA-256 fingerprint of a value's canonical form.
pub fn fingerprint(value: &Value) -> Result<Fingerprint> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(Fingerprint(hasher.finalize().into()))
}
