use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::{IpcError, Result};

type HmacSha256 = Hmac<Sha256>;

const HMAC_FIELD: &str = "_hmac";

/// Recursively sort object keys so serialization is deterministic regardless
/// of insertion order (§6 canonical serialization).
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Canonical form: keys sorted, two-space indent, LF line endings.
pub fn canonicalize(value: &Value) -> Result<String> {
    let sorted = sort_keys(value);
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(&sorted, &mut ser)?;
    let text = String::from_utf8_lossy(&buf).replace("\r\n", "\n");
    Ok(text)
}

fn hmac_hex(secret: &[u8], message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Sign a JSON document: canonicalize it (without any existing `_hmac`),
/// then attach the computed signature as `_hmac`.
pub fn sign(value: &Value, secret: &[u8]) -> Result<Value> {
    let mut without_hmac = value.clone();
    if let Value::Object(map) = &mut without_hmac {
        map.remove(HMAC_FIELD);
    }

    let canonical = canonicalize(&without_hmac)?;
    let signature = hmac_hex(secret, &canonical);

    let mut signed = without_hmac;
    if let Value::Object(map) = &mut signed {
        map.insert(HMAC_FIELD.to_string(), Value::String(signature));
    }
    Ok(signed)
}

/// Verify a signed document: recompute the HMAC over the document with
/// `_hmac` removed and compare. Returns the document with `_hmac` stripped.
pub fn verify(value: &Value, secret: &[u8]) -> Result<Value> {
    let Value::Object(map) = value else {
        return Err(IpcError::MissingHmac);
    };

    let claimed = map
        .get(HMAC_FIELD)
        .and_then(Value::as_str)
        .ok_or(IpcError::MissingHmac)?
        .to_string();

    let mut without_hmac = value.clone();
    if let Value::Object(map) = &mut without_hmac {
        map.remove(HMAC_FIELD);
    }

    let canonical = canonicalize(&without_hmac)?;
    let expected = hmac_hex(secret, &canonical);

    if constant_time_eq(expected.as_bytes(), claimed.as_bytes()) {
        Ok(without_hmac)
    } else {
        Err(IpcError::HmacMismatch("signature did not match".to_string()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
