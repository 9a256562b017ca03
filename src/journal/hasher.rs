//! BLAKE3 fingerprints of dish values, as recorded in the run journal.

use crate::core::types::Value;

/// Hash a value's kind tag and canonical content. Equal values of the same
/// kind always hash equal; the same bytes under different kinds do not.
pub fn hash_value(value: &Value) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(value.kind().to_string().as_bytes());
    hasher.update(b"\0");
    match value {
        Value::Text(s) | Value::Html(s) => {
            hasher.update(s.as_bytes());
        }
        Value::Bytes(b) => {
            hasher.update(b);
        }
        Value::Number(n) => {
            hasher.update(&n.to_bits().to_le_bytes());
        }
        Value::Json(json) => {
            hasher.update(json.to_string().as_bytes());
        }
        Value::Parts(parts) => {
            for part in parts {
                hasher.update(part.name.as_bytes());
                hasher.update(b"\0");
                hasher.update(&(part.data.len() as u64).to_le_bytes());
                hasher.update(&part.data);
            }
        }
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}
