//! Hashing operations. Digests are rendered as lowercase hex.

use super::encoding::hex_string;
use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::types::{ArgumentSpec, ByteLabel, DataKind, ResolvedArgs, Value};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

const CATEGORY: &str = "Hashing";

pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("SHA2", CATEGORY, DataKind::Bytes, DataKind::Text, sha2_digest)
            .describe("SHA-2 digest of the input.")
            .arg(ArgumentSpec::choice("Size", &["256", "224", "384", "512"])),
        OperationDescriptor::new("BLAKE3", CATEGORY, DataKind::Bytes, DataKind::Text, blake3_digest)
            .describe("BLAKE3 digest of the input, optionally keyed, with extendable output length.")
            .arg(ArgumentSpec::number_range("Size", 32.0, 1.0, 1024.0))
            .arg(ArgumentSpec::labeled(
                "Key",
                &[ByteLabel::Utf8, ByteLabel::Hex, ByteLabel::Base64],
                "",
            )),
    ]
}

pub fn sha2_digest(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let bytes = input.as_bytes()?;
    let digest = match args.string(0)? {
        "224" => hex_string(&Sha224::digest(bytes)),
        "384" => hex_string(&Sha384::digest(bytes)),
        "512" => hex_string(&Sha512::digest(bytes)),
        _ => hex_string(&Sha256::digest(bytes)),
    };
    Ok(Value::Text(digest))
}

pub fn blake3_digest(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let bytes = input.as_bytes()?;
    let size = args.count(0)?;
    let key = args.bytes(1)?;

    let mut hasher = if key.is_empty() {
        blake3::Hasher::new()
    } else {
        let key: [u8; 32] = key.try_into().map_err(|_| {
            OperationError::invalid_input(format!(
                "BLAKE3 key must be 32 bytes, got {}",
                key.len()
            ))
        })?;
        blake3::Hasher::new_keyed(&key)
    };
    hasher.update(bytes);

    let mut out = vec![0u8; size];
    hasher.finalize_xof().fill(&mut out);
    Ok(Value::Text(hex_string(&out)))
}
