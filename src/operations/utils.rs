//! Byte-slicing utilities and splitting into parts.

use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::types::{ArgumentSpec, DataKind, Part, ResolvedArgs, Value};

const CATEGORY: &str = "Utils";

pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "Split Parts",
            CATEGORY,
            DataKind::Bytes,
            DataKind::Parts,
            split_parts,
        )
        .describe("Splits the input on a delimiter, one part per piece.")
        .arg(ArgumentSpec::binary("Delimiter", "\\n"))
        .arg(ArgumentSpec::boolean("Drop empty", false)),
        OperationDescriptor::new("Take bytes", CATEGORY, DataKind::Bytes, DataKind::Bytes, take_bytes)
            .describe("Keeps a byte range of the input.")
            .arg(ArgumentSpec::number("Start", 0.0))
            .arg(ArgumentSpec::number("Length", 5.0)),
        OperationDescriptor::new("Drop bytes", CATEGORY, DataKind::Bytes, DataKind::Bytes, drop_bytes)
            .describe("Removes a byte range from the input.")
            .arg(ArgumentSpec::number("Start", 0.0))
            .arg(ArgumentSpec::number("Length", 5.0)),
    ]
}

/// Clamp `start..start+len` to the bounds of a buffer of `total` bytes.
/// Negative arguments count as zero.
fn byte_range(args: &ResolvedArgs, total: usize) -> Result<(usize, usize), OperationError> {
    let start = args.count(0)?.min(total);
    let end = start.saturating_add(args.count(1)?).min(total);
    Ok((start, end))
}

pub fn split_parts(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let data = input.as_bytes()?;
    let delimiter = args.bytes(0)?;
    let drop_empty = args.boolean(1)?;
    if delimiter.is_empty() {
        return Err(OperationError::invalid_input("Delimiter must not be empty"));
    }

    let mut pieces = Vec::new();
    let mut rest = data;
    while let Some(at) = find(rest, delimiter) {
        pieces.push(&rest[..at]);
        rest = &rest[at + delimiter.len()..];
    }
    pieces.push(rest);

    let parts = pieces
        .into_iter()
        .filter(|p| !(drop_empty && p.is_empty()))
        .enumerate()
        .map(|(i, p)| Part::new(format!("part-{}", i), p.to_vec()))
        .collect();
    Ok(Value::Parts(parts))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn take_bytes(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let data = input.as_bytes()?;
    let (start, end) = byte_range(args, data.len())?;
    Ok(Value::Bytes(data[start..end].to_vec()))
}

pub fn drop_bytes(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let data = input.as_bytes()?;
    let (start, end) = byte_range(args, data.len())?;
    let mut out = Vec::with_capacity(data.len() - (end - start));
    out.extend_from_slice(&data[..start]);
    out.extend_from_slice(&data[end..]);
    Ok(Value::Bytes(out))
}
