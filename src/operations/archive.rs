//! Archive operations: unpack zip and tar into parts, join parts back.
//!
//! Entry sizes declared in archive headers are never trusted; the unpacked
//! total is capped at [`MAX_EXPANDED_SIZE`].

use super::{read_bounded, MAX_EXPANDED_SIZE};
use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::types::{ArgumentSpec, DataKind, Part, ResolvedArgs, Value};
use std::io::Cursor;

const CATEGORY: &str = "Archive";

pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new("Unzip", CATEGORY, DataKind::Bytes, DataKind::Parts, unzip)
            .describe("Extracts the files of a zip archive, one part per file.")
            .arg(ArgumentSpec::boolean("Include directories", false)),
        OperationDescriptor::new("Untar", CATEGORY, DataKind::Bytes, DataKind::Parts, untar)
            .describe("Extracts the regular files of a tar archive, one part per file."),
        OperationDescriptor::new(
            "Concatenate Parts",
            CATEGORY,
            DataKind::Parts,
            DataKind::Bytes,
            concatenate_parts,
        )
        .describe("Joins parts in order with an optional separator.")
        .arg(ArgumentSpec::binary("Separator", "")),
    ]
}

fn invalid(format: &str, e: impl std::fmt::Display) -> OperationError {
    OperationError::invalid_input(format!("Invalid {} archive: {}", format, e))
}

pub fn unzip(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let include_dirs = args.boolean(0)?;
    let mut archive =
        zip::ZipArchive::new(Cursor::new(input.as_bytes()?)).map_err(|e| invalid("zip", e))?;

    let mut parts = Vec::with_capacity(archive.len());
    let mut budget = MAX_EXPANDED_SIZE;
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|e| invalid("zip", e))?;
        if file.is_dir() {
            if include_dirs {
                parts.push(Part::new(file.name(), Vec::new()));
            }
            continue;
        }
        let data = read_bounded(&mut file, budget, "zip archive")?;
        budget -= data.len() as u64;
        parts.push(Part::new(file.name(), data));
    }
    Ok(Value::Parts(parts))
}

pub fn untar(input: &Value, _args: &ResolvedArgs) -> Result<Value, OperationError> {
    let mut archive = tar::Archive::new(input.as_bytes()?);
    let mut parts = Vec::new();
    let mut budget = MAX_EXPANDED_SIZE;
    for entry in archive.entries().map_err(|e| invalid("tar", e))? {
        let mut entry = entry.map_err(|e| invalid("tar", e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| invalid("tar", e))?
            .to_string_lossy()
            .into_owned();
        let data = read_bounded(&mut entry, budget, "tar archive")?;
        budget -= data.len() as u64;
        parts.push(Part::new(name, data));
    }
    Ok(Value::Parts(parts))
}

pub fn concatenate_parts(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let separator = args.bytes(0)?;
    let parts = input.as_parts()?;
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.data.len() + separator.len()).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(separator);
        }
        out.extend_from_slice(&part.data);
    }
    Ok(Value::Bytes(out))
}
