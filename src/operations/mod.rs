//! Built-in operations.
//!
//! Each module registers descriptors for one category. Transforms are free
//! functions of `(&Value, &ResolvedArgs)` so they can be tested directly.

pub mod archive;
pub mod arithmetic;
pub mod compression;
pub mod encoding;
pub mod hashing;
pub mod json;
pub mod random;
pub mod text;
pub mod utils;

use crate::core::error::OperationError;
use crate::core::registry::{OperationDescriptor, OperationRegistry};
use std::io::Read;

/// Largest buffer a decoder or archive entry may expand into (256 MiB).
pub const MAX_EXPANDED_SIZE: u64 = 256 << 20;

/// Read `reader` to the end, failing recoverably once more than `limit`
/// bytes come out. Nothing is preallocated from sizes the input declares.
pub(crate) fn read_bounded(
    reader: impl Read,
    limit: u64,
    what: &str,
) -> Result<Vec<u8>, OperationError> {
    let mut out = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| OperationError::invalid_input(format!("Invalid {}: {}", what, e)))?;
    if out.len() as u64 > limit {
        return Err(OperationError::invalid_input(format!(
            "{} expands beyond {} bytes",
            what, limit
        )));
    }
    Ok(out)
}

/// Register the whole built-in catalog.
pub fn register_builtins(registry: &mut OperationRegistry) {
    let groups = [
        encoding::operations(),
        hashing::operations(),
        compression::operations(),
        archive::operations(),
        text::operations(),
        arithmetic::operations(),
        json::operations(),
        utils::operations(),
        random::operations(),
    ];
    for op in groups.into_iter().flatten() {
        add(registry, op);
    }
}

fn add(registry: &mut OperationRegistry, op: OperationDescriptor) {
    if let Err(e) = registry.register(op) {
        log::error!("built-in operation rejected: {}", e);
    }
}
