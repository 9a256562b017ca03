//! Randomness. These operations are non-deterministic unless seeded.

use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::types::{ArgumentSpec, DataKind, ResolvedArgs, Value};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

const CATEGORY: &str = "Randomness";

pub fn operations() -> Vec<OperationDescriptor> {
    vec![OperationDescriptor::new(
        "Pseudo-Random Bytes",
        CATEGORY,
        DataKind::Bytes,
        DataKind::Bytes,
        pseudo_random_bytes,
    )
    .describe("Replaces the input with pseudo-random bytes. A non-empty seed makes the output repeatable.")
    .arg(ArgumentSpec::number_range("Length", 32.0, 0.0, 1_048_576.0))
    .arg(ArgumentSpec::string("Seed", ""))
    .non_deterministic()]
}

pub fn pseudo_random_bytes(_input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let mut out = vec![0u8; args.count(0)?];
    let seed = args.string(1)?;
    if seed.is_empty() {
        rand::thread_rng().fill_bytes(&mut out);
    } else {
        let mut rng = StdRng::from_seed(*blake3::hash(seed.as_bytes()).as_bytes());
        rng.fill_bytes(&mut out);
    }
    Ok(Value::Bytes(out))
}
