//! Run journal: BLAKE3 output fingerprints and an append-only JSONL
//! provenance log of recipe runs.

pub mod eventlog;
pub mod hasher;

pub use eventlog::Journal;
