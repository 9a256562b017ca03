//! Bakery: a typed recipe engine.
//!
//! A recipe is an ordered list of operations. Each step receives the dish
//! produced by the previous one, converted to the kind the operation
//! declares. Operations that reject their input report in-band and the run
//! continues; argument and conversion failures abort it.

pub mod cli;
pub mod core;
pub mod journal;
pub mod operations;
