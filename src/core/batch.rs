//! Parallel batch baking: one recipe, many inputs.
//!
//! Each input gets its own run and dish chain; runs share only the engine,
//! the recipe's descriptors and the journal.

use super::dish::Dish;
use super::executor::{Engine, RunOptions};
use super::recipe::Recipe;
use super::types::RunReport;
use rayon::prelude::*;

/// A named input for a batch.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub name: String,
    pub dish: Dish,
}

/// Run every input through `recipe`, in parallel. Reports come back in
/// input order.
pub fn bake_all(
    engine: &Engine,
    recipe: &Recipe,
    inputs: Vec<BatchInput>,
    options: &RunOptions,
) -> Vec<(String, RunReport)> {
    log::info!("batch: {} input(s), {} step(s)", inputs.len(), recipe.len());
    inputs
        .into_par_iter()
        .map(|input| {
            let report = engine.execute(recipe, input.dish, options);
            (input.name, report)
        })
        .collect()
}
