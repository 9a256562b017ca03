//! Engine core: data model, coercion, argument resolution, recipes,
//! planning and execution.

pub mod batch;
pub mod coercion;
pub mod config;
pub mod dish;
pub mod error;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod recipe;
pub mod registry;
pub mod resolver;
pub mod types;
