//! Named single-variable math functions: a safe expression language, an
//! in-memory registry indexed by id and name, and snapshot persistence.

pub mod ast;
pub mod config;
pub mod error;
pub mod functions;
pub mod model;
pub mod registry;
pub mod store;

use std::collections::HashMap;

pub use ast::{Bindings, Evaluator, ExpressionError, Parser};
pub use config::RegistryConfig;
pub use error::{Error, Result};
pub use model::{Function, FunctionRef, FunctionUpdate};
pub use registry::Registry;
pub use store::{JsonFileStore, MemoryStore, SnapshotStore};

/// Evaluates `expression` once at `x`, without a registry.
pub fn evaluate_expression(
    expression: &str,
    x: f64,
    params: &HashMap<String, f64>,
) -> std::result::Result<f64, ExpressionError> {
    Evaluator::new().evaluate_expression(expression, &Bindings::new(x, params))
}
