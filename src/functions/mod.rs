pub mod arithmetic;
pub mod exponential;
pub mod trigonometric;

use crate::ast::{EvalError, Evaluator};
use std::f64::consts;

/// Signature every whitelisted function is compiled down to.
pub type Builtin = fn(&[f64]) -> Result<f64, EvalError>;

/// Named constants resolvable as bare identifiers.
pub const CONSTANTS: &[(&str, f64)] = &[
    ("pi", consts::PI),
    ("e", consts::E),
    ("tau", consts::TAU),
    ("inf", f64::INFINITY),
    ("nan", f64::NAN),
];

pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS
        .iter()
        .find(|(constant, _)| *constant == name)
        .map(|(_, value)| *value)
}

pub fn register_functions(evaluator: &mut Evaluator) {
    arithmetic::register(evaluator);
    exponential::register(evaluator);
    trigonometric::register(evaluator);
}
