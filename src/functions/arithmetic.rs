use crate::ast::Evaluator;
use mathfn_macros::builtin_fn;

pub fn register(evaluator: &mut Evaluator) {
    evaluator.register_function("abs", abs);
    evaluator.register_function("fabs", fabs);
    evaluator.register_function("floor", floor);
    evaluator.register_function("ceil", ceil);
    evaluator.register_function("trunc", trunc);
    evaluator.register_function("fmod", fmod);
    evaluator.register_function("copysign", copysign);
    evaluator.register_function("hypot", hypot);
}

#[builtin_fn]
fn abs(x: f64) -> f64 {
    x.abs()
}

#[builtin_fn]
fn fabs(x: f64) -> f64 {
    x.abs()
}

#[builtin_fn]
fn floor(x: f64) -> f64 {
    x.floor()
}

#[builtin_fn]
fn ceil(x: f64) -> f64 {
    x.ceil()
}

#[builtin_fn]
fn trunc(x: f64) -> f64 {
    x.trunc()
}

/// Remainder with the sign of `x`, like C's `fmod`.
#[builtin_fn]
fn fmod(x: f64, y: f64) -> f64 {
    x % y
}

#[builtin_fn]
fn copysign(x: f64, y: f64) -> f64 {
    x.copysign(y)
}

#[builtin_fn]
fn hypot(x: f64, y: f64) -> f64 {
    x.hypot(y)
}
