use crate::ast::Evaluator;
use mathfn_macros::builtin_fn;

pub fn register(evaluator: &mut Evaluator) {
    evaluator.register_function("sin", sin);
    evaluator.register_function("cos", cos);
    evaluator.register_function("tan", tan);
    evaluator.register_function("asin", asin);
    evaluator.register_function("acos", acos);
    evaluator.register_function("atan", atan);
    evaluator.register_function("atan2", atan2);
    evaluator.register_function("sinh", sinh);
    evaluator.register_function("cosh", cosh);
    evaluator.register_function("tanh", tanh);
    evaluator.register_function("asinh", asinh);
    evaluator.register_function("acosh", acosh);
    evaluator.register_function("atanh", atanh);
    evaluator.register_function("degrees", degrees);
    evaluator.register_function("radians", radians);
}

#[builtin_fn]
fn sin(x: f64) -> f64 {
    x.sin()
}

#[builtin_fn]
fn cos(x: f64) -> f64 {
    x.cos()
}

#[builtin_fn]
fn tan(x: f64) -> f64 {
    x.tan()
}

#[builtin_fn]
fn asin(x: f64) -> f64 {
    x.asin()
}

#[builtin_fn]
fn acos(x: f64) -> f64 {
    x.acos()
}

#[builtin_fn]
fn atan(x: f64) -> f64 {
    x.atan()
}

/// Argument order follows the math library: `atan2(y, x)`.
#[builtin_fn]
fn atan2(y: f64, x: f64) -> f64 {
    y.atan2(x)
}

#[builtin_fn]
fn sinh(x: f64) -> f64 {
    x.sinh()
}

#[builtin_fn]
fn cosh(x: f64) -> f64 {
    x.cosh()
}

#[builtin_fn]
fn tanh(x: f64) -> f64 {
    x.tanh()
}

#[builtin_fn]
fn asinh(x: f64) -> f64 {
    x.asinh()
}

#[builtin_fn]
fn acosh(x: f64) -> f64 {
    x.acosh()
}

#[builtin_fn]
fn atanh(x: f64) -> f64 {
    x.atanh()
}

#[builtin_fn]
fn degrees(x: f64) -> f64 {
    x.to_degrees()
}

#[builtin_fn]
fn radians(x: f64) -> f64 {
    x.to_radians()
}
