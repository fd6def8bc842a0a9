use crate::ast::{Arity, EvalError, Evaluator};
use mathfn_macros::builtin_fn;

pub fn register(evaluator: &mut Evaluator) {
    evaluator.register_function("exp", exp);
    evaluator.register_function("expm1", expm1);
    evaluator.register_function("log", log);
    evaluator.register_function("log10", log10);
    evaluator.register_function("log2", log2);
    evaluator.register_function("log1p", log1p);
    evaluator.register_function("sqrt", sqrt);
    evaluator.register_function("cbrt", cbrt);
    evaluator.register_function("pow", pow);
}

#[builtin_fn]
fn exp(x: f64) -> f64 {
    x.exp()
}

#[builtin_fn]
fn expm1(x: f64) -> f64 {
    x.exp_m1()
}

/// `log(x)` is the natural logarithm, `log(x, base)` divides by `ln(base)`.
pub fn log(args: &[f64]) -> Result<f64, EvalError> {
    match *args {
        [x] => Ok(x.ln()),
        [x, base] => Ok(x.ln() / base.ln()),
        _ => Err(EvalError::ArityMismatch {
            function: "log".to_string(),
            expected: Arity::Range(1, 2),
            got: args.len(),
        }),
    }
}

#[builtin_fn]
fn log10(x: f64) -> f64 {
    x.log10()
}

#[builtin_fn]
fn log2(x: f64) -> f64 {
    x.log2()
}

#[builtin_fn]
fn log1p(x: f64) -> f64 {
    x.ln_1p()
}

#[builtin_fn]
fn sqrt(x: f64) -> f64 {
    x.sqrt()
}

#[builtin_fn]
fn cbrt(x: f64) -> f64 {
    x.cbrt()
}

#[builtin_fn]
fn pow(x: f64, y: f64) -> f64 {
    x.powf(y)
}
