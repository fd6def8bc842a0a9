use crate::ast::{ASTNode, EvalError, ExpressionError, Parser};
use crate::functions::{self, Builtin};
use std::collections::HashMap;

/// Name of the single free variable every function is evaluated over.
pub const FREE_VARIABLE: &str = "x";

/// Values visible to an expression: the free variable plus the function's
/// fixed parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub x: f64,
    pub params: &'a HashMap<String, f64>,
}

impl<'a> Bindings<'a> {
    pub fn new(x: f64, params: &'a HashMap<String, f64>) -> Self {
        Self { x, params }
    }

    /// `x` shadows a parameter of the same name; constants come last.
    pub fn lookup(&self, name: &str) -> Result<f64, EvalError> {
        if name == FREE_VARIABLE {
            return Ok(self.x);
        }
        self.params
            .get(name)
            .copied()
            .or_else(|| functions::constant(name))
            .ok_or_else(|| EvalError::UnboundName(name.to_string()))
    }
}

/// Tree-walking evaluator over the closed builtin whitelist.
pub struct Evaluator {
    pub(crate) functions: HashMap<&'static str, Builtin>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        let mut evaluator = Self {
            functions: HashMap::new(),
        };
        functions::register_functions(&mut evaluator);
        evaluator
    }

    /// Only the `functions` module registers builtins; the set is fixed once
    /// `new` returns.
    pub(crate) fn register_function(&mut self, name: &'static str, function: Builtin) {
        self.functions.insert(name, function);
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Parses and evaluates in one go.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` if the evaluation succeeds (which may be `inf` or `NaN`).
    /// * `Err(ExpressionError)` if parsing or evaluation fails.
    pub fn evaluate_expression(
        &self,
        expression: &str,
        bindings: &Bindings<'_>,
    ) -> Result<f64, ExpressionError> {
        let ast = Parser::parse_expression(expression)?;
        Ok(self.evaluate(&ast, bindings)?)
    }

    /// Evaluates an `ASTNode` against the bindings.
    pub fn evaluate(&self, ast: &ASTNode, bindings: &Bindings<'_>) -> Result<f64, EvalError> {
        match ast {
            ASTNode::Number(n) => Ok(*n),

            ASTNode::Identifier(name) => bindings.lookup(name),

            ASTNode::UnaryOperation { operator, operand } => {
                Ok(operator.apply(self.evaluate(operand, bindings)?))
            }

            ASTNode::BinaryOperation {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left, bindings)?;
                let right_value = self.evaluate(right, bindings)?;
                Ok(operator.apply(left_value, right_value))
            }

            ASTNode::Group(inner) => self.evaluate(inner, bindings),

            ASTNode::FunctionCall { name, args } => {
                let function = self
                    .functions
                    .get(name.as_str())
                    .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;

                let values = args
                    .iter()
                    .map(|arg| self.evaluate(arg, bindings))
                    .collect::<Result<Vec<_>, _>>()?;

                function(&values).map_err(|err| match err {
                    EvalError::ArityMismatch { expected, got, .. } => EvalError::ArityMismatch {
                        function: name.clone(),
                        expected,
                        got,
                    },
                    other => other,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Arity, Operator};

    fn eval(expression: &str, x: f64, params: &[(&str, f64)]) -> Result<f64, ExpressionError> {
        let params: HashMap<String, f64> = params
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        Evaluator::new().evaluate_expression(expression, &Bindings::new(x, &params))
    }

    #[test]
    fn test_quadratic() {
        let result = eval("a * x**2 + b * x + c", 3.0, &[("a", 1.0), ("b", -2.0), ("c", 1.0)]);
        assert_eq!(result.unwrap(), 4.0);
    }

    #[test]
    fn test_simple_arithmetic() {
        assert_eq!(eval("x + 2", 1.0, &[]).unwrap(), 3.0);
        assert_eq!(eval("x - 2", 1.0, &[]).unwrap(), -1.0);
        assert_eq!(eval("x * 2", 3.0, &[]).unwrap(), 6.0);
        assert_eq!(eval("x / 2", 3.0, &[]).unwrap(), 1.5);
        assert_eq!(eval("(x + 10) * (x - 5)", 20.0, &[]).unwrap(), 450.0);
    }

    #[test]
    fn test_power_associativity_and_unary() {
        assert_eq!(eval("2 ** 3 ** 2", 0.0, &[]).unwrap(), 512.0);
        assert_eq!(eval("2 ** -1", 0.0, &[]).unwrap(), 0.5);
        assert_eq!(eval("-x ** 2", 3.0, &[]).unwrap(), 9.0);
        assert_eq!(eval("-(x ** 2)", 3.0, &[]).unwrap(), -9.0);
        assert_eq!(eval("+-+x", 3.0, &[]).unwrap(), -3.0);
    }

    #[test]
    fn test_division_by_zero_is_not_an_error() {
        assert_eq!(eval("1/x", 0.0, &[]).unwrap(), f64::INFINITY);
        assert!(eval("x/x", 0.0, &[]).unwrap().is_nan());
    }

    #[test]
    fn test_domain_errors_follow_ieee() {
        assert!(eval("sqrt(x)", -1.0, &[]).unwrap().is_nan());
        assert_eq!(eval("log(x)", 0.0, &[]).unwrap(), f64::NEG_INFINITY);
        assert!(eval("log(x)", -1.0, &[]).unwrap().is_nan());
    }

    #[test]
    fn test_sine_matches_std() {
        assert_eq!(eval("sin(x)", 2.0, &[]).unwrap(), 2.0_f64.sin());
        assert_eq!(eval("math.sin(x)", 2.0, &[]).unwrap(), 2.0_f64.sin());
    }

    #[test]
    fn test_constants() {
        assert_eq!(eval("pi", 0.0, &[]).unwrap(), std::f64::consts::PI);
        assert_eq!(eval("e ** x", 1.0, &[]).unwrap(), std::f64::consts::E);
        assert_eq!(eval("math.tau", 0.0, &[]).unwrap(), std::f64::consts::TAU);
    }

    #[test]
    fn test_lookup_order() {
        // x wins over a parameter named x, parameters win over constants
        assert_eq!(eval("x", 1.0, &[("x", 5.0)]).unwrap(), 1.0);
        assert_eq!(eval("e", 0.0, &[("e", 2.0)]).unwrap(), 2.0);
    }

    #[test]
    fn test_unbound_name() {
        assert_eq!(
            eval("a * x", 1.0, &[]),
            Err(ExpressionError::Eval(EvalError::UnboundName("a".to_string())))
        );
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            eval("eval(x)", 1.0, &[]),
            Err(ExpressionError::Eval(EvalError::UnknownFunction(
                "eval".to_string()
            )))
        );
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(
            eval("sin(x, 2)", 1.0, &[]),
            Err(ExpressionError::Eval(EvalError::ArityMismatch {
                function: "sin".to_string(),
                expected: Arity::Exact(1),
                got: 2,
            }))
        );
        assert_eq!(
            eval("log(x, 2, 3)", 1.0, &[]),
            Err(ExpressionError::Eval(EvalError::ArityMismatch {
                function: "log".to_string(),
                expected: Arity::Range(1, 2),
                got: 3,
            }))
        );
    }

    #[test]
    fn test_nested_calls() {
        let result = eval("pow(abs(x), 2) + hypot(3, 4) + log(8, 2)", -2.0, &[]).unwrap();
        assert!((result - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_expression_surfaces_parse_error() {
        assert!(matches!(eval("x +", 1.0, &[]), Err(ExpressionError::Parse(_))));
    }

    #[test]
    fn test_direct_ast_binary_operation() {
        let evaluator = Evaluator::new();
        let params = HashMap::from([("k".to_string(), 50.0)]);
        let ast = ASTNode::BinaryOperation {
            left: Box::new(ASTNode::Identifier("k".to_string())),
            operator: Operator::Add,
            right: Box::new(ASTNode::Number(20.0)),
        };
        let result = evaluator.evaluate(&ast, &Bindings::new(0.0, &params)).unwrap();
        assert_eq!(result, 70.0);
    }

    #[test]
    fn test_deterministic() {
        let params = HashMap::from([("a".to_string(), 0.3)]);
        let ast = Parser::parse_expression("sin(a * x) / (1 + x ** 2)").unwrap();
        let evaluator = Evaluator::new();
        let first = evaluator.evaluate(&ast, &Bindings::new(1.7, &params)).unwrap();
        let second = evaluator.evaluate(&ast, &Bindings::new(1.7, &params)).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }
}
