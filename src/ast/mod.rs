use std::collections::BTreeSet;

mod cache;
mod error;
mod evaluator;
mod parser;

pub use cache::ExpressionCache;
pub use error::*;
pub use evaluator::{Bindings, Evaluator, FREE_VARIABLE};
pub use parser::{ExpressionParser as Parser, ParserLimits};

#[derive(Debug, Clone, PartialEq)]
pub enum ASTNode {
    Number(f64),
    Identifier(String),
    UnaryOperation {
        operator: UnaryOperator,
        operand: Box<ASTNode>,
    },
    BinaryOperation {
        left: Box<ASTNode>,
        operator: Operator,
        right: Box<ASTNode>,
    },
    Group(Box<ASTNode>),
    FunctionCall {
        name: String,
        args: Vec<ASTNode>,
    },
}

impl ASTNode {
    /// Names referenced as bare identifiers (variables, parameters, constants).
    pub fn identifiers(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.walk(&mut |node| {
            if let ASTNode::Identifier(name) = node {
                names.insert(name.as_str());
            }
        });
        names
    }

    /// Names referenced in call position.
    pub fn function_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.walk(&mut |node| {
            if let ASTNode::FunctionCall { name, .. } = node {
                names.insert(name.as_str());
            }
        });
        names
    }

    /// Depth of the tree, a leaf counts as 1.
    pub fn depth(&self) -> usize {
        match self {
            ASTNode::Number(_) | ASTNode::Identifier(_) => 1,
            ASTNode::UnaryOperation { operand, .. } => 1 + operand.depth(),
            ASTNode::BinaryOperation { left, right, .. } => 1 + left.depth().max(right.depth()),
            ASTNode::Group(inner) => 1 + inner.depth(),
            ASTNode::FunctionCall { args, .. } => {
                1 + args.iter().map(ASTNode::depth).max().unwrap_or(0)
            }
        }
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ASTNode)) {
        visit(self);
        match self {
            ASTNode::Number(_) | ASTNode::Identifier(_) => {}
            ASTNode::UnaryOperation { operand, .. } => operand.walk(visit),
            ASTNode::BinaryOperation { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            ASTNode::Group(inner) => inner.walk(visit),
            ASTNode::FunctionCall { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Plus,
}

impl UnaryOperator {
    pub fn apply(&self, operand: f64) -> f64 {
        match self {
            UnaryOperator::Negate => -operand,
            UnaryOperator::Plus => operand,
        }
    }
}

impl TryFrom<&str> for UnaryOperator {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "-" => Ok(UnaryOperator::Negate),
            "+" => Ok(UnaryOperator::Plus),
            _ => Err(format!("Unknown unary operator: {}", value)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl Operator {
    /// Plain IEEE-754 arithmetic: `x / 0.0` is `inf`, `0.0 / 0.0` is `NaN`.
    pub fn apply(&self, left: f64, right: f64) -> f64 {
        match self {
            Operator::Add => left + right,
            Operator::Subtract => left - right,
            Operator::Multiply => left * right,
            Operator::Divide => left / right,
            Operator::Power => left.powf(right),
        }
    }
}

impl TryFrom<&str> for Operator {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "+" => Ok(Operator::Add),
            "-" => Ok(Operator::Subtract),
            "*" => Ok(Operator::Multiply),
            "/" => Ok(Operator::Divide),
            "**" => Ok(Operator::Power),
            _ => Err(format!("Unknown operator: {}", value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_from_str() {
        assert_eq!(Operator::try_from("**"), Ok(Operator::Power));
        assert_eq!(Operator::try_from("/"), Ok(Operator::Divide));
        assert!(Operator::try_from("%").is_err());
        assert_eq!(UnaryOperator::try_from("-"), Ok(UnaryOperator::Negate));
    }

    #[test]
    fn test_division_follows_ieee() {
        assert_eq!(Operator::Divide.apply(1.0, 0.0), f64::INFINITY);
        assert_eq!(Operator::Divide.apply(-1.0, 0.0), f64::NEG_INFINITY);
        assert!(Operator::Divide.apply(0.0, 0.0).is_nan());
        assert!(Operator::Power.apply(-8.0, 0.5).is_nan());
    }

    #[test]
    fn test_identifiers_and_function_names() {
        let ast = ASTNode::BinaryOperation {
            left: Box::new(ASTNode::FunctionCall {
                name: "sin".to_string(),
                args: vec![ASTNode::Identifier("x".to_string())],
            }),
            operator: Operator::Multiply,
            right: Box::new(ASTNode::Identifier("a".to_string())),
        };

        assert_eq!(ast.identifiers().into_iter().collect::<Vec<_>>(), ["a", "x"]);
        assert_eq!(ast.function_names().into_iter().collect::<Vec<_>>(), ["sin"]);
        assert_eq!(ast.depth(), 3);
    }
}
