use std::fmt;
use thiserror::Error;

/// Syntax error with the 0-based byte offset it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Number of arguments a builtin accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::Range(min, max) => write!(f, "{} to {}", min, max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UnboundName(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{function}' takes {expected} argument(s), got {got}")]
    ArityMismatch {
        function: String,
        expected: Arity,
        got: usize,
    },
}

/// Anything that can go wrong turning an expression string into a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
