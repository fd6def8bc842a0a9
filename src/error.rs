//! Error types for the function registry

use crate::ast::{EvalError, ExpressionError, ParseError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("function not found: {0}")]
    NotFound(String),

    #[error("function name already exists: {0}")]
    DuplicateName(String),

    #[error("invalid function name: {0}")]
    InvalidName(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(#[from] ExpressionError),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("evaluation cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    pub fn not_found(what: impl ToString) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn corrupt_snapshot(msg: impl Into<String>) -> Self {
        Self::CorruptSnapshot(msg.into())
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::InvalidExpression(ExpressionError::Parse(err))
    }
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        Self::InvalidExpression(ExpressionError::Eval(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
