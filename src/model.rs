use crate::ast::FREE_VARIABLE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Name of the value a function produces.
pub const OUTPUT: &str = "y";

/// A named function of `x`: an expression plus fixed parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub id: String,
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub params: HashMap<String, f64>,
}

impl Function {
    /// Every function takes exactly the free variable.
    pub fn inputs(&self) -> &'static [&'static str] {
        &[FREE_VARIABLE]
    }

    pub fn outputs(&self) -> &'static [&'static str] {
        &[OUTPUT]
    }
}

/// Addresses a function either by its generated id or by its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FunctionRef {
    Id(String),
    Name(String),
}

impl FunctionRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRef::Id(id) => write!(f, "id '{}'", id),
            FunctionRef::Name(name) => write!(f, "name '{}'", name),
        }
    }
}

impl From<&Function> for FunctionRef {
    fn from(function: &Function) -> Self {
        Self::Id(function.id.clone())
    }
}

/// Fields to change on an existing function. `None` leaves a field as is;
/// `params` replaces the whole map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionUpdate {
    pub name: Option<String>,
    pub expression: Option<String>,
    pub params: Option<HashMap<String, f64>>,
}

impl FunctionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn params(mut self, params: HashMap<String, f64>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.expression.is_none() && self.params.is_none()
    }
}
