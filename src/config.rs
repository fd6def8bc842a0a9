//! Layered settings: built-in defaults, then `mathfn.toml`, then `MATHFN_*`
//! environment variables.

use crate::ast::ParserLimits;
use crate::error::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "mathfn.toml";
pub const ENV_PREFIX: &str = "MATHFN_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Snapshot file used by the JSON store.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Parsed expressions kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_max_expression_len")]
    pub max_expression_len: usize,

    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Deepest expression tree accepted; operator chains count too.
    #[serde(default = "default_max_ast_depth")]
    pub max_ast_depth: usize,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("functions.json")
}

fn default_cache_capacity() -> usize {
    256
}

fn default_max_expression_len() -> usize {
    ParserLimits::default().max_expression_len
}

fn default_max_nesting_depth() -> usize {
    ParserLimits::default().max_nesting_depth
}

fn default_max_ast_depth() -> usize {
    ParserLimits::default().max_ast_depth
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            cache_capacity: default_cache_capacity(),
            max_expression_len: default_max_expression_len(),
            max_nesting_depth: default_max_nesting_depth(),
            max_ast_depth: default_max_ast_depth(),
        }
    }
}

impl RegistryConfig {
    /// Loads `mathfn.toml` from the working directory (if present) and the
    /// environment on top of the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn parser_limits(&self) -> ParserLimits {
        ParserLimits {
            max_expression_len: self.max_expression_len,
            max_nesting_depth: self.max_nesting_depth,
            max_ast_depth: self.max_ast_depth,
        }
    }
}
