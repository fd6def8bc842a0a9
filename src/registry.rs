//! Function registry
//!
//! Functions are indexed both by generated id and by unique name. Every
//! mutation takes the single write lock, persists the full candidate snapshot
//! and only then commits it to memory, so readers see either the state before
//! or after a mutation and a failed save changes nothing.

use crate::ast::{ASTNode, Bindings, Evaluator, ExpressionCache, FREE_VARIABLE};
use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::functions;
use crate::model::{Function, FunctionRef, FunctionUpdate};
use crate::store::{JsonFileStore, SnapshotStore};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Both indices; kept consistent by only ever changing them together.
#[derive(Debug, Default)]
struct Index {
    by_id: HashMap<String, Function>,
    by_name: HashMap<String, String>,
}

impl Index {
    fn from_snapshot(functions: Vec<Function>, cache: &ExpressionCache) -> Result<Self> {
        let mut index = Index::default();
        for function in functions {
            validate_name(&function.name).map_err(|err| Error::corrupt_snapshot(err.to_string()))?;
            if index.by_id.contains_key(&function.id) {
                return Err(Error::corrupt_snapshot(format!(
                    "duplicate id '{}'",
                    function.id
                )));
            }
            if index.by_name.contains_key(&function.name) {
                return Err(Error::corrupt_snapshot(format!(
                    "duplicate name '{}'",
                    function.name
                )));
            }
            cache.get_or_parse(&function.expression).map_err(|err| {
                Error::corrupt_snapshot(format!(
                    "function '{}' has an invalid expression: {}",
                    function.name, err
                ))
            })?;
            index.insert(function);
        }
        Ok(index)
    }

    fn resolve(&self, target: &FunctionRef) -> Result<&Function> {
        let function = match target {
            FunctionRef::Id(id) => self.by_id.get(id),
            FunctionRef::Name(name) => self.by_name.get(name).and_then(|id| self.by_id.get(id)),
        };
        function.ok_or_else(|| Error::not_found(target))
    }

    fn insert(&mut self, function: Function) {
        self.by_name.insert(function.name.clone(), function.id.clone());
        self.by_id.insert(function.id.clone(), function);
    }

    fn remove(&mut self, id: &str) -> Option<Function> {
        let function = self.by_id.remove(id)?;
        self.by_name.remove(&function.name);
        Some(function)
    }

    fn snapshot(&self) -> Vec<Function> {
        self.by_id.values().cloned().collect()
    }

    /// The snapshot as it would look with `function` stored under its id.
    fn snapshot_with(&self, function: &Function) -> Vec<Function> {
        let mut snapshot: Vec<Function> = self
            .by_id
            .values()
            .filter(|existing| existing.id != function.id)
            .cloned()
            .collect();
        snapshot.push(function.clone());
        snapshot
    }

    fn snapshot_without(&self, id: &str) -> Vec<Function> {
        self.by_id
            .values()
            .filter(|existing| existing.id != id)
            .cloned()
            .collect()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("name must not be empty".to_string()));
    }
    Ok(())
}

fn validate_params(params: &HashMap<String, f64>) -> Result<()> {
    for (name, value) in params {
        if name.is_empty() {
            return Err(Error::InvalidParameter(
                "parameter name must not be empty".to_string(),
            ));
        }
        if !value.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "parameter '{}' must be a finite number, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

pub struct Registry<S: SnapshotStore> {
    state: RwLock<Index>,
    store: S,
    cache: ExpressionCache,
    evaluator: Arc<Evaluator>,
}

impl Registry<JsonFileStore> {
    /// Opens the JSON snapshot named by `config.storage_path`.
    pub async fn from_config(config: &RegistryConfig) -> Result<Self> {
        let store = JsonFileStore::new(&config.storage_path);
        Self::open_with_config(store, config).await
    }
}

impl<S: SnapshotStore> Registry<S> {
    pub async fn open(store: S) -> Result<Self> {
        Self::open_with_config(store, &RegistryConfig::default()).await
    }

    /// Loads the last snapshot from `store`. A snapshot that breaks the
    /// registry invariants is refused rather than repaired.
    pub async fn open_with_config(store: S, config: &RegistryConfig) -> Result<Self> {
        let cache = ExpressionCache::new(config.cache_capacity, config.parser_limits());
        let functions = store.load().await?;
        let index = Index::from_snapshot(functions, &cache)?;
        info!("Loaded {} function(s) from snapshot", index.by_id.len());

        Ok(Self {
            state: RwLock::new(index),
            store,
            cache,
            evaluator: Arc::new(Evaluator::new()),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn define(
        &self,
        name: impl Into<String>,
        expression: impl Into<String>,
        params: HashMap<String, f64>,
    ) -> Result<Function> {
        let name = name.into();
        let expression = expression.into();
        validate_name(&name)?;
        validate_params(&params)?;
        let ast = self.cache.get_or_parse(&expression).map_err(|err| {
            warn!("Rejected expression for '{}': {}", name, err);
            err
        })?;
        debug!("Expression for '{}' parsed, depth {}", name, ast.depth());

        let mut index = self.state.write().await;
        if index.by_name.contains_key(&name) {
            warn!("Rejected define: name '{}' already exists", name);
            return Err(Error::DuplicateName(name));
        }

        let function = Function {
            id: Uuid::new_v4().to_string(),
            name,
            expression,
            params,
        };
        self.warn_unresolved(&function, &ast);

        self.store.save(&index.snapshot_with(&function)).await?;
        index.insert(function.clone());
        info!("Defined function '{}' ({})", function.name, function.id);
        Ok(function)
    }

    pub async fn get(&self, id: &str) -> Result<Function> {
        self.find(&FunctionRef::id(id)).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Function> {
        self.find(&FunctionRef::name(name)).await
    }

    pub async fn find(&self, target: &FunctionRef) -> Result<Function> {
        self.state.read().await.resolve(target).cloned()
    }

    /// Every live function, in no particular order.
    pub async fn list(&self) -> Vec<Function> {
        self.state.read().await.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.by_id.is_empty()
    }

    /// Applies every requested field or none of them.
    pub async fn update(&self, target: &FunctionRef, update: FunctionUpdate) -> Result<Function> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(params) = &update.params {
            validate_params(params)?;
        }
        let ast = match &update.expression {
            Some(expression) => Some(self.cache.get_or_parse(expression)?),
            None => None,
        };

        let mut index = self.state.write().await;
        let current = index.resolve(target)?.clone();
        if update.is_empty() {
            debug!("Empty update for '{}', nothing to do", current.name);
            return Ok(current);
        }

        let mut candidate = current.clone();
        if let Some(name) = update.name {
            if name != current.name && index.by_name.contains_key(&name) {
                warn!("Rejected rename of '{}': '{}' already exists", current.name, name);
                return Err(Error::DuplicateName(name));
            }
            candidate.name = name;
        }
        if let Some(expression) = update.expression {
            candidate.expression = expression;
        }
        if let Some(params) = update.params {
            candidate.params = params;
        }

        let ast = match ast {
            Some(ast) => ast,
            None => self.cache.get_or_parse(&candidate.expression)?,
        };
        self.warn_unresolved(&candidate, &ast);

        self.store.save(&index.snapshot_with(&candidate)).await?;
        index.remove(&current.id);
        index.insert(candidate.clone());
        info!("Updated function '{}' ({})", candidate.name, candidate.id);
        Ok(candidate)
    }

    pub async fn delete(&self, target: &FunctionRef) -> Result<()> {
        let mut index = self.state.write().await;
        let id = index.resolve(target)?.id.clone();

        self.store.save(&index.snapshot_without(&id)).await?;
        if let Some(function) = index.remove(&id) {
            info!("Deleted function '{}' ({})", function.name, function.id);
        }
        Ok(())
    }

    /// Evaluates the function at `x`. `inf` and `NaN` are ordinary results.
    pub async fn compute(&self, target: &FunctionRef, x: f64) -> Result<f64> {
        let index = self.state.read().await;
        let function = index.resolve(target)?;
        let ast = self.ast_for(function)?;

        let y = self
            .evaluator
            .evaluate(&ast, &Bindings::new(x, &function.params))?;
        debug!("{}({}) = {}", function.name, x, y);
        Ok(y)
    }

    /// Evaluates the function at every input on the rayon pool; results keep
    /// the order of `xs`. The batch runs on a blocking thread so the runtime's
    /// workers stay free.
    pub async fn compute_batch(&self, target: &FunctionRef, xs: &[f64]) -> Result<Vec<f64>> {
        let (ast, params) = {
            let index = self.state.read().await;
            let function = index.resolve(target)?;
            (self.ast_for(function)?, function.params.clone())
        };

        let evaluator = Arc::clone(&self.evaluator);
        let xs = xs.to_vec();
        let ys = tokio::task::spawn_blocking(move || {
            xs.par_iter()
                .map(|&x| evaluator.evaluate(&ast, &Bindings::new(x, &params)))
                .collect::<std::result::Result<Vec<_>, _>>()
        })
        .await
        .map_err(|err| {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
            Error::Cancelled(err.to_string())
        })??;
        Ok(ys)
    }

    fn ast_for(&self, function: &Function) -> Result<Arc<ASTNode>> {
        self.cache.get_or_parse(&function.expression).map_err(|err| {
            error!(
                "Stored expression of '{}' no longer parses: {}",
                function.name, err
            );
            err.into()
        })
    }

    /// Names that nothing will bind are allowed, but worth a warning.
    fn warn_unresolved(&self, function: &Function, ast: &ASTNode) {
        for name in ast.identifiers() {
            let bound = name == FREE_VARIABLE
                || function.params.contains_key(name)
                || functions::constant(name).is_some();
            if !bound {
                warn!(
                    "Function '{}' references '{}', which is neither x, a parameter nor a constant",
                    function.name, name
                );
            }
        }
        for name in ast.function_names() {
            if !self.evaluator.is_builtin(name) {
                warn!("Function '{}' calls unknown function '{}'", function.name, name);
            }
        }
        if function.params.contains_key(FREE_VARIABLE) {
            warn!(
                "Function '{}' has a parameter named '{}', which x always shadows",
                function.name, FREE_VARIABLE
            );
        }
    }
}
