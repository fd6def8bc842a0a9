use crate::ast::{ASTNode, ParseError, Parser, ParserLimits};
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

/// Bounded cache of parsed expressions keyed by their exact source text.
///
/// Because the key is the text itself, replacing a function's expression can
/// never hand back the old tree.
pub struct ExpressionCache {
    entries: Mutex<LruCache<String, Arc<ASTNode>>>,
    limits: ParserLimits,
}

impl ExpressionCache {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize, limits: ParserLimits) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            limits,
        }
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }

    /// Parses `source` without touching the cache.
    pub fn parse(&self, source: &str) -> Result<ASTNode, ParseError> {
        Parser::parse_with_limits(source, &self.limits)
    }

    pub fn get_or_parse(&self, source: &str) -> Result<Arc<ASTNode>, ParseError> {
        if let Some(ast) = self.lock().get(source) {
            return Ok(Arc::clone(ast));
        }

        // parse outside the lock, a concurrent miss just parses twice
        debug!("Expression cache miss: {}", source);
        let ast = Arc::new(self.parse(source)?);
        self.lock().put(source.to_string(), Arc::clone(&ast));
        Ok(ast)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<ASTNode>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
