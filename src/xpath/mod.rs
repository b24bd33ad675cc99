//! Restricted path engine
//!
//! Element-path matching for the buffered split mode: absolute and
//! anywhere paths, prefixed name tests resolved through a caller-supplied
//! table, and attribute-equality predicates. Compiled expressions are
//! cached in a process-wide LRU keyed by the expression string.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::evaluate;
pub use parser::Path;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use lru::LruCache;

use crate::error::SplitError;

/// Compiled expressions kept hot across splitter instances
const COMPILE_CACHE_SIZE: usize = 64;

/// Ordered prefix -> URI table supplied by the caller
///
/// Prefixes in path expressions resolve through this table only, never
/// from declarations inside the document. The empty prefix binds the
/// namespace unprefixed steps match in.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    bindings: Vec<(String, String)>,
}

impl Namespaces {
    pub fn new() -> Self {
        Namespaces {
            bindings: Vec::new(),
        }
    }

    /// Add a binding; a later binding for the same prefix wins
    pub fn add(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.bindings.push((prefix.into(), uri.into()));
        self
    }

    /// Resolve a prefix
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Parse a path expression through the process-wide LRU cache
pub fn compile_cached(expr: &str) -> Result<Arc<Path>, SplitError> {
    static CACHE: OnceLock<Mutex<LruCache<String, Arc<Path>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(COMPILE_CACHE_SIZE).expect("cache size is non-zero"),
        ))
    });

    let mut guard = match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(path) = guard.get(expr) {
        return Ok(path.clone());
    }

    let path = Arc::new(parser::parse(expr).map_err(SplitError::Path)?);
    guard.put(expr.to_string(), path.clone());
    Ok(path)
}
