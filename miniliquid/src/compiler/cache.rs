use std::fmt;
use std::sync::Arc;

use memo_map::MemoMap;
use once_cell::sync::Lazy;

use crate::compiler::expression::Expr;

static GLOBAL_CACHE: Lazy<Arc<ExpressionCache>> = Lazy::new(|| Arc::new(ExpressionCache::new()));

/// Caches compiled expressions by their markup.
///
/// The cache is insert-only and safe to share across threads.  Unless an
/// [`Environment`](crate::Environment) is given its own cache, all parses
/// go through the process wide instance returned by [`global`](Self::global).
#[derive(Default)]
pub struct ExpressionCache {
    exprs: MemoMap<String, Expr>,
}

impl fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionCache").finish_non_exhaustive()
    }
}

impl ExpressionCache {
    /// Creates an empty cache.
    pub fn new() -> ExpressionCache {
        ExpressionCache::default()
    }

    /// Returns the process wide cache.
    pub fn global() -> Arc<ExpressionCache> {
        GLOBAL_CACHE.clone()
    }

    /// Returns the compiled expression for some markup.
    pub fn get(&self, markup: &str) -> Option<Expr> {
        self.exprs.get(markup).cloned()
    }

    /// Checks if markup was compiled before.
    pub fn contains(&self, markup: &str) -> bool {
        self.exprs.get(markup).is_some()
    }

    pub(crate) fn insert(&self, markup: &str, expr: Expr) {
        log::trace!("expression cache miss for {:?}", markup);
        self.exprs.insert(markup.to_string(), expr);
    }
}
