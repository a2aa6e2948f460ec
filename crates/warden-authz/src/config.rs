//! Evaluator settings.

use std::time::Duration;

/// Per-query budget when none is configured.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(100);

/// How a [`RegoPolicy`](crate::RegoPolicy) evaluates queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Builtin errors (e.g. a bad regex) abort the query instead of
    /// leaving the expression undefined.
    pub strict_builtins: bool,
    /// Wall-clock budget of one scope query. Exceeding it fails the call.
    pub query_timeout: Duration,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            strict_builtins: false,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl EvaluatorConfig {
    /// Defaults: lenient builtins, [`DEFAULT_QUERY_TIMEOUT`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set [`strict_builtins`](Self::strict_builtins).
    #[must_use]
    pub fn with_strict_builtins(mut self, strict: bool) -> Self {
        self.strict_builtins = strict;
        self
    }

    /// Set [`query_timeout`](Self::query_timeout).
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}
