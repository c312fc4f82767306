//! Query errors, limits and per-call options.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// ===========================================
// Errors
// ===========================================

/// Errors returned by the query engine.
///
/// Offending SQL is carried verbatim; parameter values never are, only their
/// count.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query was rejected before execution.
    #[error("query rejected: {reason}\n  query: {sql}")]
    Validation { reason: String, sql: String },

    /// The query ran longer than its timeout. No rows are returned.
    #[error("query timed out after {elapsed_ms} ms (limit {limit_ms} ms)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },

    /// A strict query produced more rows than its cap.
    #[error("query returned more than {limit} rows")]
    ResultTooLarge { limit: usize },

    /// SQLite failed while preparing or stepping the statement.
    #[error("query failed: {source}\n  query: {sql} ({params} parameters)")]
    Storage {
        sql: String,
        params: usize,
        #[source]
        source: rusqlite::Error,
    },
}

impl QueryError {
    pub(crate) fn validation(reason: impl Into<String>, sql: &str) -> Self {
        Self::Validation {
            reason: reason.into(),
            sql: sql.to_string(),
        }
    }

    /// Returns true if the query never reached SQLite.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

// ===========================================
// Limits
// ===========================================

/// Engine-wide bounds. Callers can tighten these per query but never exceed
/// the ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Row cap when the caller does not request one.
    pub default_limit: usize,
    /// Row cap ceiling.
    pub max_limit: usize,
    /// Timeout when the caller does not request one.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub default_timeout: Duration,
    /// Timeout ceiling.
    #[serde(rename = "max_timeout_ms", with = "millis")]
    pub max_timeout: Duration,
    /// Longest accepted query text, in characters.
    pub max_query_length: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 1_000,
            max_limit: 10_000,
            default_timeout: Duration::from_millis(5_000),
            max_timeout: Duration::from_millis(30_000),
            max_query_length: 10_000,
        }
    }
}

impl QueryLimits {
    /// Row cap for a query requesting `requested` rows.
    pub fn row_cap(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }

    /// Timeout for a query requesting `requested`.
    pub fn timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_timeout)
            .min(self.max_timeout)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Per-call options for [`QueryEngine::execute`](super::QueryEngine::execute).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Requested row cap, clamped to the engine ceiling.
    pub limit: Option<usize>,
    /// Requested timeout, clamped to the engine ceiling.
    pub timeout: Option<Duration>,
    /// Fail with [`QueryError::ResultTooLarge`] instead of truncating.
    pub strict: bool,
}

impl ExecuteOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn row_cap_never_exceeds_ceiling() {
        let limits = QueryLimits::default();
        assert_eq!(limits.row_cap(None), 1_000);
        assert_eq!(limits.row_cap(Some(10)), 10);
        assert_eq!(limits.row_cap(Some(999_999_999)), 10_000);
    }

    #[test]
    fn timeout_never_exceeds_ceiling() {
        let limits = QueryLimits::default();
        assert_eq!(limits.timeout(None), Duration::from_millis(5_000));
        assert_eq!(
            limits.timeout(Some(Duration::from_secs(3600))),
            Duration::from_millis(30_000)
        );
    }

    #[test]
    fn limits_deserialize_with_defaults() {
        let limits: QueryLimits = toml::from_str("default_limit = 50\ntimeout_ms = 250").unwrap();
        assert_eq!(limits.default_limit, 50);
        assert_eq!(limits.default_timeout, Duration::from_millis(250));
        assert_eq!(limits.max_limit, 10_000);
    }

    #[test]
    fn validation_error_shows_sql() {
        let err = QueryError::validation("comments are not allowed", "SELECT 1 -- x");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "query rejected: comments are not allowed\n  query: SELECT 1 -- x"
        );
    }
}
