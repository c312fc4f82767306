//! Shared utilities for integration tests.

pub mod harness;

use mdindex::index::Store;

/// Reads a single integer from `sql`.
///
/// # Panics
///
/// Panics if the query fails or does not yield an integer.
#[allow(dead_code)]
pub fn count(store: &Store, sql: &str) -> i64 {
    store.query(sql, &[]).expect("count query failed")[0][0]
        .as_i64()
        .unwrap_or_else(|| panic!("not an integer: {}", sql))
}
