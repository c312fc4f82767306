//! Bounded execution of validated read queries.

use super::validate::{ValidatedQuery, validate};
use super::{ExecuteOptions, QueryBuilder, QueryError, QueryLimits};
use crate::index::{Row, Store, Value};
use rusqlite::{Connection, ErrorCode};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Virtual machine instructions between timeout checks.
const PROGRESS_INTERVAL: i32 = 1_000;

/// Rows and execution metadata of one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub elapsed_ms: u64,
    pub tables_touched: Vec<String>,
    pub used_full_text: bool,
    /// More rows matched than the cap allowed.
    pub truncated: bool,
}

impl QueryResult {
    /// Returns the index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns one column's values rendered as text, in row order.
    pub fn strings(&self, column: &str) -> Vec<String> {
        let Some(index) = self.column_index(column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(index))
            .map(ToString::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read-only query surface over a [`Store`].
///
/// Every query, including those built by [`QueryBuilder`] and the derived
/// views, goes through [`QueryEngine::execute`].
pub struct QueryEngine<'a> {
    store: &'a Store,
    limits: QueryLimits,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a Store, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Validates, bounds and runs one read query.
    ///
    /// # Errors
    ///
    /// - `QueryError::Validation` if the query fails a static check, binds
    ///   the wrong number of parameters, or is not read-only
    /// - `QueryError::Timeout` if it runs past its timeout
    /// - `QueryError::ResultTooLarge` if `options.strict` and rows exceed the cap
    /// - `QueryError::Storage` if SQLite fails
    pub fn execute(
        &self,
        sql: &str,
        params: &[Value],
        options: &ExecuteOptions,
    ) -> Result<QueryResult, QueryError> {
        let query = validate(sql, &self.limits).inspect_err(|e| {
            tracing::warn!("{}", e);
        })?;

        if query.placeholders() != params.len() {
            return Err(QueryError::validation(
                format!(
                    "query has {} placeholders but {} parameters were given",
                    query.placeholders(),
                    params.len()
                ),
                sql,
            ));
        }

        let cap = self.limits.row_cap(options.limit);
        let timeout = self.limits.timeout(options.timeout);
        let started = Instant::now();

        let (columns, rows, truncated) = {
            let _guard = TimeoutGuard::install(self.store.conn(), started + timeout);
            run_bounded(self.store.conn(), &query, &self.limits, params, cap, started, timeout)?
        };

        if truncated && options.strict {
            return Err(QueryError::ResultTooLarge { limit: cap });
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(rows = rows.len(), elapsed_ms, truncated, "query executed");

        Ok(QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            elapsed_ms,
            tables_touched: query.tables(),
            used_full_text: query.uses_full_text(),
            truncated,
        })
    }

    /// Builds and runs a [`QueryBuilder`] through the same checks as
    /// [`QueryEngine::execute`].
    pub fn run(
        &self,
        builder: &QueryBuilder,
        options: &ExecuteOptions,
    ) -> Result<QueryResult, QueryError> {
        let built = builder.build()?;
        self.execute(&built.sql, &built.params, options)
    }
}

type Columns = Vec<String>;

fn run_bounded(
    conn: &Connection,
    query: &ValidatedQuery,
    limits: &QueryLimits,
    params: &[Value],
    cap: usize,
    started: Instant,
    timeout: Duration,
) -> Result<(Columns, Vec<Row>, bool), QueryError> {
    let sql = query.clamped_sql(limits.max_limit);
    let fail = |source: rusqlite::Error| classify(source, &sql, params.len(), started, timeout);

    let mut stmt = conn.prepare(&sql).map_err(fail)?;
    if !stmt.readonly() {
        return Err(QueryError::validation("statement is not read-only", &sql));
    }

    let columns: Columns = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut truncated = false;
    let mut cursor = stmt
        .query(rusqlite::params_from_iter(params.iter()))
        .map_err(fail)?;

    while let Some(row) = cursor.next().map_err(fail)? {
        if rows.len() == cap {
            truncated = true;
            break;
        }
        let values = (0..width)
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<rusqlite::Result<Row>>()
            .map_err(fail)?;
        rows.push(values);

        if started.elapsed() > timeout {
            return Err(timeout_error(started, timeout));
        }
    }

    Ok((columns, rows, truncated))
}

fn classify(
    source: rusqlite::Error,
    sql: &str,
    params: usize,
    started: Instant,
    timeout: Duration,
) -> QueryError {
    match &source {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::OperationInterrupted => {
            timeout_error(started, timeout)
        }
        rusqlite::Error::MultipleStatement => {
            QueryError::validation("multiple statements are not allowed", sql)
        }
        _ => QueryError::Storage {
            sql: sql.to_string(),
            params,
            source,
        },
    }
}

fn timeout_error(started: Instant, timeout: Duration) -> QueryError {
    QueryError::Timeout {
        elapsed_ms: started.elapsed().as_millis() as u64,
        limit_ms: timeout.as_millis() as u64,
    }
}

/// Interrupts statements on its connection once the deadline passes.
/// Removed on drop.
struct TimeoutGuard<'c> {
    conn: &'c Connection,
}

impl<'c> TimeoutGuard<'c> {
    fn install(conn: &'c Connection, deadline: Instant) -> Self {
        conn.progress_handler(PROGRESS_INTERVAL, Some(move || Instant::now() >= deadline));
        Self { conn }
    }
}

impl Drop for TimeoutGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ===========================================
    // Test Helpers
    // ===========================================

    fn store_with_numbers(n: i64) -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute_batch("CREATE TABLE numbers (n INTEGER NOT NULL);")
            .unwrap();
        for i in 0..n {
            store
                .execute("INSERT INTO numbers (n) VALUES (?1)", &[Value::Integer(i)])
                .unwrap();
        }
        store
    }

    fn engine(store: &Store) -> QueryEngine<'_> {
        QueryEngine::new(store, QueryLimits::default())
    }

    // ===========================================
    // Execution
    // ===========================================

    #[test]
    fn returns_columns_rows_and_metadata() {
        let store = store_with_numbers(3);
        let result = engine(&store)
            .execute(
                "SELECT n, n * 2 AS doubled FROM numbers WHERE n >= ? ORDER BY n",
                &[Value::Integer(1)],
                &ExecuteOptions::default(),
            )
            .unwrap();

        assert_eq!(result.columns, vec!["n", "doubled"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(1), Value::Integer(2)],
                vec![Value::Integer(2), Value::Integer(4)],
            ]
        );
        assert_eq!(result.row_count, 2);
        assert_eq!(result.tables_touched, vec!["numbers"]);
        assert!(!result.used_full_text);
        assert!(!result.truncated);
    }

    #[test]
    fn parameters_are_bound_not_interpolated() {
        let store = store_with_numbers(1);
        let result = engine(&store)
            .execute(
                "SELECT ? AS echoed",
                &[Value::from("'; DROP TABLE numbers; --")],
                &ExecuteOptions::default(),
            )
            .unwrap();
        assert_eq!(result.strings("echoed"), vec!["'; DROP TABLE numbers; --"]);
        assert!(store.table_exists("numbers").unwrap());
    }

    #[test]
    fn rejects_wrong_parameter_count() {
        let store = store_with_numbers(1);
        let err = engine(&store)
            .execute("SELECT * FROM numbers WHERE n = ?", &[], &ExecuteOptions::default())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejected_query_never_runs() {
        let store = store_with_numbers(1);
        let err = engine(&store)
            .execute(
                "SELECT * FROM numbers; DROP TABLE numbers;",
                &[],
                &ExecuteOptions::default(),
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.table_exists("numbers").unwrap());
    }

    #[test]
    fn storage_errors_carry_sql_and_param_count() {
        let store = store_with_numbers(1);
        let err = engine(&store)
            .execute("SELECT missing FROM numbers", &[], &ExecuteOptions::default())
            .unwrap_err();
        match err {
            QueryError::Storage { sql, params, .. } => {
                assert_eq!(sql, "SELECT missing FROM numbers");
                assert_eq!(params, 0);
            }
            other => panic!("expected storage error, got {:?}", other),
        }
    }

    // ===========================================
    // Row Caps
    // ===========================================

    #[test]
    fn truncates_at_requested_limit() {
        let store = store_with_numbers(10);
        let result = engine(&store)
            .execute("SELECT n FROM numbers", &[], &ExecuteOptions::with_limit(4))
            .unwrap();
        assert_eq!(result.row_count, 4);
        assert!(result.truncated);
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        let store = store_with_numbers(4);
        let result = engine(&store)
            .execute("SELECT n FROM numbers", &[], &ExecuteOptions::with_limit(4))
            .unwrap();
        assert!(!result.truncated);
    }

    #[test]
    fn requested_limit_cannot_exceed_ceiling() {
        let store = store_with_numbers(10);
        let limits = QueryLimits {
            default_limit: 2,
            max_limit: 3,
            ..Default::default()
        };
        let result = QueryEngine::new(&store, limits)
            .execute("SELECT n FROM numbers", &[], &ExecuteOptions::with_limit(100))
            .unwrap();
        assert_eq!(result.row_count, 3);
    }

    #[test]
    fn huge_sql_limit_is_clamped() {
        let store = store_with_numbers(10);
        let limits = QueryLimits {
            max_limit: 5,
            ..Default::default()
        };
        let result = QueryEngine::new(&store, limits)
            .execute(
                "SELECT n FROM numbers LIMIT 999999999",
                &[],
                &ExecuteOptions::default(),
            )
            .unwrap();
        assert_eq!(result.row_count, 5);
        assert!(!result.truncated);
    }

    #[test]
    fn strict_mode_fails_instead_of_truncating() {
        let store = store_with_numbers(10);
        let options = ExecuteOptions {
            limit: Some(3),
            strict: true,
            ..Default::default()
        };
        let err = engine(&store)
            .execute("SELECT n FROM numbers", &[], &options)
            .unwrap_err();
        assert!(matches!(err, QueryError::ResultTooLarge { limit: 3 }));
    }

    // ===========================================
    // Timeouts
    // ===========================================

    #[test]
    fn long_query_times_out_without_rows() {
        let store = Store::open_in_memory().unwrap();
        let options = ExecuteOptions {
            timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let err = engine(&store)
            .execute(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) \
                 SELECT COUNT(*) FROM c",
                &[],
                &options,
            )
            .unwrap_err();
        match err {
            QueryError::Timeout { limit_ms, .. } => assert_eq!(limit_ms, 50),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn handler_is_removed_after_query() {
        let store = store_with_numbers(1);
        let options = ExecuteOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        engine(&store)
            .execute("SELECT n FROM numbers", &[], &options)
            .unwrap();
        std::thread::sleep(Duration::from_millis(250));
        // a stale deadline would interrupt this
        assert_eq!(store.document_count().unwrap(), 0);
    }
}
