//! Fluent construction of read queries.
//!
//! The builder only assembles text and parameters. The result runs through
//! [`QueryEngine::run`](super::QueryEngine::run) and is validated like any
//! hand-written query.

use super::QueryError;
use crate::index::Value;

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
struct Join {
    kind: JoinKind,
    table: String,
    on: String,
}

/// Builds a `SELECT` statement clause by clause.
///
/// ```
/// use mdindex::index::Value;
/// use mdindex::query::QueryBuilder;
///
/// let query = QueryBuilder::new()
///     .select("f.relative_path")
///     .from("files f")
///     .join("tags t", "t.file_id = f.id")
///     .where_clause("t.tag = ?", [Value::from("rust")])
///     .order_by("f.relative_path")
///     .limit(10)
///     .build()
///     .unwrap();
///
/// assert_eq!(
///     query.sql,
///     "SELECT f.relative_path FROM files f JOIN tags t ON t.file_id = f.id \
///      WHERE t.tag = ? ORDER BY f.relative_path LIMIT 10"
/// );
/// assert_eq!(query.params, vec![Value::from("rust")]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    columns: Vec<String>,
    from: Option<String>,
    joins: Vec<Join>,
    conditions: Vec<String>,
    where_params: Vec<Value>,
    group_by: Vec<String>,
    having: Option<String>,
    having_params: Vec<Value>,
    order_by: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a result column. Without any, the query selects `*`.
    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Sets the base table, with an optional alias (`"files f"`).
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }

    pub fn join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Inner,
            table: table.into(),
            on: on.into(),
        });
        self
    }

    pub fn left_join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Left,
            table: table.into(),
            on: on.into(),
        });
        self
    }

    /// Replaces every WHERE condition with `condition`.
    pub fn where_clause(
        mut self,
        condition: impl Into<String>,
        params: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.conditions.clear();
        self.where_params.clear();
        self.and_where(condition, params)
    }

    /// Adds a condition joined to the others with AND.
    pub fn and_where(
        mut self,
        condition: impl Into<String>,
        params: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.conditions.push(condition.into());
        self.where_params.extend(params);
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn having(
        mut self,
        condition: impl Into<String>,
        params: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.having = Some(condition.into());
        self.having_params = params.into_iter().collect();
        self
    }

    /// Adds an ordering term such as `"modified DESC"`.
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Renders the statement and its parameters.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Validation` if no table was given or HAVING is
    /// used without GROUP BY.
    pub fn build(&self) -> Result<BuiltQuery, QueryError> {
        let Some(from) = &self.from else {
            return Err(QueryError::validation(
                "query has no FROM clause",
                &self.render("<missing>"),
            ));
        };
        if self.having.is_some() && self.group_by.is_empty() {
            return Err(QueryError::validation(
                "HAVING requires GROUP BY",
                &self.render(from),
            ));
        }

        let mut params = self.where_params.clone();
        params.extend(self.having_params.iter().cloned());

        Ok(BuiltQuery {
            sql: self.render(from),
            params,
        })
    }

    fn render(&self, from: &str) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", columns, from);

        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(" {} {} ON {}", keyword, join.table, join.on));
        }

        if !self.conditions.is_empty() {
            let conditions: Vec<String> = if self.conditions.len() == 1 {
                self.conditions.clone()
            } else {
                self.conditions.iter().map(|c| format!("({})", c)).collect()
            };
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_query_selects_star() {
        let query = QueryBuilder::new().from("files").build().unwrap();
        assert_eq!(query.sql, "SELECT * FROM files");
        assert!(query.params.is_empty());
    }

    #[test]
    fn renders_every_clause_in_order() {
        let query = QueryBuilder::new()
            .select("t.tag")
            .select("COUNT(*) AS n")
            .from("tags t")
            .left_join("files f", "f.id = t.file_id")
            .where_clause("f.word_count > ?", [Value::Integer(10)])
            .and_where("t.source = ?", [Value::from("inline")])
            .group_by("t.tag")
            .having("COUNT(*) >= ?", [Value::Integer(2)])
            .order_by("n DESC")
            .order_by("t.tag")
            .limit(5)
            .offset(10)
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            "SELECT t.tag, COUNT(*) AS n FROM tags t LEFT JOIN files f ON f.id = t.file_id \
             WHERE (f.word_count > ?) AND (t.source = ?) GROUP BY t.tag HAVING COUNT(*) >= ? \
             ORDER BY n DESC, t.tag LIMIT 5 OFFSET 10"
        );
        assert_eq!(
            query.params,
            vec![Value::Integer(10), Value::from("inline"), Value::Integer(2)]
        );
    }

    #[test]
    fn where_clause_replaces_previous_conditions() {
        let query = QueryBuilder::new()
            .from("files")
            .and_where("a = ?", [Value::Integer(1)])
            .where_clause("b = ?", [Value::Integer(2)])
            .build()
            .unwrap();
        assert_eq!(query.sql, "SELECT * FROM files WHERE b = ?");
        assert_eq!(query.params, vec![Value::Integer(2)]);
    }

    #[test]
    fn offset_without_limit() {
        let query = QueryBuilder::new().from("files").offset(3).build().unwrap();
        assert_eq!(query.sql, "SELECT * FROM files LIMIT -1 OFFSET 3");
    }

    #[test]
    fn missing_from_is_rejected() {
        let err = QueryBuilder::new().select("1").build().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn having_without_group_by_is_rejected() {
        let err = QueryBuilder::new()
            .from("files")
            .having("COUNT(*) > 1", [])
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }
}
