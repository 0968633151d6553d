use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::{self, FromRow};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

/// A typed SQL parameter. Postgres infers parameter types from the column a
/// placeholder is compared against, so values must be bound with the matching
/// Rust type rather than funneled through text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(Value),
    Null,
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Int(v as i64)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<Uuid> for SqlParam {
    fn from(v: Uuid) -> Self {
        SqlParam::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(v)
    }
}

impl From<Value> for SqlParam {
    fn from(v: Value) -> Self {
        SqlParam::Json(v)
    }
}

impl<T> From<Option<T>> for SqlParam
where
    T: Into<SqlParam>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => SqlParam::Null,
        }
    }
}

/// Generated SQL plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Minimal query builder matching the remote interface the stores consume:
/// select with equality filters, ordering and limit, single-row insert and
/// update with RETURNING, and bulk upsert keyed on a conflict column.
pub struct QueryBuilder {
    table: String,
    filters: Vec<(String, SqlParam)>,
    order: Option<(String, bool)>,
    limit: Option<i64>,
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>) -> Result<Self, DatabaseError> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { table, filters: Vec::new(), order: None, limit: None })
    }

    pub fn eq(mut self, column: &str, value: impl Into<SqlParam>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select_sql(&self) -> Result<SqlQuery, DatabaseError> {
        let mut sql = format!("SELECT * FROM \"{}\"", self.table);
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params)?;

        if let Some((column, ascending)) = &self.order {
            validate_identifier(column)?;
            sql.push_str(&format!(
                " ORDER BY \"{}\" {}",
                column,
                if *ascending { "ASC" } else { "DESC" }
            ));
        }
        if let Some(limit) = self.limit {
            params.push(SqlParam::Int(limit));
            sql.push_str(&format!(" LIMIT ${}", params.len()));
        }

        Ok(SqlQuery { sql, params })
    }

    pub fn count_sql(&self) -> Result<SqlQuery, DatabaseError> {
        let mut sql = format!("SELECT COUNT(*) AS count FROM \"{}\"", self.table);
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params)?;
        Ok(SqlQuery { sql, params })
    }

    /// UPDATE with this builder's filters as the WHERE clause.
    pub fn update_sql(&self, changes: &[(String, SqlParam)]) -> Result<SqlQuery, DatabaseError> {
        if changes.is_empty() {
            return Err(DatabaseError::QueryError("update with no changes".to_string()));
        }

        let mut params = Vec::new();
        let mut assignments = Vec::new();
        for (column, value) in changes {
            validate_identifier(column)?;
            params.push(value.clone());
            assignments.push(format!("\"{}\" = ${}", column, params.len()));
        }

        let mut sql =
            format!("UPDATE \"{}\" SET {}", self.table, assignments.join(", "));
        self.push_where(&mut sql, &mut params)?;
        sql.push_str(" RETURNING *");

        Ok(SqlQuery { sql, params })
    }

    pub fn insert_sql(&self, row: &[(String, SqlParam)]) -> Result<SqlQuery, DatabaseError> {
        if row.is_empty() {
            return Err(DatabaseError::QueryError("insert with no columns".to_string()));
        }

        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        let mut params = Vec::new();
        for (column, value) in row {
            validate_identifier(column)?;
            columns.push(format!("\"{}\"", column));
            params.push(value.clone());
            placeholders.push(format!("${}", params.len()));
        }

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(SqlQuery { sql, params })
    }

    /// Bulk upsert keyed on `conflict_column`. Every row must carry the same
    /// columns in the same order; the whole batch succeeds or fails together.
    pub fn upsert_sql(
        &self,
        rows: &[Vec<(String, SqlParam)>],
        conflict_column: &str,
    ) -> Result<SqlQuery, DatabaseError> {
        validate_identifier(conflict_column)?;
        let first = rows
            .first()
            .ok_or_else(|| DatabaseError::QueryError("upsert with no rows".to_string()))?;

        let columns: Vec<&str> = first.iter().map(|(c, _)| c.as_str()).collect();
        for column in &columns {
            validate_identifier(column)?;
        }

        let mut params = Vec::new();
        let mut tuples = Vec::new();
        for row in rows {
            if row.len() != columns.len()
                || row.iter().zip(&columns).any(|((c, _), expected)| c != expected)
            {
                return Err(DatabaseError::QueryError(
                    "upsert rows must share the same column set".to_string(),
                ));
            }
            let mut placeholders = Vec::new();
            for (_, value) in row {
                params.push(value.clone());
                placeholders.push(format!("${}", params.len()));
            }
            tuples.push(format!("({})", placeholders.join(", ")));
        }

        let assignments: Vec<String> = columns
            .iter()
            .filter(|c| **c != conflict_column)
            .map(|c| format!("\"{}\" = EXCLUDED.\"{}\"", c, c))
            .collect();

        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES {} ON CONFLICT (\"{}\") DO UPDATE SET {}",
            self.table,
            quoted.join(", "),
            tuples.join(", "),
            conflict_column,
            assignments.join(", ")
        );

        Ok(SqlQuery { sql, params })
    }

    /// DELETE with this builder's filters as the WHERE clause. Unfiltered
    /// deletes are refused.
    pub fn delete_sql(&self) -> Result<SqlQuery, DatabaseError> {
        if self.filters.is_empty() {
            return Err(DatabaseError::QueryError("delete with no filters".to_string()));
        }
        let mut sql = format!("DELETE FROM \"{}\"", self.table);
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params)?;
        Ok(SqlQuery { sql, params })
    }

    fn push_where(
        &self,
        sql: &mut String,
        params: &mut Vec<SqlParam>,
    ) -> Result<(), DatabaseError> {
        if self.filters.is_empty() {
            return Ok(());
        }
        let mut conditions = Vec::new();
        for (column, value) in &self.filters {
            validate_identifier(column)?;
            params.push(value.clone());
            conditions.push(format!("\"{}\" = ${}", column, params.len()));
        }
        sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
        Ok(())
    }
}

/// Reject anything that is not a plain snake_case identifier before it is
/// interpolated into SQL.
fn validate_identifier(name: &str) -> Result<(), DatabaseError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DatabaseError::QueryError(format!("invalid identifier: {}", name)))
    }
}

pub(crate) fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match param {
        SqlParam::Text(s) => q.bind(s),
        SqlParam::Int(i) => q.bind(*i),
        SqlParam::Float(f) => q.bind(*f),
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Uuid(u) => q.bind(*u),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Json(v) => q.bind(v.clone()),
        SqlParam::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
    }
}

pub(crate) fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match param {
        SqlParam::Text(s) => q.bind(s),
        SqlParam::Int(i) => q.bind(*i),
        SqlParam::Float(f) => q.bind(*f),
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Uuid(u) => q.bind(*u),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Json(v) => q.bind(v.clone()),
        SqlParam::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_with_filters_order_and_limit() {
        let org = Uuid::new_v4();
        let query = QueryBuilder::new("collections")
            .unwrap()
            .eq("organization_id", org)
            .order_by("position", true)
            .limit(10)
            .select_sql()
            .unwrap();

        assert_eq!(
            query.sql,
            "SELECT * FROM \"collections\" WHERE \"organization_id\" = $1 ORDER BY \"position\" ASC LIMIT $2"
        );
        assert_eq!(query.params, vec![SqlParam::Uuid(org), SqlParam::Int(10)]);
    }

    #[test]
    fn update_appends_filters_after_assignments() {
        let query = QueryBuilder::new("collections")
            .unwrap()
            .eq("id", 7i64)
            .update_sql(&[
                ("name".to_string(), SqlParam::Text("News".to_string())),
                ("is_hidden".to_string(), SqlParam::Bool(false)),
            ])
            .unwrap();

        assert_eq!(
            query.sql,
            "UPDATE \"collections\" SET \"name\" = $1, \"is_hidden\" = $2 WHERE \"id\" = $3 RETURNING *"
        );
        assert_eq!(query.params.len(), 3);
    }

    #[test]
    fn insert_returns_inserted_row() {
        let query = QueryBuilder::new("fields")
            .unwrap()
            .insert_sql(&[
                ("name".to_string(), SqlParam::Text("headline".to_string())),
                ("collection_id".to_string(), SqlParam::Int(3)),
            ])
            .unwrap();

        assert_eq!(
            query.sql,
            "INSERT INTO \"fields\" (\"name\", \"collection_id\") VALUES ($1, $2) RETURNING *"
        );
    }

    #[test]
    fn upsert_produces_single_statement_for_all_rows() {
        let rows = vec![
            vec![
                ("id".to_string(), SqlParam::Int(1)),
                ("position".to_string(), SqlParam::Int(2)),
            ],
            vec![
                ("id".to_string(), SqlParam::Int(2)),
                ("position".to_string(), SqlParam::Int(1)),
            ],
        ];
        let query = QueryBuilder::new("collections").unwrap().upsert_sql(&rows, "id").unwrap();

        assert_eq!(
            query.sql,
            "INSERT INTO \"collections\" (\"id\", \"position\") VALUES ($1, $2), ($3, $4) \
             ON CONFLICT (\"id\") DO UPDATE SET \"position\" = EXCLUDED.\"position\""
        );
        assert_eq!(query.params.len(), 4);
    }

    #[test]
    fn upsert_rejects_mismatched_rows() {
        let rows = vec![
            vec![("id".to_string(), SqlParam::Int(1))],
            vec![("position".to_string(), SqlParam::Int(1))],
        ];
        assert!(QueryBuilder::new("collections").unwrap().upsert_sql(&rows, "id").is_err());
    }

    #[test]
    fn delete_requires_a_filter() {
        assert!(QueryBuilder::new("collections").unwrap().delete_sql().is_err());

        let query =
            QueryBuilder::new("collections").unwrap().eq("id", 4i64).delete_sql().unwrap();
        assert_eq!(query.sql, "DELETE FROM \"collections\" WHERE \"id\" = $1");
    }

    #[test]
    fn rejects_suspect_identifiers() {
        assert!(QueryBuilder::new("collections; DROP TABLE users").is_err());
        assert!(QueryBuilder::new("\"quoted\"").is_err());
        assert!(QueryBuilder::new("1starts_with_digit").is_err());
        assert!(QueryBuilder::new("organization_members").is_ok());
    }
}
