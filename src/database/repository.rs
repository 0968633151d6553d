use sqlx::{self, postgres::PgRow, FromRow, PgPool, Row};

use crate::database::manager::DatabaseError;
use crate::database::query::{bind_param, bind_param_query_as, QueryBuilder, SqlParam};

/// Typed access to one table. Filters are equality pairs; `RowNotFound` is
/// surfaced as `DatabaseError::NotFound` by the `_404` variant so callers can
/// tell "no such row" apart from query failures.
pub struct Repository<T> {
    table_name: String,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>, pool: PgPool) -> Self {
        Self { table_name: table_name.into(), pool, _phantom: std::marker::PhantomData }
    }

    fn builder(&self, filters: &[(&str, SqlParam)]) -> Result<QueryBuilder, DatabaseError> {
        let mut builder = QueryBuilder::new(&self.table_name)?;
        for (column, value) in filters {
            builder = builder.eq(column, value.clone());
        }
        Ok(builder)
    }

    pub async fn select_any(
        &self,
        filters: &[(&str, SqlParam)],
        order: Option<(&str, bool)>,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut builder = self.builder(filters)?;
        if let Some((column, ascending)) = order {
            builder = builder.order_by(column, ascending);
        }
        let query = builder.select_sql()?;

        let mut q = sqlx::query_as::<_, T>(&query.sql);
        for p in query.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    pub async fn select_optional(
        &self,
        filters: &[(&str, SqlParam)],
    ) -> Result<Option<T>, DatabaseError> {
        let query = self.builder(filters)?.limit(1).select_sql()?;

        let mut q = sqlx::query_as::<_, T>(&query.sql);
        for p in query.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_optional(&self.pool).await?)
    }

    pub async fn select_404(&self, filters: &[(&str, SqlParam)]) -> Result<T, DatabaseError> {
        match self.select_optional(filters).await? {
            Some(row) => Ok(row),
            None => Err(DatabaseError::NotFound("Record not found".to_string())),
        }
    }

    pub async fn count(&self, filters: &[(&str, SqlParam)]) -> Result<i64, DatabaseError> {
        let query = self.builder(filters)?.count_sql()?;

        let mut q = sqlx::query(&query.sql);
        for p in query.params.iter() {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    pub async fn insert_returning(
        &self,
        row: Vec<(String, SqlParam)>,
    ) -> Result<T, DatabaseError> {
        let query = QueryBuilder::new(&self.table_name)?.insert_sql(&row)?;

        let mut q = sqlx::query_as::<_, T>(&query.sql);
        for p in query.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_one(&self.pool).await?)
    }

    pub async fn update_returning(
        &self,
        changes: Vec<(String, SqlParam)>,
        filters: &[(&str, SqlParam)],
    ) -> Result<T, DatabaseError> {
        let query = self.builder(filters)?.update_sql(&changes)?;

        let mut q = sqlx::query_as::<_, T>(&query.sql);
        for p in query.params.iter() {
            q = bind_param_query_as(q, p);
        }
        match q.fetch_optional(&self.pool).await? {
            Some(row) => Ok(row),
            None => Err(DatabaseError::NotFound("Record not found".to_string())),
        }
    }

    /// Delete all rows matching the filters, returning how many went away.
    pub async fn delete_where(&self, filters: &[(&str, SqlParam)]) -> Result<u64, DatabaseError> {
        let query = self.builder(filters)?.delete_sql()?;

        let mut q = sqlx::query(&query.sql);
        for p in query.params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Bulk upsert; the whole batch succeeds or fails as one statement.
    pub async fn upsert_many(
        &self,
        rows: Vec<Vec<(String, SqlParam)>>,
        conflict_column: &str,
    ) -> Result<u64, DatabaseError> {
        let query = QueryBuilder::new(&self.table_name)?.upsert_sql(&rows, conflict_column)?;

        let mut q = sqlx::query(&query.sql);
        for p in query.params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
