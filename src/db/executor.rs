//! Statement execution.
//!
//! `DatabaseAccess` runs caller-built statements with positional, typed
//! arguments:
//! - inserts, updates and deletes returning the affected row count
//! - inserts that hand back their generated keys
//! - single-row queries that tell "no row" from "more than one row"
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific statement operations
//! - `postgres`: PostgreSQL-specific statement operations
//! - `sqlite`: SQLite-specific statement operations
//!
//! Each submodule provides identical functionality adapted to the database's
//! types. Every call acquires its own pooled connection and gives it back
//! before returning, on success and on error.

use crate::db::cursor::{DbRow, RowCursor};
use crate::db::dialect::{Dialect, KeyRetrieval, dialect_for};
use crate::db::keys::GeneratedKeyHolder;
use crate::db::params::{BoundValue, SqlArg, bind_values};
use crate::db::pool::DbPool;
use crate::db::types::{ColumnType, TypeTag};
use crate::error::{DbError, DbResult};
use futures_util::StreamExt;
use tracing::{debug, warn};

/// Outcome of a query that expects at most one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOne<T> {
    /// The query returned no rows.
    None,
    /// Exactly one row, mapped.
    Exactly(T),
    /// At least two rows; only the first was mapped and it was discarded.
    MoreThanOne,
}

impl<T> QueryOne<T> {
    /// The single value, if there was exactly one row.
    pub fn exactly(self) -> Option<T> {
        match self {
            QueryOne::Exactly(value) => Some(value),
            QueryOne::None | QueryOne::MoreThanOne => None,
        }
    }
}

/// Executes statements against one data source in one dialect.
#[derive(Debug, Clone)]
pub struct DatabaseAccess {
    pool: DbPool,
    dialect: &'static dyn Dialect,
}

impl DatabaseAccess {
    /// Pair a pool with the dialect its statements are written in.
    ///
    /// Fails with `InvalidInput` when the dialect targets another engine.
    pub fn new(pool: DbPool, dialect: &'static dyn Dialect) -> DbResult<Self> {
        if dialect.database_type() != pool.db_type() {
            return Err(DbError::invalid_input(format!(
                "{} dialect cannot run statements on a {} pool",
                dialect.database_type(),
                pool.db_type()
            )));
        }
        Ok(Self { pool, dialect })
    }

    /// Use the built-in dialect of the pool's engine.
    pub fn for_pool(pool: DbPool) -> Self {
        let dialect = dialect_for(pool.db_type());
        Self { pool, dialect }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&self, sql: &str, args: &[SqlArg], tags: &[TypeTag]) -> DbResult<u64> {
        let values = bind_values(args, tags)?;

        debug!(sql = %sql, params = values.len(), "Executing statement");

        match &self.pool {
            DbPool::MySql(p) => mysql::execute(p, sql, &values).await,
            DbPool::Postgres(p) => postgres::execute(p, sql, &values).await,
            DbPool::SQLite(p) => sqlite::execute(p, sql, &values).await,
        }
    }

    pub async fn insert(&self, sql: &str, args: &[SqlArg], tags: &[TypeTag]) -> DbResult<u64> {
        self.execute(sql, args, tags).await
    }

    pub async fn update(&self, sql: &str, args: &[SqlArg], tags: &[TypeTag]) -> DbResult<u64> {
        self.execute(sql, args, tags).await
    }

    pub async fn delete(&self, sql: &str, args: &[SqlArg], tags: &[TypeTag]) -> DbResult<u64> {
        self.execute(sql, args, tags).await
    }

    /// Insert and record the generated keys in `holder`.
    ///
    /// The insert and the key retrieval run in one transaction. If no key
    /// comes back, or a key is not an integer, the insert is rolled back and
    /// `holder` is left untouched.
    pub async fn insert_returning_keys(
        &self,
        sql: &str,
        args: &[SqlArg],
        tags: &[TypeTag],
        holder: &mut GeneratedKeyHolder,
    ) -> DbResult<u64> {
        let values = bind_values(args, tags)?;

        let requested = holder.requested_columns().to_vec();
        if requested.is_empty() {
            return Err(DbError::invalid_input(
                "Key holder does not name any generated key column",
            ));
        }
        let retrieval = self.dialect.key_retrieval();
        if matches!(retrieval, KeyRetrieval::FollowUpQuery(_)) && requested.len() > 1 {
            return Err(DbError::invalid_input(format!(
                "{} returns a single generated key per insert, {} were requested",
                self.dialect.database_type(),
                requested.len()
            )));
        }
        let insert_sql = self.dialect.generated_keys_sql(sql, &requested);

        debug!(
            sql = %insert_sql,
            params = values.len(),
            keys = ?requested,
            "Executing insert with generated keys"
        );

        let (rows_affected, keys) = match &self.pool {
            DbPool::MySql(p) => {
                mysql::insert_with_keys(p, &insert_sql, &values, retrieval, &requested).await?
            }
            DbPool::Postgres(p) => {
                postgres::insert_with_keys(p, &insert_sql, &values, retrieval, &requested).await?
            }
            DbPool::SQLite(p) => {
                sqlite::insert_with_keys(p, &insert_sql, &values, retrieval, &requested).await?
            }
        };

        for (column, key) in keys {
            holder.add_key(column, key);
        }
        Ok(rows_affected)
    }

    /// Run a query expected to produce at most one row.
    ///
    /// `mapper` sees the cursor positioned on the first row. A second row is
    /// detected but never mapped.
    pub async fn query_for_one<T, F>(
        &self,
        sql: &str,
        args: &[SqlArg],
        tags: &[TypeTag],
        mapper: F,
    ) -> DbResult<QueryOne<T>>
    where
        F: FnMut(&RowCursor<'_>) -> DbResult<T>,
    {
        let (mut rows, has_more) = self.query_rows(sql, args, tags, Some(1), mapper).await?;
        Ok(match rows.pop() {
            None => QueryOne::None,
            Some(_) if has_more => QueryOne::MoreThanOne,
            Some(first) => QueryOne::Exactly(first),
        })
    }

    /// Run a query returning a single integer, such as `SELECT COUNT(*)`.
    pub async fn query_for_long(&self, sql: &str) -> DbResult<i64> {
        match self
            .query_for_one(sql, &[], &[], |cursor| cursor.get_long(0))
            .await?
        {
            QueryOne::Exactly(value) => Ok(value),
            QueryOne::None => Err(DbError::no_result(sql)),
            QueryOne::MoreThanOne => Err(DbError::ambiguous_result(sql)),
        }
    }

    /// Map every row of a query.
    pub async fn query_for_all<T, F>(
        &self,
        sql: &str,
        args: &[SqlArg],
        tags: &[TypeTag],
        mapper: F,
    ) -> DbResult<Vec<T>>
    where
        F: FnMut(&RowCursor<'_>) -> DbResult<T>,
    {
        let (rows, _) = self.query_rows(sql, args, tags, None, mapper).await?;
        Ok(rows)
    }

    async fn query_rows<T, F>(
        &self,
        sql: &str,
        args: &[SqlArg],
        tags: &[TypeTag],
        limit: Option<usize>,
        mapper: F,
    ) -> DbResult<(Vec<T>, bool)>
    where
        F: FnMut(&RowCursor<'_>) -> DbResult<T>,
    {
        let values = bind_values(args, tags)?;

        debug!(sql = %sql, params = values.len(), limit = ?limit, "Executing query");

        match &self.pool {
            DbPool::MySql(p) => mysql::query_rows(p, sql, &values, limit, mapper).await,
            DbPool::Postgres(p) => postgres::query_rows(p, sql, &values, limit, mapper).await,
            DbPool::SQLite(p) => sqlite::query_rows(p, sql, &values, limit, mapper).await,
        }
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

/// Map up to `limit` rows, then report whether another row follows.
async fn read_rows<T, F>(
    cursor: &mut RowCursor<'_>,
    limit: Option<usize>,
    mut mapper: F,
) -> DbResult<(Vec<T>, bool)>
where
    F: FnMut(&RowCursor<'_>) -> DbResult<T>,
{
    let mut rows = Vec::new();
    while limit.is_none_or(|l| rows.len() < l) {
        if !cursor.advance().await? {
            return Ok((rows, false));
        }
        rows.push(mapper(&*cursor)?);
    }
    let has_more = cursor.advance().await?;
    cursor.close();
    Ok((rows, has_more))
}

/// Resolve key rows into `(column, key)` pairs through the type registry.
///
/// Columns are matched to the requested key names by position.
fn collect_generated_keys(
    rows: &[DbRow],
    requested: &[String],
    retrieval: KeyRetrieval,
    statement: &str,
) -> DbResult<Vec<(String, i64)>> {
    if rows.is_empty() {
        return Err(DbError::no_generated_keys(statement));
    }

    let mut keys = Vec::with_capacity(rows.len() * requested.len());
    for row in rows {
        if row.len() < requested.len() {
            return Err(DbError::no_generated_keys(statement));
        }
        for (index, column) in requested.iter().enumerate() {
            let sql_type = row.sql_type_id(index)?;
            let column_type = ColumnType::lookup_by_sql_type_id(sql_type).map_err(|_| {
                let type_name = row.type_name(index).unwrap_or_default();
                DbError::invalid_key_type(column.as_str(), type_name, sql_type)
            })?;
            let key = column_type.convert_to_numeric_key(row, index)?;
            // LAST_INSERT_ID() and friends report 0 when nothing was generated
            if matches!(retrieval, KeyRetrieval::FollowUpQuery(_)) && key <= 0 {
                return Err(DbError::no_generated_keys(statement));
            }
            keys.push((column.clone(), key));
        }
    }
    Ok(keys)
}

/// Commit on success; on failure roll back and keep the original error.
async fn finish<DB, T>(tx: sqlx::Transaction<'static, DB>, outcome: DbResult<T>) -> DbResult<T>
where
    DB: sqlx::Database,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed insert did not complete");
            }
            Err(e)
        }
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::mysql::MySqlArguments;
    use sqlx::{MySql, MySqlPool, Transaction};

    fn build_query<'q>(
        sql: &'q str,
        values: &[BoundValue<'q>],
    ) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
        let mut query = sqlx::query(sql);
        for value in values {
            query = bind_mysql_param(query, *value);
        }
        query
    }

    pub async fn execute(pool: &MySqlPool, sql: &str, values: &[BoundValue<'_>]) -> DbResult<u64> {
        let mut conn = pool.acquire().await?;
        // When there is nothing to bind, execute raw SQL directly to avoid prepared statement issues
        // (some SQL like CREATE PROCEDURE doesn't support prepared statements)
        let result = if values.is_empty() {
            use sqlx::Executor;
            (&mut *conn).execute(sql).await
        } else {
            build_query(sql, values).execute(&mut *conn).await
        };
        result
            .map(|r| r.rows_affected())
            .map_err(|e| DbError::execution(sql, e))
    }

    pub async fn query_rows<T, F>(
        pool: &MySqlPool,
        sql: &str,
        values: &[BoundValue<'_>],
        limit: Option<usize>,
        mapper: F,
    ) -> DbResult<(Vec<T>, bool)>
    where
        F: FnMut(&RowCursor<'_>) -> DbResult<T>,
    {
        let mut conn = pool.acquire().await?;
        let rows = if values.is_empty() {
            use sqlx::Executor;
            (&mut *conn).fetch(sql)
        } else {
            build_query(sql, values).fetch(&mut *conn)
        };
        let mut cursor = RowCursor::new(sql, rows.map(|r| r.map(DbRow::MySql)).boxed());
        read_rows(&mut cursor, limit, mapper).await
    }

    pub async fn insert_with_keys(
        pool: &MySqlPool,
        sql: &str,
        values: &[BoundValue<'_>],
        retrieval: KeyRetrieval,
        requested: &[String],
    ) -> DbResult<(u64, Vec<(String, i64)>)> {
        let mut tx = pool.begin().await?;
        let outcome = insert_in_tx(&mut tx, sql, values, retrieval, requested).await;
        finish(tx, outcome).await
    }

    async fn insert_in_tx(
        tx: &mut Transaction<'static, MySql>,
        sql: &str,
        values: &[BoundValue<'_>],
        retrieval: KeyRetrieval,
        requested: &[String],
    ) -> DbResult<(u64, Vec<(String, i64)>)> {
        let (rows_affected, rows) = match retrieval {
            KeyRetrieval::Returning => {
                let rows = build_query(sql, values)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(sql, e))?;
                (rows.len() as u64, rows)
            }
            KeyRetrieval::FollowUpQuery(key_sql) => {
                let done = build_query(sql, values)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(sql, e))?;
                let rows = sqlx::query(key_sql)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(key_sql, e))?;
                (done.rows_affected(), rows)
            }
        };
        let rows: Vec<DbRow> = rows.into_iter().map(DbRow::MySql).collect();
        let keys = collect_generated_keys(&rows, requested, retrieval, sql)?;
        Ok((rows_affected, keys))
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::postgres::PgArguments;
    use sqlx::{PgPool, Postgres, Transaction};

    fn build_query<'q>(
        sql: &'q str,
        values: &[BoundValue<'q>],
    ) -> sqlx::query::Query<'q, Postgres, PgArguments> {
        let mut query = sqlx::query(sql);
        for value in values {
            query = bind_postgres_param(query, *value);
        }
        query
    }

    pub async fn execute(pool: &PgPool, sql: &str, values: &[BoundValue<'_>]) -> DbResult<u64> {
        let mut conn = pool.acquire().await?;
        let result = if values.is_empty() {
            use sqlx::Executor;
            (&mut *conn).execute(sql).await
        } else {
            build_query(sql, values).execute(&mut *conn).await
        };
        result
            .map(|r| r.rows_affected())
            .map_err(|e| DbError::execution(sql, e))
    }

    pub async fn query_rows<T, F>(
        pool: &PgPool,
        sql: &str,
        values: &[BoundValue<'_>],
        limit: Option<usize>,
        mapper: F,
    ) -> DbResult<(Vec<T>, bool)>
    where
        F: FnMut(&RowCursor<'_>) -> DbResult<T>,
    {
        let mut conn = pool.acquire().await?;
        let rows = if values.is_empty() {
            use sqlx::Executor;
            (&mut *conn).fetch(sql)
        } else {
            build_query(sql, values).fetch(&mut *conn)
        };
        let mut cursor = RowCursor::new(sql, rows.map(|r| r.map(DbRow::Postgres)).boxed());
        read_rows(&mut cursor, limit, mapper).await
    }

    pub async fn insert_with_keys(
        pool: &PgPool,
        sql: &str,
        values: &[BoundValue<'_>],
        retrieval: KeyRetrieval,
        requested: &[String],
    ) -> DbResult<(u64, Vec<(String, i64)>)> {
        let mut tx = pool.begin().await?;
        let outcome = insert_in_tx(&mut tx, sql, values, retrieval, requested).await;
        finish(tx, outcome).await
    }

    async fn insert_in_tx(
        tx: &mut Transaction<'static, Postgres>,
        sql: &str,
        values: &[BoundValue<'_>],
        retrieval: KeyRetrieval,
        requested: &[String],
    ) -> DbResult<(u64, Vec<(String, i64)>)> {
        let (rows_affected, rows) = match retrieval {
            KeyRetrieval::Returning => {
                let rows = build_query(sql, values)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(sql, e))?;
                (rows.len() as u64, rows)
            }
            KeyRetrieval::FollowUpQuery(key_sql) => {
                let done = build_query(sql, values)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(sql, e))?;
                let rows = sqlx::query(key_sql)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(key_sql, e))?;
                (done.rows_affected(), rows)
            }
        };
        let rows: Vec<DbRow> = rows.into_iter().map(DbRow::Postgres).collect();
        let keys = collect_generated_keys(&rows, requested, retrieval, sql)?;
        Ok((rows_affected, keys))
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::sqlite::SqliteArguments;
    use sqlx::{Sqlite, SqlitePool, Transaction};

    fn build_query<'q>(
        sql: &'q str,
        values: &[BoundValue<'q>],
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        let mut query = sqlx::query(sql);
        for value in values {
            query = bind_sqlite_param(query, *value);
        }
        query
    }

    pub async fn execute(pool: &SqlitePool, sql: &str, values: &[BoundValue<'_>]) -> DbResult<u64> {
        let mut conn = pool.acquire().await?;
        let result = if values.is_empty() {
            use sqlx::Executor;
            (&mut *conn).execute(sql).await
        } else {
            build_query(sql, values).execute(&mut *conn).await
        };
        result
            .map(|r| r.rows_affected())
            .map_err(|e| DbError::execution(sql, e))
    }

    pub async fn query_rows<T, F>(
        pool: &SqlitePool,
        sql: &str,
        values: &[BoundValue<'_>],
        limit: Option<usize>,
        mapper: F,
    ) -> DbResult<(Vec<T>, bool)>
    where
        F: FnMut(&RowCursor<'_>) -> DbResult<T>,
    {
        let mut conn = pool.acquire().await?;
        let rows = if values.is_empty() {
            use sqlx::Executor;
            (&mut *conn).fetch(sql)
        } else {
            build_query(sql, values).fetch(&mut *conn)
        };
        let mut cursor = RowCursor::new(sql, rows.map(|r| r.map(DbRow::SQLite)).boxed());
        read_rows(&mut cursor, limit, mapper).await
    }

    pub async fn insert_with_keys(
        pool: &SqlitePool,
        sql: &str,
        values: &[BoundValue<'_>],
        retrieval: KeyRetrieval,
        requested: &[String],
    ) -> DbResult<(u64, Vec<(String, i64)>)> {
        let mut tx = pool.begin().await?;
        let outcome = insert_in_tx(&mut tx, sql, values, retrieval, requested).await;
        finish(tx, outcome).await
    }

    async fn insert_in_tx(
        tx: &mut Transaction<'static, Sqlite>,
        sql: &str,
        values: &[BoundValue<'_>],
        retrieval: KeyRetrieval,
        requested: &[String],
    ) -> DbResult<(u64, Vec<(String, i64)>)> {
        let (rows_affected, rows) = match retrieval {
            KeyRetrieval::Returning => {
                let rows = build_query(sql, values)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(sql, e))?;
                (rows.len() as u64, rows)
            }
            KeyRetrieval::FollowUpQuery(key_sql) => {
                let done = build_query(sql, values)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(sql, e))?;
                let rows = sqlx::query(key_sql)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| DbError::execution(key_sql, e))?;
                (done.rows_affected(), rows)
            }
        };
        let rows: Vec<DbRow> = rows.into_iter().map(DbRow::SQLite).collect();
        let keys = collect_generated_keys(&rows, requested, retrieval, sql)?;
        Ok((rows_affected, keys))
    }
}
