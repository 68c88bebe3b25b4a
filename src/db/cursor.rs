//! Forward-only row cursor.
//!
//! `DbRow` wraps one engine-specific row and exposes typed accessors;
//! `RowCursor` walks a result stream one row at a time. Column indices are
//! zero-based.
//!
//! Decoding follows the same layout as the rest of the crate: shared helpers
//! at the top, database-specific decoders in submodules.

use crate::db::types::{ColumnType, sql_type_id_from_name};
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use chrono::{DateTime, NaiveDateTime};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};

// =============================================================================
// Rows
// =============================================================================

/// One result row from any supported engine.
pub enum DbRow {
    MySql(MySqlRow),
    Postgres(PgRow),
    SQLite(SqliteRow),
}

impl std::fmt::Debug for DbRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbRow")
            .field("database_type", &self.database_type())
            .field("columns", &self.len())
            .finish()
    }
}

impl DbRow {
    /// Engine that produced this row.
    pub fn database_type(&self) -> DatabaseType {
        match self {
            DbRow::MySql(_) => DatabaseType::MySQL,
            DbRow::Postgres(_) => DatabaseType::PostgreSQL,
            DbRow::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        impl_db_dispatch!(DbRow, self, {
            MySql(r) => r.columns().len(),
            Postgres(r) => r.columns().len(),
            SQLite(r) => r.columns().len(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column label, or a positional placeholder when out of range.
    pub fn column_name(&self, index: usize) -> String {
        let name = impl_db_dispatch!(DbRow, self, {
            MySql(r) => r.columns().get(index).map(|c| c.name().to_string()),
            Postgres(r) => r.columns().get(index).map(|c| c.name().to_string()),
            SQLite(r) => r.columns().get(index).map(|c| c.name().to_string()),
        });
        name.unwrap_or_else(|| format!("column {}", index))
    }

    /// Engine type name of the value at `index`.
    pub fn type_name(&self, index: usize) -> DbResult<String> {
        impl_db_dispatch!(DbRow, self, {
            MySql(r) => column_type_name(r, index),
            Postgres(r) => column_type_name(r, index),
            SQLite(r) => sqlite::value_type_name(r, index),
        })
    }

    /// SQL type code of the value at `index`.
    pub fn sql_type_id(&self, index: usize) -> DbResult<i32> {
        let type_name = self.type_name(index)?;
        Ok(sql_type_id_from_name(&type_name, self.database_type()))
    }

    /// Registry type of the value at `index`.
    pub fn column_type(&self, index: usize) -> DbResult<ColumnType> {
        ColumnType::lookup_by_sql_type_id(self.sql_type_id(index)?)
    }

    pub fn is_null(&self, index: usize) -> DbResult<bool> {
        impl_db_dispatch!(DbRow, self, {
            MySql(r) => value_is_null(r, index),
            Postgres(r) => value_is_null(r, index),
            SQLite(r) => value_is_null(r, index),
        })
    }

    pub fn get_long(&self, index: usize) -> DbResult<i64> {
        let value = impl_db_dispatch!(DbRow, self, {
            MySql(r) => mysql::get_long(r, index)?,
            Postgres(r) => postgres::get_long(r, index)?,
            SQLite(r) => sqlite::get_long(r, index)?,
        });
        value.ok_or_else(|| DbError::type_mismatch(index, "integer", "NULL"))
    }

    pub fn get_int(&self, index: usize) -> DbResult<i32> {
        let value = self.get_long(index)?;
        i32::try_from(value)
            .map_err(|_| DbError::type_mismatch(index, "32-bit integer", value.to_string()))
    }

    pub fn get_short(&self, index: usize) -> DbResult<i16> {
        let value = self.get_long(index)?;
        i16::try_from(value)
            .map_err(|_| DbError::type_mismatch(index, "16-bit integer", value.to_string()))
    }

    /// Boolean through the column type registry, so 0/1 integer columns work
    /// on engines without a native boolean.
    ///
    /// Like the other scalar getters (`get_long`, `get_int`, `get_short`,
    /// `get_double`) a NULL value is a `TypeMismatch`; check `is_null` first.
    /// Only `get_string`, `get_bytes` and `get_timestamp` map NULL to `None`.
    pub fn get_bool(&self, index: usize) -> DbResult<bool> {
        self.column_type(index)
            .map_err(|_| {
                DbError::type_mismatch(
                    index,
                    "boolean",
                    self.type_name(index).unwrap_or_default(),
                )
            })?
            .convert_to_bool(self, index)
    }

    /// Decode a native boolean value.
    pub(crate) fn decode_bool(&self, index: usize) -> DbResult<bool> {
        let value = impl_db_dispatch!(DbRow, self, {
            MySql(r) => decode_optional::<_, bool>(r, index, "boolean")?,
            Postgres(r) => decode_optional::<_, bool>(r, index, "boolean")?,
            SQLite(r) => decode_optional::<_, bool>(r, index, "boolean")?,
        });
        value.ok_or_else(|| DbError::type_mismatch(index, "boolean", "NULL"))
    }

    pub fn get_double(&self, index: usize) -> DbResult<f64> {
        let value = impl_db_dispatch!(DbRow, self, {
            MySql(r) => mysql::get_double(r, index)?,
            Postgres(r) => postgres::get_double(r, index)?,
            SQLite(r) => sqlite::get_double(r, index)?,
        });
        value.ok_or_else(|| DbError::type_mismatch(index, "double", "NULL"))
    }

    /// Text value; `None` for SQL NULL.
    pub fn get_string(&self, index: usize) -> DbResult<Option<String>> {
        impl_db_dispatch!(DbRow, self, {
            MySql(r) => decode_optional::<_, String>(r, index, "string"),
            Postgres(r) => decode_optional::<_, String>(r, index, "string"),
            SQLite(r) => decode_optional::<_, String>(r, index, "string"),
        })
    }

    /// Binary value; `None` for SQL NULL.
    pub fn get_bytes(&self, index: usize) -> DbResult<Option<Vec<u8>>> {
        impl_db_dispatch!(DbRow, self, {
            MySql(r) => decode_optional::<_, Vec<u8>>(r, index, "bytes"),
            Postgres(r) => decode_optional::<_, Vec<u8>>(r, index, "bytes"),
            SQLite(r) => decode_optional::<_, Vec<u8>>(r, index, "bytes"),
        })
    }

    /// Timestamp value; integer columns hold epoch milliseconds.
    pub fn get_timestamp(&self, index: usize) -> DbResult<Option<NaiveDateTime>> {
        if self.is_null(index)? {
            return Ok(None);
        }
        if self.column_type(index).is_ok_and(|t| t.is_integer_family()) {
            let millis = self.get_long(index)?;
            return DateTime::from_timestamp_millis(millis)
                .map(|d| Some(d.naive_utc()))
                .ok_or_else(|| DbError::type_mismatch(index, "timestamp", millis.to_string()));
        }
        impl_db_dispatch!(DbRow, self, {
            MySql(r) => decode_optional::<_, NaiveDateTime>(r, index, "timestamp"),
            Postgres(r) => decode_optional::<_, NaiveDateTime>(r, index, "timestamp"),
            SQLite(r) => decode_optional::<_, NaiveDateTime>(r, index, "timestamp"),
        })
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn decode_error(index: usize, expected: &str, err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::ColumnDecode { source, .. } => {
            DbError::type_mismatch(index, expected, source.to_string())
        }
        sqlx::Error::ColumnIndexOutOfBounds { len, .. } => {
            DbError::type_mismatch(index, expected, format!("out of bounds (len: {})", len))
        }
        other => DbError::type_mismatch(index, expected, other.to_string()),
    }
}

fn decode_optional<'r, R, T>(row: &'r R, index: usize, expected: &str) -> DbResult<Option<T>>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(|e| decode_error(index, expected, e))
}

fn value_is_null<R>(row: &R, index: usize) -> DbResult<bool>
where
    R: Row,
    usize: ColumnIndex<R>,
{
    use sqlx::ValueRef;
    row.try_get_raw(index)
        .map(|v| v.is_null())
        .map_err(|e| decode_error(index, "a column", e))
}

fn column_type_name<R>(row: &R, index: usize) -> DbResult<String>
where
    R: Row,
{
    row.columns()
        .get(index)
        .map(|c| c.type_info().name().to_string())
        .ok_or_else(|| {
            DbError::type_mismatch(
                index,
                "a column",
                format!("out of bounds (len: {})", row.columns().len()),
            )
        })
}

fn mismatch<R: Row>(row: &R, index: usize, expected: &str) -> DbError {
    let actual = column_type_name(row, index).unwrap_or_else(|_| "unknown".to_string());
    DbError::type_mismatch(index, expected, actual)
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn get_long(row: &MySqlRow, idx: usize) -> DbResult<Option<i64>> {
        // Check NULL first
        if value_is_null(row, idx)? {
            return Ok(None);
        }
        // Try signed types
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(Some(v));
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(Some(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(Some(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return Ok(Some(v.into()));
        }
        // Try unsigned types
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return i64::try_from(v)
                .map(Some)
                .map_err(|_| DbError::type_mismatch(idx, "64-bit integer", v.to_string()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return Ok(Some(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return Ok(Some(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<u8>, _>(idx) {
            return Ok(Some(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(idx) {
            return Ok(Some(v.into()));
        }
        Err(mismatch(row, idx, "integer"))
    }

    pub fn get_double(row: &MySqlRow, idx: usize) -> DbResult<Option<f64>> {
        if value_is_null(row, idx)? {
            return Ok(None);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(Some(v));
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return Ok(Some(v.into()));
        }
        Err(mismatch(row, idx, "double"))
    }
}

mod postgres {
    use super::*;

    pub fn get_long(row: &PgRow, idx: usize) -> DbResult<Option<i64>> {
        if value_is_null(row, idx)? {
            return Ok(None);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(Some(v));
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(Some(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(Some(v.into()));
        }
        Err(mismatch(row, idx, "integer"))
    }

    pub fn get_double(row: &PgRow, idx: usize) -> DbResult<Option<f64>> {
        if value_is_null(row, idx)? {
            return Ok(None);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(Some(v));
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return Ok(Some(v.into()));
        }
        Err(mismatch(row, idx, "double"))
    }
}

mod sqlite {
    use super::*;
    use sqlx::ValueRef;

    /// SQLite types values, not columns: report the stored value's type and
    /// fall back to the declared column type for NULL.
    pub fn value_type_name(row: &SqliteRow, idx: usize) -> DbResult<String> {
        let value = row
            .try_get_raw(idx)
            .map_err(|e| decode_error(idx, "a column", e))?;
        if value.is_null() {
            return column_type_name(row, idx);
        }
        Ok(value.type_info().name().to_string())
    }

    pub fn get_long(row: &SqliteRow, idx: usize) -> DbResult<Option<i64>> {
        match row.try_get::<Option<i64>, _>(idx) {
            Ok(v) => Ok(v),
            Err(_) => Err(mismatch(row, idx, "integer")),
        }
    }

    pub fn get_double(row: &SqliteRow, idx: usize) -> DbResult<Option<f64>> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(Some(v as f64));
        }
        Err(mismatch(row, idx, "double"))
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Position of a cursor in its result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    BeforeFirst,
    OnRow,
    Exhausted,
    Closed,
}

/// Forward-only cursor over one result set.
///
/// The cursor borrows the connection that produced it; dropping or closing it
/// releases the underlying statement.
pub struct RowCursor<'c> {
    statement: String,
    rows: Option<BoxStream<'c, Result<DbRow, sqlx::Error>>>,
    current: Option<DbRow>,
    state: CursorState,
}

impl<'c> RowCursor<'c> {
    /// Wrap a row stream produced by `statement`.
    pub fn new(statement: impl Into<String>, rows: BoxStream<'c, Result<DbRow, sqlx::Error>>) -> Self {
        Self {
            statement: statement.into(),
            rows: Some(rows),
            current: None,
            state: CursorState::BeforeFirst,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Move to the next row. Returns `false` once the results are exhausted.
    pub async fn advance(&mut self) -> DbResult<bool> {
        match self.state {
            CursorState::Closed => return Err(DbError::cursor_closed("cursor has been closed")),
            CursorState::Exhausted => return Ok(false),
            CursorState::BeforeFirst | CursorState::OnRow => {}
        }

        let Some(rows) = self.rows.as_mut() else {
            return Err(DbError::cursor_closed("cursor has been closed"));
        };

        match rows.next().await {
            Some(Ok(row)) => {
                self.current = Some(row);
                self.state = CursorState::OnRow;
                Ok(true)
            }
            Some(Err(e)) => {
                self.close();
                Err(DbError::execution(self.statement.clone(), e))
            }
            None => {
                self.current = None;
                self.rows = None;
                self.state = CursorState::Exhausted;
                Ok(false)
            }
        }
    }

    /// Release the result set. Further use fails with `CursorClosed`.
    pub fn close(&mut self) {
        self.rows = None;
        self.current = None;
        self.state = CursorState::Closed;
    }

    /// The current row.
    pub fn row(&self) -> DbResult<&DbRow> {
        match (self.state, self.current.as_ref()) {
            (CursorState::OnRow, Some(row)) => Ok(row),
            (CursorState::BeforeFirst, _) => {
                Err(DbError::cursor_closed("advance() has not been called"))
            }
            (CursorState::Exhausted, _) => Err(DbError::cursor_closed("no more rows")),
            _ => Err(DbError::cursor_closed("cursor has been closed")),
        }
    }

    pub fn get_long(&self, index: usize) -> DbResult<i64> {
        self.row()?.get_long(index)
    }

    pub fn get_int(&self, index: usize) -> DbResult<i32> {
        self.row()?.get_int(index)
    }

    pub fn get_short(&self, index: usize) -> DbResult<i16> {
        self.row()?.get_short(index)
    }

    pub fn get_bool(&self, index: usize) -> DbResult<bool> {
        self.row()?.get_bool(index)
    }

    pub fn get_double(&self, index: usize) -> DbResult<f64> {
        self.row()?.get_double(index)
    }

    pub fn get_string(&self, index: usize) -> DbResult<Option<String>> {
        self.row()?.get_string(index)
    }

    pub fn get_bytes(&self, index: usize) -> DbResult<Option<Vec<u8>>> {
        self.row()?.get_bytes(index)
    }

    pub fn get_timestamp(&self, index: usize) -> DbResult<Option<NaiveDateTime>> {
        self.row()?.get_timestamp(index)
    }

    pub fn is_null(&self, index: usize) -> DbResult<bool> {
        self.row()?.is_null(index)
    }

    pub fn column_count(&self) -> DbResult<usize> {
        Ok(self.row()?.len())
    }
}

impl std::fmt::Debug for RowCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor")
            .field("statement", &self.statement)
            .field("state", &self.state)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
