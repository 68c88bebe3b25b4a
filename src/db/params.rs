//! Parameter binding utilities for database queries.
//!
//! Arguments arrive as engine-neutral `SqlArg` values next to a parallel list
//! of `TypeTag`s. Binding happens in two steps: `bind_values` checks the whole
//! argument list against its tags and coerces every value into a
//! `BoundValue`, then the per-engine `bind_*_param` functions attach the
//! values to a sqlx query in order. Nothing reaches the engine unless the
//! first step succeeds for every position.

use crate::db::types::{ColumnType, TypeTag, sql_type};
use crate::error::{DbError, DbResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

/// A statement argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlArg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl SqlArg {
    fn kind(&self) -> &'static str {
        match self {
            SqlArg::Null => "null",
            SqlArg::Bool(_) => "bool",
            SqlArg::Int(_) => "int",
            SqlArg::Float(_) => "float",
            SqlArg::String(_) => "string",
            SqlArg::Bytes(_) => "bytes",
            SqlArg::Timestamp(_) => "timestamp",
        }
    }
}

impl From<bool> for SqlArg {
    fn from(v: bool) -> Self {
        SqlArg::Bool(v)
    }
}

impl From<i64> for SqlArg {
    fn from(v: i64) -> Self {
        SqlArg::Int(v)
    }
}

impl From<i32> for SqlArg {
    fn from(v: i32) -> Self {
        SqlArg::Int(v.into())
    }
}

impl From<f64> for SqlArg {
    fn from(v: f64) -> Self {
        SqlArg::Float(v)
    }
}

impl From<&str> for SqlArg {
    fn from(v: &str) -> Self {
        SqlArg::String(v.to_string())
    }
}

impl From<String> for SqlArg {
    fn from(v: String) -> Self {
        SqlArg::String(v)
    }
}

impl From<Vec<u8>> for SqlArg {
    fn from(v: Vec<u8>) -> Self {
        SqlArg::Bytes(v)
    }
}

impl From<NaiveDateTime> for SqlArg {
    fn from(v: NaiveDateTime) -> Self {
        SqlArg::Timestamp(v)
    }
}

impl<T: Into<SqlArg>> From<Option<T>> for SqlArg {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlArg::Null, Into::into)
    }
}

/// Rust type used for a typed SQL null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullKind {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Text,
    Bytes,
    Timestamp,
}

/// A value coerced to the exact Rust type its tag asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundValue<'q> {
    Null(NullKind),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(&'q str),
    Bytes(&'q [u8]),
    Timestamp(NaiveDateTime),
}

/// Check `args` against `tags` and coerce every argument.
///
/// Fails with `DbError::Bind` on a count mismatch or when any value cannot
/// be represented by its tag.
pub fn bind_values<'q>(args: &'q [SqlArg], tags: &[TypeTag]) -> DbResult<Vec<BoundValue<'q>>> {
    if args.len() != tags.len() {
        return Err(DbError::bind(format!(
            "{} arguments but {} type tags",
            args.len(),
            tags.len()
        )));
    }
    args.iter()
        .zip(tags)
        .enumerate()
        .map(|(position, (arg, tag))| coerce(position, arg, *tag))
        .collect()
}

/// Coerce one argument for its tag.
pub fn coerce(position: usize, arg: &SqlArg, tag: TypeTag) -> DbResult<BoundValue<'_>> {
    let code = tag.sql_type();
    let incompatible = || {
        DbError::bind(format!(
            "argument {} ({}) cannot be bound as {} (SQL type {})",
            position,
            arg.kind(),
            tag.column_type(),
            code
        ))
    };
    let out_of_range = |v: i64| {
        DbError::bind(format!(
            "argument {} value {} is out of range for {} (SQL type {})",
            position,
            v,
            tag.column_type(),
            code
        ))
    };

    let kind = null_kind(code).ok_or_else(|| {
        DbError::bind(format!(
            "argument {} has unsupported SQL type {}",
            position, code
        ))
    })?;
    if matches!(arg, SqlArg::Null) {
        return Ok(BoundValue::Null(kind));
    }

    let value = match (kind, arg) {
        (NullKind::Bool, SqlArg::Bool(v)) => BoundValue::Bool(*v),
        (NullKind::Bool, SqlArg::Int(v @ (0 | 1))) => BoundValue::Bool(*v == 1),

        (NullKind::I16, SqlArg::Bool(v)) => BoundValue::I16((*v).into()),
        (NullKind::I16, SqlArg::Int(v)) => {
            let narrow = if code == sql_type::TINYINT {
                i8::try_from(*v).map(i16::from).ok()
            } else {
                i16::try_from(*v).ok()
            };
            BoundValue::I16(narrow.ok_or_else(|| out_of_range(*v))?)
        }
        (NullKind::I32, SqlArg::Bool(v)) => BoundValue::I32((*v).into()),
        (NullKind::I32, SqlArg::Int(v)) => {
            BoundValue::I32(i32::try_from(*v).map_err(|_| out_of_range(*v))?)
        }
        (NullKind::I64, SqlArg::Bool(v)) => BoundValue::I64((*v).into()),
        (NullKind::I64, SqlArg::Int(v)) => BoundValue::I64(*v),
        (NullKind::I64, SqlArg::Timestamp(ts)) if tag.column_type() == ColumnType::DateLong => {
            BoundValue::I64(ts.and_utc().timestamp_millis())
        }

        (NullKind::F32, SqlArg::Float(v)) => BoundValue::F32(*v as f32),
        (NullKind::F32, SqlArg::Int(v)) => BoundValue::F32(*v as f32),
        (NullKind::F64, SqlArg::Float(v)) => BoundValue::F64(*v),
        (NullKind::F64, SqlArg::Int(v)) => BoundValue::F64(*v as f64),

        (NullKind::Text, SqlArg::String(v)) => BoundValue::Text(v.as_str()),
        (NullKind::Bytes, SqlArg::Bytes(v)) => BoundValue::Bytes(v.as_slice()),
        (NullKind::Timestamp, SqlArg::Timestamp(v)) => BoundValue::Timestamp(*v),

        _ => return Err(incompatible()),
    };
    Ok(value)
}

/// Rust-side type for a SQL type code; `None` for codes nothing binds.
fn null_kind(code: i32) -> Option<NullKind> {
    let kind = match code {
        sql_type::BOOLEAN | sql_type::BIT => NullKind::Bool,
        // sqlx has no portable 8-bit integer, TINYINT values travel as i16
        sql_type::TINYINT | sql_type::SMALLINT => NullKind::I16,
        sql_type::INTEGER => NullKind::I32,
        sql_type::BIGINT => NullKind::I64,
        sql_type::FLOAT | sql_type::REAL => NullKind::F32,
        sql_type::DOUBLE | sql_type::NUMERIC | sql_type::DECIMAL => NullKind::F64,
        sql_type::CHAR | sql_type::VARCHAR | sql_type::LONGVARCHAR => NullKind::Text,
        sql_type::BINARY | sql_type::VARBINARY | sql_type::LONGVARBINARY => NullKind::Bytes,
        sql_type::TIMESTAMP | sql_type::DATE => NullKind::Timestamp,
        _ => return None,
    };
    Some(kind)
}

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    value: BoundValue<'q>,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match value {
        BoundValue::Null(kind) => match kind {
            NullKind::Bool => query.bind(None::<bool>),
            NullKind::I16 => query.bind(None::<i16>),
            NullKind::I32 => query.bind(None::<i32>),
            NullKind::I64 => query.bind(None::<i64>),
            NullKind::F32 => query.bind(None::<f32>),
            NullKind::F64 => query.bind(None::<f64>),
            NullKind::Text => query.bind(None::<String>),
            NullKind::Bytes => query.bind(None::<Vec<u8>>),
            NullKind::Timestamp => query.bind(None::<NaiveDateTime>),
        },
        BoundValue::Bool(v) => query.bind(v),
        BoundValue::I16(v) => query.bind(v),
        BoundValue::I32(v) => query.bind(v),
        BoundValue::I64(v) => query.bind(v),
        BoundValue::F32(v) => query.bind(v),
        BoundValue::F64(v) => query.bind(v),
        BoundValue::Text(v) => query.bind(v),
        BoundValue::Bytes(v) => query.bind(v),
        BoundValue::Timestamp(v) => query.bind(v),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: BoundValue<'q>,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        // Typed nulls let Postgres infer the parameter type
        BoundValue::Null(kind) => match kind {
            NullKind::Bool => query.bind(None::<bool>),
            NullKind::I16 => query.bind(None::<i16>),
            NullKind::I32 => query.bind(None::<i32>),
            NullKind::I64 => query.bind(None::<i64>),
            NullKind::F32 => query.bind(None::<f32>),
            NullKind::F64 => query.bind(None::<f64>),
            NullKind::Text => query.bind(None::<String>),
            NullKind::Bytes => query.bind(None::<Vec<u8>>),
            NullKind::Timestamp => query.bind(None::<NaiveDateTime>),
        },
        BoundValue::Bool(v) => query.bind(v),
        BoundValue::I16(v) => query.bind(v),
        BoundValue::I32(v) => query.bind(v),
        BoundValue::I64(v) => query.bind(v),
        BoundValue::F32(v) => query.bind(v),
        BoundValue::F64(v) => query.bind(v),
        BoundValue::Text(v) => query.bind(v),
        BoundValue::Bytes(v) => query.bind(v),
        BoundValue::Timestamp(v) => query.bind(v),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: BoundValue<'q>,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        // SQLite nulls are untyped
        BoundValue::Null(_) => query.bind(None::<i64>),
        BoundValue::Bool(v) => query.bind(v),
        BoundValue::I16(v) => query.bind(v),
        BoundValue::I32(v) => query.bind(v),
        BoundValue::I64(v) => query.bind(v),
        BoundValue::F32(v) => query.bind(v),
        BoundValue::F64(v) => query.bind(v),
        BoundValue::Text(v) => query.bind(v),
        BoundValue::Bytes(v) => query.bind(v),
        BoundValue::Timestamp(v) => query.bind(v),
    }
}
