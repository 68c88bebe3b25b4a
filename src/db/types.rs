//! Column type registry.
//!
//! This module maps abstract field semantics to engine-neutral SQL type codes
//! and back.
//!
//! # Architecture
//!
//! Type handling uses a two-phase approach:
//! 1. `sql_type_id_from_name` classifies an engine's reported type name into a
//!    numeric SQL type code
//! 2. `ColumnType::lookup_by_sql_type_id` resolves that code to the semantic
//!    type that knows how to convert the value (numeric keys, booleans)
//!
//! The registry is a pure function table and is safe to share between threads.

use crate::db::cursor::DbRow;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use serde::{Deserialize, Serialize};

// =============================================================================
// SQL Type Codes
// =============================================================================

/// Numeric SQL type codes (X/Open and ANSI values).
pub mod sql_type {
    pub const BIT: i32 = -7;
    pub const TINYINT: i32 = -6;
    pub const SMALLINT: i32 = 5;
    pub const INTEGER: i32 = 4;
    pub const BIGINT: i32 = -5;
    pub const FLOAT: i32 = 6;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const NUMERIC: i32 = 2;
    pub const DECIMAL: i32 = 3;
    pub const CHAR: i32 = 1;
    pub const VARCHAR: i32 = 12;
    pub const LONGVARCHAR: i32 = -1;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const BINARY: i32 = -2;
    pub const VARBINARY: i32 = -3;
    pub const LONGVARBINARY: i32 = -4;
    pub const NULL: i32 = 0;
    pub const OTHER: i32 = 1111;
    pub const BOOLEAN: i32 = 16;
}

// =============================================================================
// Semantic Column Types
// =============================================================================

/// Abstract field semantics, independent of any engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    LongString,
    /// Timestamp stored in the engine's native timestamp type
    Date,
    /// Timestamp stored as epoch milliseconds
    DateLong,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    /// Opaque bytes
    Serializable,
    EnumString,
    EnumInteger,
}

impl ColumnType {
    /// The SQL type code used when binding values of this type.
    pub fn sql_type_id(&self) -> i32 {
        match self {
            Self::String | Self::EnumString => sql_type::VARCHAR,
            Self::LongString => sql_type::LONGVARCHAR,
            Self::Date => sql_type::TIMESTAMP,
            Self::DateLong | Self::Long => sql_type::BIGINT,
            Self::Boolean => sql_type::BOOLEAN,
            Self::Byte => sql_type::TINYINT,
            Self::Short => sql_type::SMALLINT,
            Self::Integer | Self::EnumInteger => sql_type::INTEGER,
            Self::Float => sql_type::FLOAT,
            Self::Double => sql_type::DOUBLE,
            Self::Serializable => sql_type::VARBINARY,
        }
    }

    /// Resolve a SQL type code reported by an engine.
    pub fn lookup_by_sql_type_id(id: i32) -> DbResult<Self> {
        match id {
            sql_type::VARCHAR | sql_type::CHAR => Ok(Self::String),
            sql_type::LONGVARCHAR => Ok(Self::LongString),
            sql_type::TIMESTAMP | sql_type::DATE => Ok(Self::Date),
            sql_type::BOOLEAN | sql_type::BIT => Ok(Self::Boolean),
            sql_type::TINYINT => Ok(Self::Byte),
            sql_type::SMALLINT => Ok(Self::Short),
            sql_type::INTEGER => Ok(Self::Integer),
            sql_type::BIGINT => Ok(Self::Long),
            sql_type::FLOAT | sql_type::REAL => Ok(Self::Float),
            sql_type::DOUBLE => Ok(Self::Double),
            sql_type::BINARY | sql_type::VARBINARY | sql_type::LONGVARBINARY => {
                Ok(Self::Serializable)
            }
            other => Err(DbError::unknown_type(other)),
        }
    }

    /// True for types whose values fit an `i64` identifier.
    pub fn is_integer_family(&self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Short | Self::Integer | Self::Long | Self::EnumInteger
        )
    }

    /// Convert the value at `index` into a numeric key.
    pub fn convert_to_numeric_key(&self, row: &DbRow, index: usize) -> DbResult<i64> {
        let invalid = || DbError::invalid_key_type(row.column_name(index), self.name(), self.sql_type_id());
        if !self.is_integer_family() {
            return Err(invalid());
        }
        if row.is_null(index)? {
            return Err(invalid());
        }
        row.get_long(index).map_err(|_| invalid())
    }

    /// Interpret the value at `index` as a boolean.
    ///
    /// Engines without a native boolean store 0/1 in an integer column.
    pub fn convert_to_bool(&self, row: &DbRow, index: usize) -> DbResult<bool> {
        match self {
            Self::Boolean => row.decode_bool(index),
            t if t.is_integer_family() => Ok(row.get_long(index)? != 0),
            other => Err(DbError::type_mismatch(index, "boolean", other.name())),
        }
    }

    /// Name used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::LongString => "LongString",
            Self::Date => "Date",
            Self::DateLong => "DateLong",
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::Short => "Short",
            Self::Integer => "Integer",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Serializable => "Serializable",
            Self::EnumString => "EnumString",
            Self::EnumInteger => "EnumInteger",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Type Tags
// =============================================================================

/// Tells the binding layer which typed bind to use for one argument.
///
/// Obtain tags from a dialect (`Dialect::type_tag`) so engines without a
/// native boolean get an integer bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeTag {
    column_type: ColumnType,
    sql_type: i32,
}

impl TypeTag {
    /// Tag using the column type's own SQL type code.
    pub fn of(column_type: ColumnType) -> Self {
        Self {
            column_type,
            sql_type: column_type.sql_type_id(),
        }
    }

    /// Tag with an explicit binding code.
    pub fn with_sql_type(column_type: ColumnType, sql_type: i32) -> Self {
        Self {
            column_type,
            sql_type,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn sql_type(&self) -> i32 {
        self.sql_type
    }
}

// =============================================================================
// Type Name Classification
// =============================================================================

/// Classify an engine's type name into a SQL type code.
///
/// Unrecognized names map to `sql_type::OTHER`, which the registry rejects.
pub fn sql_type_id_from_name(type_name: &str, db: DatabaseType) -> i32 {
    let lower = type_name.trim().to_lowercase();
    // "INT(11) UNSIGNED" -> "int unsigned"
    let base = match lower.find('(') {
        Some(open) => {
            let close = lower[open..].find(')').map(|c| open + c + 1).unwrap_or(lower.len());
            format!("{}{}", &lower[..open], &lower[close..])
        }
        None => lower.clone(),
    };
    let unsigned = base.contains("unsigned");
    let base = base.replace("unsigned", "").trim().to_string();

    match base.as_str() {
        "null" => sql_type::NULL,
        "bool" | "boolean" => sql_type::BOOLEAN,
        "bit" => sql_type::BIT,
        "tinyint" | "tiny" => {
            if unsigned {
                sql_type::SMALLINT
            } else {
                sql_type::TINYINT
            }
        }
        "smallint" | "int2" => {
            if unsigned {
                sql_type::INTEGER
            } else {
                sql_type::SMALLINT
            }
        }
        "integer" | "int" | "int4" | "mediumint" | "serial" => {
            // SQLite integers are 64-bit
            if unsigned || db == DatabaseType::SQLite {
                sql_type::BIGINT
            } else {
                sql_type::INTEGER
            }
        }
        "bigint" | "int8" | "bigserial" => sql_type::BIGINT,
        "real" | "float4" => sql_type::REAL,
        "float" => {
            if db == DatabaseType::MySQL {
                sql_type::REAL
            } else {
                sql_type::FLOAT
            }
        }
        "double" | "double precision" | "float8" => sql_type::DOUBLE,
        "numeric" if db == DatabaseType::SQLite => sql_type::DOUBLE,
        "numeric" => sql_type::NUMERIC,
        "decimal" => sql_type::DECIMAL,
        "char" | "character" | "bpchar" => sql_type::CHAR,
        "varchar" | "character varying" | "text" | "name" | "string" | "tinytext" => {
            sql_type::VARCHAR
        }
        "mediumtext" | "longtext" | "clob" | "long varchar" => sql_type::LONGVARCHAR,
        "timestamp" | "timestamptz" | "datetime" => sql_type::TIMESTAMP,
        "date" => sql_type::DATE,
        "time" | "timetz" => sql_type::TIME,
        "binary" => sql_type::BINARY,
        "blob" | "bytea" | "varbinary" | "tinyblob" => sql_type::VARBINARY,
        "mediumblob" | "longblob" | "long varchar for bit data" => sql_type::LONGVARBINARY,
        _ => sql_type::OTHER,
    }
}
