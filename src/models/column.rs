//! Logical column and table metadata.
//!
//! A `LogicalColumn` describes one mapped field independently of any engine;
//! dialects turn it into DDL. Table definitions can be loaded from JSON:
//!
//! ```json
//! {
//!   "name": "account",
//!   "columns": [
//!     { "name": "id", "type": "long", "generated_id": true },
//!     { "name": "email", "type": "string", "width": 100, "nullable": false },
//!     { "name": "active", "type": "boolean", "default_value": "1" }
//!   ]
//! }
//! ```

use crate::db::dialect::Dialect;
use crate::db::types::{ColumnType, TypeTag};
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};

fn default_nullable() -> bool {
    true
}

/// One mapped field. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColumnDef")]
pub struct LogicalColumn {
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    nullable: bool,
    primary_key: bool,
    generated_id: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_name: Option<String>,
}

/// Column as written in a table definition file.
#[derive(Debug, Deserialize)]
struct ColumnDef {
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    generated_id: bool,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    default_value: Option<String>,
    #[serde(default)]
    sequence_name: Option<String>,
}

impl From<ColumnDef> for LogicalColumn {
    /// Apply the same implications as the builder methods.
    fn from(def: ColumnDef) -> Self {
        let mut column = LogicalColumn::new(def.name, def.column_type);
        column.width = def.width;
        column.default_value = def.default_value;
        column.sequence_name = def.sequence_name;
        if !def.nullable {
            column = column.not_null();
        }
        if def.primary_key {
            column = column.primary_key();
        }
        if def.generated_id {
            column = column.generated_id();
        }
        column
    }
}

impl LogicalColumn {
    /// A nullable, non-key column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            generated_id: false,
            width: None,
            default_value: None,
            sequence_name: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Engine-assigned identity. Implies primary key and NOT NULL.
    pub fn generated_id(mut self) -> Self {
        self.generated_id = true;
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Literal SQL default, rendered verbatim.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sequence backing a generated id on engines that use one.
    pub fn sequence_name(mut self, name: impl Into<String>) -> Self {
        self.sequence_name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_generated_id(&self) -> bool {
        self.generated_id
    }

    pub fn width_value(&self) -> Option<u32> {
        self.width
    }

    pub fn default_literal(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn sequence(&self) -> Option<&str> {
        self.sequence_name.as_deref()
    }

    /// Check the column's own invariants.
    pub fn validate(&self) -> DbResult<()> {
        if self.name.trim().is_empty() {
            return Err(DbError::invalid_input("Column name cannot be empty"));
        }
        if self.generated_id {
            if !self.column_type.is_integer_family() {
                return Err(DbError::invalid_input(format!(
                    "Generated id column '{}' must have an integer type, not {}",
                    self.name, self.column_type
                )));
            }
            if !self.primary_key {
                return Err(DbError::invalid_input(format!(
                    "Generated id column '{}' must be the primary key",
                    self.name
                )));
            }
            if self.default_value.is_some() {
                return Err(DbError::invalid_input(format!(
                    "Generated id column '{}' cannot declare a default value",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Bind tag for values of this column on `dialect`.
    pub fn type_tag(&self, dialect: &dyn Dialect) -> TypeTag {
        dialect.type_tag(self.column_type)
    }
}

/// A table and its columns, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<LogicalColumn>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, columns: Vec<LogicalColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Parse a JSON table definition and validate it.
    pub fn from_json(json: &str) -> DbResult<Self> {
        let table: TableDefinition = serde_json::from_str(json)
            .map_err(|e| DbError::invalid_input(format!("Invalid table definition: {}", e)))?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.name.trim().is_empty() {
            return Err(DbError::invalid_input("Table name cannot be empty"));
        }
        if self.columns.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Table '{}' has no columns",
                self.name
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            column.validate()?;
            if self.columns[..i]
                .iter()
                .any(|c| c.name().eq_ignore_ascii_case(column.name()))
            {
                return Err(DbError::invalid_input(format!(
                    "Duplicate column '{}' in table '{}'",
                    column.name(),
                    self.name
                )));
            }
        }
        // a generated id is a primary key, so this also caps generated ids at one
        if self.columns.iter().filter(|c| c.is_primary_key()).count() > 1 {
            return Err(DbError::invalid_input(format!(
                "Table '{}' declares more than one primary key column",
                self.name
            )));
        }
        Ok(())
    }

    pub fn generated_columns(&self) -> impl Iterator<Item = &LogicalColumn> {
        self.columns.iter().filter(|c| c.is_generated_id())
    }

    pub fn primary_key(&self) -> Option<&LogicalColumn> {
        self.columns.iter().find(|c| c.is_primary_key())
    }
}
