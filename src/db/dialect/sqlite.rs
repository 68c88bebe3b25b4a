use super::{Dialect, KeyRetrieval, RenderedColumn, base_type_name};
use crate::db::types::ColumnType;
use crate::error::DbResult;
use crate::models::{DatabaseType, LogicalColumn};

/// SQLite 3.35+.
///
/// Generated ids are declared `INTEGER PRIMARY KEY AUTOINCREMENT`, so a
/// deleted key is never handed out again.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn driver_name(&self) -> &'static str {
        "sqlx-sqlite"
    }

    fn has_native_boolean(&self) -> bool {
        false
    }

    fn type_name(&self, column: &LogicalColumn) -> String {
        if column.is_generated_id() {
            return "INTEGER".to_string();
        }
        match column.column_type() {
            ColumnType::Boolean => "SMALLINT".to_string(),
            _ => base_type_name(column),
        }
    }

    fn configure_generated_id(
        &self,
        _table_name: &str,
        _column: &LogicalColumn,
        rendered: &mut RenderedColumn,
    ) -> DbResult<()> {
        // AUTOINCREMENT is only accepted on an inline INTEGER PRIMARY KEY
        rendered.ddl.push_str(" PRIMARY KEY AUTOINCREMENT");
        Ok(())
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::Returning
    }

    fn inline_generated_key(&self) -> bool {
        true
    }
}
