use super::{Dialect, KeyRetrieval, RenderedColumn, base_type_name};
use crate::db::types::ColumnType;
use crate::error::DbResult;
use crate::models::{DatabaseType, LogicalColumn};

/// MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn driver_name(&self) -> &'static str {
        "sqlx-mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn type_name(&self, column: &LogicalColumn) -> String {
        match column.column_type() {
            ColumnType::LongString => "LONGTEXT".to_string(),
            ColumnType::Date => "DATETIME".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            _ => base_type_name(column),
        }
    }

    fn configure_generated_id(
        &self,
        _table_name: &str,
        _column: &LogicalColumn,
        rendered: &mut RenderedColumn,
    ) -> DbResult<()> {
        rendered.ddl.push_str(" AUTO_INCREMENT");
        Ok(())
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::FollowUpQuery("SELECT LAST_INSERT_ID()")
    }

    fn create_table_suffix(&self) -> Option<&'static str> {
        Some("ENGINE=InnoDB")
    }

    fn empty_insert_sql(&self, quoted_table: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", quoted_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_uses_auto_increment() {
        let column = LogicalColumn::new("id", ColumnType::Integer).generated_id();
        let rendered = MySqlDialect.render_column_definition("t", &column).unwrap();
        assert_eq!(rendered.ddl, "`id` INTEGER AUTO_INCREMENT");
        assert_eq!(rendered.constraints, vec!["PRIMARY KEY (`id`)".to_string()]);
    }

    #[test]
    fn test_native_boolean() {
        let column = LogicalColumn::new("active", ColumnType::Boolean);
        assert_eq!(MySqlDialect.type_name(&column), "BOOLEAN");
    }
}
