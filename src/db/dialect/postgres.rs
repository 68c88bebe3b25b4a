use super::{Dialect, KeyRetrieval, RenderedColumn, base_type_name};
use crate::db::types::ColumnType;
use crate::error::DbResult;
use crate::models::{DatabaseType, LogicalColumn};

/// PostgreSQL. Generated ids draw from an explicit sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Sequence backing a generated id column.
    pub fn sequence_name(table_name: &str, column: &LogicalColumn) -> String {
        match column.sequence() {
            Some(name) => name.to_string(),
            None => format!("{}_{}_seq", table_name, column.name()),
        }
    }
}

impl Dialect for PostgresDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn driver_name(&self) -> &'static str {
        "sqlx-postgres"
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${}", position)
    }

    fn type_name(&self, column: &LogicalColumn) -> String {
        match column.column_type() {
            ColumnType::Byte => "SMALLINT".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Serializable => "BYTEA".to_string(),
            _ => base_type_name(column),
        }
    }

    fn configure_generated_id(
        &self,
        table_name: &str,
        column: &LogicalColumn,
        rendered: &mut RenderedColumn,
    ) -> DbResult<()> {
        let sequence = self.quote_identifier(&Self::sequence_name(table_name, column));
        rendered
            .statements_before
            .push(format!("CREATE SEQUENCE {}", sequence));
        rendered
            .ddl
            .push_str(&format!(" DEFAULT NEXTVAL('{}')", sequence.replace('\'', "''")));
        Ok(())
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::Returning
    }

    fn drop_statements_after(&self, table_name: &str, column: &LogicalColumn) -> Vec<String> {
        if !column.is_generated_id() {
            return Vec::new();
        }
        let sequence = self.quote_identifier(&Self::sequence_name(table_name, column));
        vec![format!("DROP SEQUENCE IF EXISTS {}", sequence)]
    }
}
