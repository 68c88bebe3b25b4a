use super::{Dialect, KeyRetrieval, RenderedColumn, base_type_name};
use crate::db::types::ColumnType;
use crate::error::DbResult;
use crate::models::{DatabaseType, LogicalColumn};

/// Embedded Apache Derby.
///
/// There is no sqlx driver for Derby, so this dialect only renders
/// statements. It has no boolean or TINYINT type and no LIMIT clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerbyDialect;

impl Dialect for DerbyDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Derby
    }

    fn driver_name(&self) -> &'static str {
        "org.apache.derby.jdbc.EmbeddedDriver"
    }

    fn is_limit_supported(&self) -> bool {
        false
    }

    fn is_drop_if_exists_supported(&self) -> bool {
        false
    }

    fn has_native_boolean(&self) -> bool {
        false
    }

    fn type_name(&self, column: &LogicalColumn) -> String {
        match column.column_type() {
            ColumnType::LongString => "LONG VARCHAR".to_string(),
            ColumnType::Boolean | ColumnType::Byte => "SMALLINT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Serializable => "LONG VARCHAR FOR BIT DATA".to_string(),
            _ => base_type_name(column),
        }
    }

    fn configure_generated_id(
        &self,
        _table_name: &str,
        _column: &LogicalColumn,
        rendered: &mut RenderedColumn,
    ) -> DbResult<()> {
        rendered.ddl.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        Ok(())
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::FollowUpQuery("VALUES IDENTITY_VAL_LOCAL()")
    }

    fn empty_insert_sql(&self, quoted_table: &str) -> String {
        format!("INSERT INTO {} VALUES (DEFAULT)", quoted_table)
    }
}
