//! SQL dialects.
//!
//! Each supported engine has one immutable dialect value. A dialect knows how
//! to render a logical column into the engine's DDL, which SQL type code to
//! bind each column type with, how identifiers are quoted, and how generated
//! keys come back after an insert.
//!
//! Dialects are selected with [`dialect_for`] and shared as
//! `&'static dyn Dialect`; none of them hold state.

mod derby;
mod mysql;
mod postgres;
mod sqlite;
pub mod statements;

pub use derby::DerbyDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use statements::{
    InsertStatement, SelectStatement, build_create_table, build_drop_table, build_insert,
    build_select_by_id,
};

use crate::db::types::{ColumnType, TypeTag, sql_type};
use crate::error::DbResult;
use crate::models::{DatabaseType, LogicalColumn};

/// Width used for string columns that do not declare one.
pub const DEFAULT_VARCHAR_WIDTH: u32 = 255;

/// How an engine hands back the keys an insert generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRetrieval {
    /// The insert carries a `RETURNING` clause and yields the key rows itself.
    Returning,
    /// A separate query, run on the same connection right after the insert.
    FollowUpQuery(&'static str),
}

/// A column rendered for `CREATE TABLE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedColumn {
    /// Column clause: name, type, identity, default, nullability.
    pub ddl: String,
    /// Statements that must run before the `CREATE TABLE`.
    pub statements_before: Vec<String>,
    /// Table-level constraints such as `PRIMARY KEY (...)`.
    pub constraints: Vec<String>,
}

/// Per-engine SQL rules.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn database_type(&self) -> DatabaseType;

    /// Name of the driver that talks to this engine.
    fn driver_name(&self) -> &'static str;

    fn is_limit_supported(&self) -> bool {
        true
    }

    fn is_drop_if_exists_supported(&self) -> bool {
        true
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Quote an identifier. Already-quoted input is returned unchanged.
    fn quote_identifier(&self, name: &str) -> String {
        let q = self.identifier_quote();
        if is_quoted(name, q) {
            return name.to_string();
        }
        let escaped = name.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Inverse of `quote_identifier`; bare names pass through.
    fn unquote_identifier(&self, name: &str) -> String {
        let q = self.identifier_quote();
        if !is_quoted(name, q) {
            return name.to_string();
        }
        name[1..name.len() - 1].replace(&format!("{q}{q}"), &q.to_string())
    }

    /// Placeholder for the 1-based parameter `position`.
    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn has_native_boolean(&self) -> bool {
        true
    }

    /// Native type keyword for a column.
    fn type_name(&self, column: &LogicalColumn) -> String {
        base_type_name(column)
    }

    /// Bind tag for a column type.
    fn type_tag(&self, column_type: ColumnType) -> TypeTag {
        if column_type == ColumnType::Boolean && !self.has_native_boolean() {
            TypeTag::with_sql_type(column_type, sql_type::SMALLINT)
        } else {
            TypeTag::of(column_type)
        }
    }

    /// Append the identity clause of a generated id column.
    fn configure_generated_id(
        &self,
        table_name: &str,
        column: &LogicalColumn,
        rendered: &mut RenderedColumn,
    ) -> DbResult<()>;

    fn key_retrieval(&self) -> KeyRetrieval;

    /// Whether `configure_generated_id` declares the primary key inline,
    /// in which case no separate constraint is emitted for that column.
    fn inline_generated_key(&self) -> bool {
        false
    }

    /// Insert text to execute when keys for `key_columns` are wanted.
    fn generated_keys_sql(&self, sql: &str, key_columns: &[String]) -> String {
        match self.key_retrieval() {
            KeyRetrieval::Returning => {
                let columns = key_columns
                    .iter()
                    .map(|c| self.quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                let base = sql.trim_end().trim_end_matches(';').trim_end();
                format!("{} RETURNING {}", base, columns)
            }
            KeyRetrieval::FollowUpQuery(_) => sql.to_string(),
        }
    }

    /// Text after the closing parenthesis of `CREATE TABLE`.
    fn create_table_suffix(&self) -> Option<&'static str> {
        None
    }

    /// Statements to run after dropping a table that owned `column`.
    fn drop_statements_after(&self, _table_name: &str, _column: &LogicalColumn) -> Vec<String> {
        Vec::new()
    }

    /// Insert that supplies no values at all.
    fn empty_insert_sql(&self, quoted_table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", quoted_table)
    }

    /// Render one column definition.
    ///
    /// The primary key is returned in `constraints`, except for a generated
    /// id on a dialect with `inline_generated_key`.
    fn render_column_definition(
        &self,
        table_name: &str,
        column: &LogicalColumn,
    ) -> DbResult<RenderedColumn> {
        column.validate()?;

        let quoted = self.quote_identifier(column.name());
        let mut rendered = RenderedColumn {
            ddl: format!("{} {}", quoted, self.type_name(column)),
            ..RenderedColumn::default()
        };

        if column.is_generated_id() {
            self.configure_generated_id(table_name, column, &mut rendered)?;
        } else {
            if let Some(default) = column.default_literal() {
                rendered.ddl.push_str(" DEFAULT ");
                rendered.ddl.push_str(default);
            }
            if !column.is_nullable() {
                rendered.ddl.push_str(" NOT NULL");
            }
        }

        let inline_key = column.is_generated_id() && self.inline_generated_key();
        if column.is_primary_key() && !inline_key {
            rendered.constraints.push(format!("PRIMARY KEY ({})", quoted));
        }
        Ok(rendered)
    }
}

static SQLITE: SqliteDialect = SqliteDialect;
static POSTGRES: PostgresDialect = PostgresDialect;
static MYSQL: MySqlDialect = MySqlDialect;
static DERBY: DerbyDialect = DerbyDialect;

/// The dialect for an engine.
pub fn dialect_for(db_type: DatabaseType) -> &'static dyn Dialect {
    match db_type {
        DatabaseType::SQLite => &SQLITE,
        DatabaseType::PostgreSQL => &POSTGRES,
        DatabaseType::MySQL => &MYSQL,
        DatabaseType::Derby => &DERBY,
    }
}

/// Type keywords shared by most engines.
pub fn base_type_name(column: &LogicalColumn) -> String {
    let name = match column.column_type() {
        ColumnType::String | ColumnType::EnumString => {
            return format!(
                "VARCHAR({})",
                column.width_value().unwrap_or(DEFAULT_VARCHAR_WIDTH)
            );
        }
        ColumnType::LongString => "TEXT",
        ColumnType::Date => "TIMESTAMP",
        ColumnType::DateLong | ColumnType::Long => "BIGINT",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Byte => "TINYINT",
        ColumnType::Short => "SMALLINT",
        ColumnType::Integer | ColumnType::EnumInteger => "INTEGER",
        ColumnType::Float => "FLOAT",
        ColumnType::Double => "DOUBLE PRECISION",
        ColumnType::Serializable => "BLOB",
    };
    name.to_string()
}

fn is_quoted(name: &str, q: char) -> bool {
    let len = name.len();
    if len < 2 || !name.starts_with(q) || !name.ends_with(q) {
        return false;
    }
    let doubled = format!("{q}{q}");
    !name[1..len - 1].replace(&doubled, "").contains(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_for_each_engine() {
        for db in DatabaseType::ALL {
            assert_eq!(dialect_for(db).database_type(), db);
        }
    }

    #[test]
    fn test_quote_is_idempotent() {
        let dialect = dialect_for(DatabaseType::PostgreSQL);
        let once = dialect.quote_identifier("order");
        assert_eq!(once, "\"order\"");
        assert_eq!(dialect.quote_identifier(&once), once);
        assert_eq!(dialect.unquote_identifier(&once), "order");
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        let dialect = dialect_for(DatabaseType::MySQL);
        let quoted = dialect.quote_identifier("we`ird");
        assert_eq!(quoted, "`we``ird`");
        assert_eq!(dialect.quote_identifier(&quoted), quoted);
        assert_eq!(dialect.unquote_identifier(&quoted), "we`ird");
    }

    #[test]
    fn test_half_quoted_name_is_escaped() {
        let dialect = dialect_for(DatabaseType::SQLite);
        assert_eq!(dialect.quote_identifier("\"abc"), "\"\"\"abc\"");
    }

    #[test]
    fn test_returning_rewrite() {
        let dialect = dialect_for(DatabaseType::SQLite);
        let sql = dialect.generated_keys_sql("INSERT INTO t (a) VALUES (?);  ", &["id".to_string()]);
        assert_eq!(sql, "INSERT INTO t (a) VALUES (?) RETURNING \"id\"");

        let mysql = dialect_for(DatabaseType::MySQL);
        let sql = mysql.generated_keys_sql("INSERT INTO t (a) VALUES (?)", &["id".to_string()]);
        assert_eq!(sql, "INSERT INTO t (a) VALUES (?)");
    }

    #[test]
    fn test_boolean_tag_without_native_boolean() {
        for db in DatabaseType::ALL {
            let dialect = dialect_for(db);
            let tag = dialect.type_tag(ColumnType::Boolean);
            if dialect.has_native_boolean() {
                assert_eq!(tag.sql_type(), sql_type::BOOLEAN);
            } else {
                assert_eq!(tag.sql_type(), sql_type::SMALLINT);
            }
        }
    }

    #[test]
    fn test_nullable_default_column() {
        let dialect = dialect_for(DatabaseType::SQLite);
        let column = LogicalColumn::new("status", ColumnType::Integer)
            .default_value("0")
            .not_null();
        let rendered = dialect.render_column_definition("t", &column).unwrap();
        assert_eq!(rendered.ddl, "\"status\" INTEGER DEFAULT 0 NOT NULL");
        assert!(rendered.constraints.is_empty());
        assert!(rendered.statements_before.is_empty());
    }

    #[test]
    fn test_invalid_generated_id_is_rejected() {
        let dialect = dialect_for(DatabaseType::PostgreSQL);
        let column = LogicalColumn::new("id", ColumnType::Double).generated_id();
        assert!(dialect.render_column_definition("t", &column).is_err());
    }
}
