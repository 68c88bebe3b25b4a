//! Table-level statements built from a `TableDefinition`.

use super::Dialect;
use crate::db::types::TypeTag;
use crate::error::{DbError, DbResult};
use crate::models::TableDefinition;

/// An insert over every non-generated column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub sql: String,
    /// Columns bound by the statement, in placeholder order.
    pub columns: Vec<String>,
    /// Tags for the bound columns.
    pub tags: Vec<TypeTag>,
    /// Columns whose values the engine generates.
    pub generated_columns: Vec<String>,
}

/// A select of one row by primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStatement {
    pub sql: String,
    /// Selected columns, in result order.
    pub columns: Vec<String>,
    /// Tag for the single key argument.
    pub key_tag: TypeTag,
}

/// Statements that create `table`, in execution order.
pub fn build_create_table(dialect: &dyn Dialect, table: &TableDefinition) -> DbResult<Vec<String>> {
    table.validate()?;

    let mut statements = Vec::new();
    let mut clauses = Vec::with_capacity(table.columns.len());
    let mut constraints = Vec::new();
    for column in &table.columns {
        let rendered = dialect.render_column_definition(&table.name, column)?;
        statements.extend(rendered.statements_before);
        clauses.push(rendered.ddl);
        constraints.extend(rendered.constraints);
    }
    clauses.extend(constraints);

    let mut create = format!(
        "CREATE TABLE {} ({})",
        dialect.quote_identifier(&table.name),
        clauses.join(", ")
    );
    if let Some(suffix) = dialect.create_table_suffix() {
        create.push(' ');
        create.push_str(suffix);
    }
    statements.push(create);
    Ok(statements)
}

/// Statements that drop `table` and anything created alongside it.
pub fn build_drop_table(dialect: &dyn Dialect, table: &TableDefinition, if_exists: bool) -> Vec<String> {
    let quoted = dialect.quote_identifier(&table.name);
    let mut statements = if if_exists && dialect.is_drop_if_exists_supported() {
        vec![format!("DROP TABLE IF EXISTS {}", quoted)]
    } else {
        vec![format!("DROP TABLE {}", quoted)]
    };
    for column in &table.columns {
        statements.extend(dialect.drop_statements_after(&table.name, column));
    }
    statements
}

pub fn build_insert(dialect: &dyn Dialect, table: &TableDefinition) -> DbResult<InsertStatement> {
    table.validate()?;

    let quoted_table = dialect.quote_identifier(&table.name);
    let (generated, bound): (Vec<_>, Vec<_>) =
        table.columns.iter().partition(|c| c.is_generated_id());

    let sql = if bound.is_empty() {
        dialect.empty_insert_sql(&quoted_table)
    } else {
        let names = bound
            .iter()
            .map(|c| dialect.quote_identifier(c.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=bound.len())
            .map(|n| dialect.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted_table, names, placeholders
        )
    };

    Ok(InsertStatement {
        sql,
        columns: bound.iter().map(|c| c.name().to_string()).collect(),
        tags: bound.iter().map(|c| c.type_tag(dialect)).collect(),
        generated_columns: generated.iter().map(|c| c.name().to_string()).collect(),
    })
}

pub fn build_select_by_id(dialect: &dyn Dialect, table: &TableDefinition) -> DbResult<SelectStatement> {
    table.validate()?;

    let key = table.primary_key().ok_or_else(|| {
        DbError::invalid_input(format!("Table '{}' has no primary key", table.name))
    })?;
    let columns = table
        .columns
        .iter()
        .map(|c| dialect.quote_identifier(c.name()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        columns,
        dialect.quote_identifier(&table.name),
        dialect.quote_identifier(key.name()),
        dialect.placeholder(1)
    );

    Ok(SelectStatement {
        sql,
        columns: table.columns.iter().map(|c| c.name().to_string()).collect(),
        key_tag: key.type_tag(dialect),
    })
}
