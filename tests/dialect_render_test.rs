//! Rendering tests run across every dialect.
//!
//! Each engine has its own identity syntax for generated ids, but all of them
//! must yield exactly one primary key constraint and the right number of
//! statements ahead of `CREATE TABLE`.

use db_access::db::ColumnType;
use db_access::db::dialect::{
    build_create_table, build_drop_table, build_insert, build_select_by_id, dialect_for,
};
use db_access::models::{DatabaseType, LogicalColumn, TableDefinition};
use db_access::DbError;

const INTEGER_TYPES: [ColumnType; 4] = [
    ColumnType::Byte,
    ColumnType::Short,
    ColumnType::Integer,
    ColumnType::Long,
];

fn identity_marker(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::SQLite => "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT",
        DatabaseType::PostgreSQL => "DEFAULT NEXTVAL('\"item_id_seq\"')",
        DatabaseType::MySQL => "AUTO_INCREMENT",
        DatabaseType::Derby => "GENERATED BY DEFAULT AS IDENTITY",
    }
}

fn item_table(id_type: ColumnType) -> TableDefinition {
    TableDefinition::new(
        "item",
        vec![
            LogicalColumn::new("id", id_type).generated_id(),
            LogicalColumn::new("label", ColumnType::String).not_null(),
            LogicalColumn::new("enabled", ColumnType::Boolean).default_value("1"),
        ],
    )
}

#[test]
fn test_generated_id_for_every_dialect_and_integer_type() {
    for db_type in DatabaseType::ALL {
        let dialect = dialect_for(db_type);
        for id_type in INTEGER_TYPES {
            let statements = build_create_table(dialect, &item_table(id_type)).unwrap();
            let (create, before) = statements.split_last().unwrap();

            let expected_before = usize::from(db_type == DatabaseType::PostgreSQL);
            assert_eq!(before.len(), expected_before, "{db_type} {id_type}");
            assert!(
                create.contains(identity_marker(db_type)),
                "{db_type} {id_type}: {create}"
            );
            assert_eq!(
                create.matches("PRIMARY KEY").count(),
                1,
                "{db_type} {id_type}: {create}"
            );
            // nullability and defaults never decorate the generated column
            let id_clause = create.split(", ").next().unwrap();
            assert!(!id_clause.contains("NOT NULL"), "{db_type}: {id_clause}");
        }
    }
}

#[test]
fn test_non_integer_generated_id_is_rejected_everywhere() {
    let table = TableDefinition::new(
        "item",
        vec![LogicalColumn::new("id", ColumnType::String).generated_id()],
    );
    for db_type in DatabaseType::ALL {
        let err = build_create_table(dialect_for(db_type), &table).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }), "{db_type}");
    }
}

#[test]
fn test_several_primary_keys_are_rejected_everywhere() {
    let table = TableDefinition::new(
        "pair",
        vec![
            LogicalColumn::new("a", ColumnType::Integer).primary_key(),
            LogicalColumn::new("b", ColumnType::Integer).primary_key(),
        ],
    );
    for db_type in DatabaseType::ALL {
        let err = build_create_table(dialect_for(db_type), &table).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }), "{db_type}");
    }
}

#[test]
fn test_boolean_storage_per_dialect() {
    let column = LogicalColumn::new("enabled", ColumnType::Boolean);
    for db_type in DatabaseType::ALL {
        let dialect = dialect_for(db_type);
        let type_name = dialect.type_name(&column);
        if dialect.has_native_boolean() {
            assert_eq!(type_name, "BOOLEAN", "{db_type}");
        } else {
            assert_eq!(type_name, "SMALLINT", "{db_type}");
        }
    }
    assert!(!dialect_for(DatabaseType::Derby).has_native_boolean());
    assert!(!dialect_for(DatabaseType::SQLite).has_native_boolean());
}

#[test]
fn test_capabilities() {
    for db_type in DatabaseType::ALL {
        let dialect = dialect_for(db_type);
        assert_eq!(dialect.database_type(), db_type);
        assert_eq!(dialect.is_limit_supported(), db_type != DatabaseType::Derby);
        assert_eq!(
            dialect.is_drop_if_exists_supported(),
            db_type != DatabaseType::Derby
        );
        assert!(!dialect.driver_name().is_empty());
    }
}

#[test]
fn test_insert_and_select_placeholders() {
    let table = item_table(ColumnType::Long);
    for db_type in DatabaseType::ALL {
        let dialect = dialect_for(db_type);
        let insert = build_insert(dialect, &table).unwrap();
        let select = build_select_by_id(dialect, &table).unwrap();
        assert_eq!(insert.columns, vec!["label", "enabled"]);
        if db_type == DatabaseType::PostgreSQL {
            assert!(insert.sql.ends_with("VALUES ($1, $2)"));
            assert!(select.sql.ends_with("= $1"));
        } else {
            assert!(insert.sql.ends_with("VALUES (?, ?)"));
            assert!(select.sql.ends_with("= ?"));
        }
    }
}

#[test]
fn test_drop_follows_create() {
    let table = item_table(ColumnType::Long);
    let pg = build_drop_table(dialect_for(DatabaseType::PostgreSQL), &table, true);
    assert_eq!(pg.len(), 2);
    assert!(pg[1].contains("\"item_id_seq\""));

    let mysql = build_drop_table(dialect_for(DatabaseType::MySQL), &table, false);
    assert_eq!(mysql, vec!["DROP TABLE `item`".to_string()]);
}
