//! Integration tests for statement execution against file-backed SQLite.
//!
//! Tests verify that:
//! - Tables rendered by the SQLite dialect can be created and used
//! - Generated keys come back through RETURNING and through a follow-up query
//! - Failed key retrieval rolls the insert back and leaves the holder empty
//! - Single-row queries distinguish zero, one and several rows

use chrono::NaiveDate;
use db_access::DbError;
use db_access::config::PoolOptions;
use db_access::db::dialect::{
    Dialect, KeyRetrieval, RenderedColumn, SqliteDialect, build_create_table, build_insert,
    build_select_by_id,
};
use db_access::db::{
    ColumnType, DatabaseAccess, DbPool, GeneratedKeyHolder, QueryOne, RowCursor, SqlArg, TypeTag,
};
use db_access::error::DbResult;
use db_access::models::{ConnectionConfig, DatabaseType, LogicalColumn, TableDefinition};
use tempfile::TempDir;

/// SQLite driven the way engines without RETURNING are: the key is read
/// back with a second query on the same connection.
#[derive(Debug)]
struct RowidDialect;

impl Dialect for RowidDialect {
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
        SqliteDialect.type_name(column)
    }

    fn configure_generated_id(
        &self,
        _table_name: &str,
        _column: &LogicalColumn,
        _rendered: &mut RenderedColumn,
    ) -> DbResult<()> {
        Ok(())
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::FollowUpQuery("SELECT last_insert_rowid()")
    }
}

static ROWID: RowidDialect = RowidDialect;

/// Open a pool on a fresh database file. Keep the directory alive for the
/// duration of the test.
async fn setup_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.db");
    let config = ConnectionConfig::new(
        "test-sqlite",
        format!("sqlite:{}", path.display()),
        PoolOptions::default(),
    )
    .unwrap();
    let pool = DbPool::connect(&config).await.unwrap();
    (dir, pool)
}

fn account_table() -> TableDefinition {
    TableDefinition::new(
        "account",
        vec![
            LogicalColumn::new("id", ColumnType::Long).generated_id(),
            LogicalColumn::new("email", ColumnType::String)
                .width(100)
                .not_null(),
            LogicalColumn::new("active", ColumnType::Boolean),
            LogicalColumn::new("visits", ColumnType::Integer).default_value("0"),
            LogicalColumn::new("last_seen", ColumnType::DateLong),
            LogicalColumn::new("created", ColumnType::Date),
        ],
    )
}

async fn create_table(access: &DatabaseAccess, table: &TableDefinition) {
    for statement in build_create_table(access.dialect(), table).unwrap() {
        access.execute(&statement, &[], &[]).await.unwrap();
    }
}

#[derive(Debug, PartialEq)]
struct Account {
    id: i64,
    email: String,
    active: bool,
    visits: i32,
    last_seen: Option<chrono::NaiveDateTime>,
    created: Option<chrono::NaiveDateTime>,
}

async fn insert_account(
    access: &DatabaseAccess,
    email: &str,
    active: bool,
    last_seen: chrono::NaiveDateTime,
) -> DbResult<i64> {
    let insert = build_insert(access.dialect(), &account_table())?;
    let created = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .unwrap();
    let args = vec![
        SqlArg::from(email),
        SqlArg::from(active),
        SqlArg::Int(7),
        SqlArg::from(last_seen),
        SqlArg::from(created),
    ];
    let mut holder = GeneratedKeyHolder::for_column("id");
    let rows = access
        .insert_returning_keys(&insert.sql, &args, &insert.tags, &mut holder)
        .await?;
    assert_eq!(rows, 1);
    assert_eq!(holder.len(), 1);
    Ok(holder.key("ID").unwrap())
}

async fn load_account(access: &DatabaseAccess, id: i64) -> QueryOne<Account> {
    let select = build_select_by_id(access.dialect(), &account_table()).unwrap();
    access
        .query_for_one(&select.sql, &[SqlArg::Int(id)], &[select.key_tag], |cursor| {
            Ok(Account {
                id: cursor.get_long(0)?,
                email: cursor.get_string(1)?.unwrap_or_default(),
                active: cursor.get_bool(2)?,
                visits: cursor.get_int(3)?,
                last_seen: cursor.get_timestamp(4)?,
                created: cursor.get_timestamp(5)?,
            })
        })
        .await
        .unwrap()
}

fn email(cursor: &RowCursor<'_>) -> DbResult<Option<String>> {
    cursor.get_string(0)
}

fn last_seen() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 17)
        .and_then(|d| d.and_hms_milli_opt(12, 0, 1, 250))
        .unwrap()
}

// =========================================================================
// Generated keys
// =========================================================================

#[tokio::test]
async fn test_insert_returning_keys_and_read_back() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;

    let first = insert_account(&access, "ada@example.com", true, last_seen())
        .await
        .unwrap();
    let second = insert_account(&access, "bob@example.com", false, last_seen())
        .await
        .unwrap();
    assert!(first > 0);
    assert_eq!(second, first + 1);

    let QueryOne::Exactly(account) = load_account(&access, first).await else {
        panic!("expected exactly one account");
    };
    assert_eq!(account.id, first);
    assert_eq!(account.email, "ada@example.com");
    assert!(account.active);
    assert_eq!(account.visits, 7);
    assert_eq!(account.last_seen, Some(last_seen()));
    assert_eq!(
        account.created,
        NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(9, 30, 0))
    );

    let QueryOne::Exactly(account) = load_account(&access, second).await else {
        panic!("expected exactly one account");
    };
    assert!(!account.active);
}

#[tokio::test]
async fn test_follow_up_query_key_retrieval() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::new(pool, &ROWID).unwrap();
    create_table(&access, &account_table()).await;

    let insert = build_insert(access.dialect(), &account_table()).unwrap();
    // no RETURNING clause for follow-up engines
    assert_eq!(
        access.dialect().generated_keys_sql(&insert.sql, &["id".to_string()]),
        insert.sql
    );

    let first = insert_account(&access, "ada@example.com", true, last_seen())
        .await
        .unwrap();
    let second = insert_account(&access, "bob@example.com", true, last_seen())
        .await
        .unwrap();
    assert!(first > 0);
    assert_eq!(second, first + 1);
    assert!(matches!(load_account(&access, second).await, QueryOne::Exactly(_)));
}

#[tokio::test]
async fn test_deleted_key_is_not_reused() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;

    let first = insert_account(&access, "ada@example.com", true, last_seen())
        .await
        .unwrap();
    let deleted = access
        .delete(
            "DELETE FROM account WHERE id = ?",
            &[SqlArg::Int(first)],
            &[TypeTag::of(ColumnType::Long)],
        )
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let second = insert_account(&access, "bob@example.com", true, last_seen())
        .await
        .unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn test_returning_without_rows_rolls_back() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;

    let mut holder = GeneratedKeyHolder::for_column("id");
    let err = access
        .insert_returning_keys(
            "INSERT INTO account (email) SELECT ? WHERE 0",
            &[SqlArg::from("nobody@example.com")],
            &[TypeTag::of(ColumnType::String)],
            &mut holder,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::NoGeneratedKeys { .. }));
    assert!(holder.is_empty());
    assert_eq!(
        access.query_for_long("SELECT COUNT(*) FROM account").await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_follow_up_without_generated_key_rolls_back() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::new(pool, &ROWID).unwrap();
    access
        .execute("CREATE TABLE tag (name TEXT PRIMARY KEY) WITHOUT ROWID", &[], &[])
        .await
        .unwrap();

    let mut holder = GeneratedKeyHolder::for_column("name");
    let err = access
        .insert_returning_keys(
            "INSERT INTO tag (name) VALUES (?)",
            &[SqlArg::from("rust")],
            &[TypeTag::of(ColumnType::String)],
            &mut holder,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::NoGeneratedKeys { .. }));
    assert!(holder.is_empty());
    assert_eq!(access.query_for_long("SELECT COUNT(*) FROM tag").await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_integer_key_is_rejected() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    access
        .execute("CREATE TABLE tag (name TEXT PRIMARY KEY)", &[], &[])
        .await
        .unwrap();

    let mut holder = GeneratedKeyHolder::for_column("name");
    let err = access
        .insert_returning_keys(
            "INSERT INTO tag (name) VALUES (?)",
            &[SqlArg::from("rust")],
            &[TypeTag::of(ColumnType::String)],
            &mut holder,
        )
        .await
        .unwrap_err();

    match err {
        DbError::InvalidKeyType { column, .. } => assert_eq!(column, "name"),
        other => panic!("expected InvalidKeyType, got {other:?}"),
    }
    assert!(holder.is_empty());
    assert_eq!(access.query_for_long("SELECT COUNT(*) FROM tag").await.unwrap(), 0);
}

#[tokio::test]
async fn test_follow_up_rejects_several_key_columns() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::new(pool, &ROWID).unwrap();
    let mut holder = GeneratedKeyHolder::new(["id", "other"]);
    let err = access
        .insert_returning_keys("INSERT INTO t DEFAULT VALUES", &[], &[], &mut holder)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

// =========================================================================
// Queries
// =========================================================================

#[tokio::test]
async fn test_query_for_one_cardinality() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;

    let sql = "SELECT email FROM account WHERE active = ?";
    let tags = [access.dialect().type_tag(ColumnType::Boolean)];

    let none = access
        .query_for_one(sql, &[SqlArg::Bool(true)], &tags, email)
        .await
        .unwrap();
    assert_eq!(none, QueryOne::None);

    insert_account(&access, "ada@example.com", true, last_seen())
        .await
        .unwrap();
    let one = access
        .query_for_one(sql, &[SqlArg::Bool(true)], &tags, email)
        .await
        .unwrap();
    assert_eq!(one, QueryOne::Exactly(Some("ada@example.com".to_string())));

    insert_account(&access, "bob@example.com", true, last_seen())
        .await
        .unwrap();
    let mut mapped = 0;
    let many = access
        .query_for_one(sql, &[SqlArg::Bool(true)], &tags, |cursor| {
            mapped += 1;
            cursor.get_string(0)
        })
        .await
        .unwrap();
    assert_eq!(many, QueryOne::MoreThanOne);
    assert_eq!(mapped, 1);
}

#[tokio::test]
async fn test_query_for_long_errors() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;

    let err = access.query_for_long("SELECT id FROM account").await.unwrap_err();
    assert!(matches!(err, DbError::NoResult { .. }));

    insert_account(&access, "ada@example.com", true, last_seen())
        .await
        .unwrap();
    insert_account(&access, "bob@example.com", true, last_seen())
        .await
        .unwrap();
    let err = access.query_for_long("SELECT id FROM account").await.unwrap_err();
    assert!(matches!(err, DbError::AmbiguousResult { .. }));

    assert_eq!(
        access.query_for_long("SELECT COUNT(*) FROM account").await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_update_delete_and_query_all() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;

    for email in ["a@example.com", "b@example.com", "c@example.com"] {
        insert_account(&access, email, true, last_seen()).await.unwrap();
    }

    let tags = [
        access.dialect().type_tag(ColumnType::Boolean),
        TypeTag::of(ColumnType::String),
    ];
    let updated = access
        .update(
            "UPDATE account SET active = ? WHERE email <> ?",
            &[SqlArg::Bool(false), SqlArg::from("a@example.com")],
            &tags,
        )
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let inactive = access
        .query_for_all(
            "SELECT email FROM account WHERE active = ? ORDER BY email",
            &[SqlArg::Bool(false)],
            &tags[..1],
            |cursor| cursor.get_string(0),
        )
        .await
        .unwrap();
    assert_eq!(
        inactive,
        vec![
            Some("b@example.com".to_string()),
            Some("c@example.com".to_string())
        ]
    );

    let deleted = access
        .delete(
            "DELETE FROM account WHERE active = ?",
            &[SqlArg::Bool(false)],
            &tags[..1],
        )
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(
        access.query_for_long("SELECT COUNT(*) FROM account").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_null_arguments_and_values() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;

    let insert = build_insert(access.dialect(), &account_table()).unwrap();
    let args = vec![
        SqlArg::from("ghost@example.com"),
        SqlArg::Null,
        SqlArg::Int(0),
        SqlArg::from(None::<i64>),
        SqlArg::Null,
    ];
    access.insert(&insert.sql, &args, &insert.tags).await.unwrap();

    let row = access
        .query_for_one(
            "SELECT active, last_seen FROM account",
            &[],
            &[],
            |cursor| Ok((cursor.is_null(0)?, cursor.get_timestamp(1)?)),
        )
        .await
        .unwrap();
    assert_eq!(row, QueryOne::Exactly((true, None)));
}

#[tokio::test]
async fn test_scalar_getters_reject_null() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;
    access
        .execute(
            "INSERT INTO account (email) VALUES (?)",
            &[SqlArg::from("ghost@example.com")],
            &[TypeTag::of(ColumnType::String)],
        )
        .await
        .unwrap();

    let err = access
        .query_for_one("SELECT active FROM account", &[], &[], |cursor| {
            cursor.get_bool(0)
        })
        .await
        .unwrap_err();
    match err {
        DbError::TypeMismatch { actual, .. } => assert_eq!(actual, "NULL"),
        other => panic!("expected TypeMismatch, got {other:?}"),
    }

    let optional = access
        .query_for_one("SELECT active FROM account", &[], &[], |cursor| {
            if cursor.is_null(0)? {
                Ok(None)
            } else {
                cursor.get_bool(0).map(Some)
            }
        })
        .await
        .unwrap();
    assert_eq!(optional, QueryOne::Exactly(None));
}

#[tokio::test]
async fn test_bind_mismatch_is_reported_before_execution() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);
    create_table(&access, &account_table()).await;

    let err = access
        .execute(
            "UPDATE account SET visits = ?",
            &[SqlArg::from("many")],
            &[TypeTag::of(ColumnType::Integer)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Bind { .. }));
}

#[tokio::test]
async fn test_type_mismatch_on_read() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);

    let err = access
        .query_for_one("SELECT 'text'", &[], &[], |cursor| cursor.get_long(0))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_execution_error_keeps_statement() {
    let (_dir, pool) = setup_pool().await;
    let access = DatabaseAccess::for_pool(pool);

    let err = access
        .execute("INSERT INTO nowhere VALUES (1)", &[], &[])
        .await
        .unwrap_err();
    match err {
        DbError::Execution { statement, .. } => assert_eq!(statement, "INSERT INTO nowhere VALUES (1)"),
        other => panic!("expected Execution, got {other:?}"),
    }
}
