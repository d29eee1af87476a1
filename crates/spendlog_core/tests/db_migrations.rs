use rusqlite::Connection;
use spendlog_core::db::migrations::{current_version, latest_version};
use spendlog_core::db::{open_db, open_db_in_memory, DbError};
use spendlog_core::{Category, Expense, RepoError, SqliteRepository};

#[test]
fn fresh_memory_database_is_fully_migrated() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(current_version(&conn).unwrap(), latest_version());
    assert_eq!(table_names(&conn), vec!["categories", "expenses"]);

    let enforced: bool = conn
        .pragma_query_value(None, "foreign_keys", |row| row.get(0))
        .unwrap();
    assert!(enforced);
}

#[test]
fn second_open_of_same_file_keeps_schema() {
    let workdir = tempfile::tempdir().unwrap();
    let db_file = workdir.path().join("spendlog.db");

    drop(open_db(&db_file).unwrap());
    let reopened = open_db(&db_file).unwrap();

    assert_eq!(current_version(&reopened).unwrap(), latest_version());
    assert_eq!(table_names(&reopened), vec!["categories", "expenses"]);
}

#[test]
fn file_from_newer_build_is_refused() {
    let workdir = tempfile::tempdir().unwrap();
    let db_file = workdir.path().join("newer.db");
    Connection::open(&db_file)
        .and_then(|conn| conn.pragma_update(None, "user_version", 42_u32))
        .unwrap();

    let err = open_db(&db_file).unwrap_err();
    let DbError::UnsupportedSchemaVersion {
        db_version,
        latest_supported,
    } = &err
    else {
        panic!("expected a version refusal, got {err}");
    };
    assert_eq!((*db_version, *latest_supported), (42, latest_version()));
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteRepository::<Category>::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be rejected"),
    }
}

#[test]
fn repository_reports_missing_table_and_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "PRAGMA user_version = {};
         CREATE TABLE categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
         );",
        latest_version()
    ))
    .unwrap();

    match SqliteRepository::<Category>::try_new(&conn) {
        Err(RepoError::MissingRequiredColumn { table, column }) => {
            assert_eq!(table, "categories");
            assert_eq!(column, "is_deleted");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("incomplete table must be rejected"),
    }

    match SqliteRepository::<Expense>::try_new(&conn) {
        Err(RepoError::MissingRequiredTable(table)) => assert_eq!(table, "expenses"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("missing table must be rejected"),
    }
}

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}
