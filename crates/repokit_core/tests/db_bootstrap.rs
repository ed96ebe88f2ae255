mod common;

use common::{open, Article, Label, MIGRATIONS};
use repokit_core::db::migrations::latest_version;
use repokit_core::db::{open_db, open_db_in_memory, DbError, Migration};
use repokit_core::{RepoError, Repository, SqliteBackend, SqliteRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open();

    assert_eq!(schema_version(&conn), latest_version(MIGRATIONS));
    for table in ["authors", "articles", "comments", "labels", "article_labels"] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn open_db_enables_foreign_keys() {
    let conn = open();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repokit.db");

    let conn_first = open_db(&path, MIGRATIONS).unwrap();
    {
        let repo = SqliteRepository::<Label>::try_new(SqliteBackend::new(&conn_first)).unwrap();
        repo.create(&common::label("persisted")).unwrap();
    }
    drop(conn_first);

    let conn_second = open_db(&path, MIGRATIONS).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version(MIGRATIONS));
    let repo = SqliteRepository::<Label>::try_new(SqliteBackend::new(&conn_second)).unwrap();
    assert_eq!(repo.count(None).unwrap(), 1);
}

#[test]
fn later_migrations_apply_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upgrade.db");
    drop(open_db(&path, MIGRATIONS).unwrap());

    let upgraded = [
        MIGRATIONS[0],
        Migration {
            version: 2,
            sql: "CREATE TABLE audit_log (id INTEGER PRIMARY KEY, note TEXT);",
        },
    ];
    let conn = open_db(&path, &upgraded).unwrap();
    assert_eq!(schema_version(&conn), 2);
    assert_table_exists(&conn, "audit_log");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, MIGRATIONS).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version(MIGRATIONS));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn out_of_order_migrations_are_rejected() {
    let migrations = [
        Migration {
            version: 2,
            sql: "CREATE TABLE b (id INTEGER PRIMARY KEY);",
        },
        Migration {
            version: 1,
            sql: "CREATE TABLE a (id INTEGER PRIMARY KEY);",
        },
    ];

    let err = open_db_in_memory(&migrations).unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidMigrationOrder {
            previous: 2,
            next: 1
        }
    ));
}

#[test]
fn failing_migration_leaves_version_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.db");
    let broken = [
        MIGRATIONS[0],
        Migration {
            version: 2,
            sql: "CREATE TABLE oops (;",
        },
    ];

    let err = open_db(&path, &broken).unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
}

#[test]
fn repository_requires_entity_table() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteRepository::<Article>::try_new(SqliteBackend::new(&conn))
        .err()
        .unwrap();
    assert!(matches!(err, RepoError::MissingRequiredTable("articles")));
}

#[test]
fn repository_requires_every_declared_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE articles (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            author_id INTEGER,
            created_at INTEGER,
            updated_at INTEGER
        );",
    )
    .unwrap();

    let err = SqliteRepository::<Article>::try_new(SqliteBackend::new(&conn))
        .err()
        .unwrap();
    match err {
        RepoError::MissingRequiredColumn { table, column } => {
            assert_eq!(table, "articles");
            assert_eq!(column, "summary");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repository_requires_related_tables() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE articles (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            summary TEXT,
            author_id INTEGER,
            created_at INTEGER,
            updated_at INTEGER
        );",
    )
    .unwrap();

    let err = SqliteRepository::<Article>::try_new(SqliteBackend::new(&conn))
        .err()
        .unwrap();
    assert!(matches!(err, RepoError::MissingRequiredTable("authors")));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
