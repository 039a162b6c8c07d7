use framegrid_core::db::migrations::latest_version;
use framegrid_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const TABLES: [&str; 6] = [
    "process",
    "frame",
    "object",
    "process_frame",
    "process_object",
    "frame_object",
];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("framegrid.sqlite3");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute("INSERT INTO process (name, name_key) VALUES ('Welding', 'welding')", [])
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let processes: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM process", [], |row| row.get(0))
        .unwrap();
    assert_eq!(processes, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_keys_cascade_entity_deletes_to_links() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO process (id, name, name_key) VALUES (1, 'Welding', 'welding');
         INSERT INTO frame (id, name, name_key) VALUES (10, 'F1', 'f1');
         INSERT INTO process_frame (process_id, frame_id) VALUES (1, 10);
         DELETE FROM frame WHERE id = 10;",
    )
    .unwrap();

    let links: i64 = conn
        .query_row("SELECT COUNT(*) FROM process_frame", [], |row| row.get(0))
        .unwrap();
    assert_eq!(links, 0);

    let dangling = conn.execute(
        "INSERT INTO process_frame (process_id, frame_id) VALUES (1, 99)",
        [],
    );
    assert!(dangling.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table `{table_name}` should exist");
}
