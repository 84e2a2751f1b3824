//! Integration tests for opening databases and running queries

use duck_plus::{Database, DatabaseConfig, Error, Value};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_open_in_memory() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.is_in_memory());
    assert_eq!(db.path(), ":memory:");
}

#[test]
fn test_in_memory_databases_are_isolated() {
    let a = Database::open_in_memory().unwrap();
    let b = Database::open_in_memory().unwrap();
    a.execute_batch("CREATE TABLE only_in_a (x INTEGER)").unwrap();
    assert!(b.table("only_in_a").is_err());
}

#[test]
fn test_builder_settings_reach_engine() {
    let db = Database::builder()
        .threads(2)
        .memory_limit("512MB")
        .build()
        .unwrap();
    let result = db
        .query("SELECT current_setting('threads')::BIGINT", &[])
        .unwrap();
    assert_eq!(result.rows()[0][0].as_i64(), Some(2));
}

#[test]
fn test_builder_rejects_zero_threads() {
    assert!(matches!(
        Database::builder().threads(0).build(),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_file_database_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.duckdb");

    {
        let db = Database::open(&path).unwrap();
        assert!(!db.is_in_memory());
        db.execute_batch("CREATE TABLE kept (x INTEGER); INSERT INTO kept VALUES (1), (2);")
            .unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.table("kept").unwrap().count().unwrap(), 2);
}

#[test]
fn test_read_only_rejects_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ro.duckdb");
    {
        let db = Database::open(&path).unwrap();
        db.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();
    }

    let db = Database::builder()
        .path(path.to_string_lossy())
        .read_only(true)
        .build()
        .unwrap();
    assert_eq!(db.table("t").unwrap().count().unwrap(), 1);
    assert!(matches!(
        db.execute("INSERT INTO t VALUES (2)", &[]),
        Err(Error::Engine(_))
    ));
}

#[test]
fn test_read_only_in_memory_rejected() {
    assert!(matches!(
        Database::builder().read_only(true).build(),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_invalid_connection_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing_dir").join("db.duckdb");
    let err = Database::open(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidPath(_)));
    assert!(err.to_string().contains("Invalid connection path"));
}

#[test]
fn test_config_from_json_file() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("configured.duckdb");
    let config_path = dir.path().join("db.json");
    fs::write(
        &config_path,
        serde_json::json!({
            "path": db_path.to_string_lossy(),
            "threads": 1,
            "settings": {"default_order": "desc"}
        })
        .to_string(),
    )
    .unwrap();

    let config = DatabaseConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.threads, Some(1));
    let db = Database::from_config(&config).unwrap();
    db.execute_batch("CREATE TABLE t AS SELECT * FROM range(3) r(x)")
        .unwrap();
    let result = db.query("SELECT x FROM t ORDER BY x", &[]).unwrap();
    assert_eq!(result.rows()[0][0].as_i64(), Some(2));
}

#[test]
fn test_config_rejects_unknown_keys() {
    assert!(matches!(
        DatabaseConfig::from_json_str(r#"{"path": ":memory:", "colour": "blue"}"#),
        Err(Error::Json(_))
    ));
}

#[test]
fn test_execute_returns_affected_rows() {
    let db = Database::open_in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (x INTEGER, y VARCHAR)").unwrap();
    let inserted = db
        .execute(
            "INSERT INTO t VALUES (?, ?), (?, ?)",
            &[1.into(), "a".into(), 2.into(), Value::Null],
        )
        .unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(db.execute("DELETE FROM t WHERE x > ?", &[0.into()]).unwrap(), 2);
}

#[test]
fn test_query_with_params() {
    let db = Database::open_in_memory().unwrap();
    let result = db
        .query("SELECT ? + 1 AS next, ? AS label", &[41.into(), "answer".into()])
        .unwrap();
    assert_eq!(result.columns(), ["next", "label"]);
    assert_eq!(result.rows()[0][0].as_i64(), Some(42));
    assert_eq!(result.rows()[0][1].as_str(), Some("answer"));

    let records = result.records();
    assert_eq!(records[0]["label"], Value::from("answer"));
}

#[test]
fn test_query_result_helpers() {
    let db = Database::open_in_memory().unwrap();
    let result = db
        .query("SELECT range AS Id FROM range(3)", &[])
        .unwrap();
    assert_eq!(result.len(), 3);
    assert!(!result.is_empty());
    assert_eq!(result.column_index("id"), Some(0));
    assert_eq!(result.column("ID").unwrap().len(), 3);
    assert!(result.column("missing").is_none());
    assert_eq!(result.tuples().len(), 3);
}

#[test]
fn test_query_arrow() {
    let db = Database::open_in_memory().unwrap();
    let batches = db.query_arrow("SELECT * FROM range(10)").unwrap();
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 10);
}

#[test]
fn test_engine_errors_surface() {
    let db = Database::open_in_memory().unwrap();
    let err = db.query("SELECT * FROM no_such_table", &[]).unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert!(err.to_string().starts_with("DuckDB error:"));
}

#[test]
fn test_describe() {
    let db = Database::open_in_memory().unwrap();
    let columns = db.describe("SELECT 1::INTEGER AS a, 'x' AS b").unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(columns[0].data_type(), "INTEGER");
    assert_eq!(columns[1].data_type(), "VARCHAR");
}

#[test]
fn test_sql_relation_with_trailing_comment() {
    let db = Database::open_in_memory().unwrap();
    let rel = db.sql("SELECT 1 AS v; -- trailing").unwrap();
    assert_eq!(rel.count().unwrap(), 1);
    assert_eq!(rel.column_names(), vec!["v"]);

    let rel = db.sql("SELECT 2 AS v\n/* end */;\n").unwrap();
    assert_eq!(rel.fetch_all().unwrap().rows()[0][0], Value::Integer(2));
}

#[test]
fn test_interval_and_nested_values_as_text() {
    let db = Database::open_in_memory().unwrap();
    let result = db
        .query(
            "SELECT INTERVAL 1 DAY + INTERVAL 90 MINUTE AS i, \
             {'name': 'ada', 'n': 1} AS s, \
             MAP {'k': 2} AS m",
            &[],
        )
        .unwrap();
    let row = &result.rows()[0];
    assert_eq!(row[0], Value::from("1 day 01:30:00"));
    assert_eq!(row[1], Value::from("{'name': 'ada', 'n': 1}"));
    assert_eq!(row[2], Value::from("{'k'=2}"));
}
