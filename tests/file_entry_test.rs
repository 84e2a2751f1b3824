//! Integration tests for file-backed relations and their transform log

use duck_plus::{Database, Error, FileEntryRelation, Result, SourceType};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn numbers_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("b_numbers.csv"), "n\n1\n2\n3\n4\n").unwrap();
    fs::write(dir.path().join("a_numbers.csv"), "n\n10\n11\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    fs::create_dir(dir.path().join("nested.csv")).unwrap();
    dir
}

fn only_even(entry: FileEntryRelation<'_>) -> Result<FileEntryRelation<'_>> {
    entry.map_relation(|rel| rel.filter("n % 2 = 0"))
}

fn doubled(entry: FileEntryRelation<'_>) -> Result<FileEntryRelation<'_>> {
    entry.map_relation(|rel| {
        let db = rel.database();
        db.sql(&format!("SELECT n * 2 AS n FROM ({}\n)", rel.query()))
    })
}

fn failing(_entry: FileEntryRelation<'_>) -> Result<FileEntryRelation<'_>> {
    Err(Error::InvalidArgument("boom".to_string()))
}

fn open<'db>(db: &'db Database, dir: &Path, name: &str) -> FileEntryRelation<'db> {
    FileEntryRelation::open(db, dir.join(name)).unwrap()
}

#[test]
fn test_from_dir_sorted_and_filtered() {
    let dir = numbers_dir();
    let db = Database::open_in_memory().unwrap();

    let entries = FileEntryRelation::from_dir(&db, dir.path()).unwrap();
    let names: Vec<String> = entries.iter().map(FileEntryRelation::file_name).collect();
    assert_eq!(names, vec!["a_numbers.csv", "b_numbers.csv"]);
    assert!(entries.iter().all(|e| e.source_type() == SourceType::Csv));
    assert_eq!(entries[1].relation().count().unwrap(), 4);
}

#[test]
fn test_from_dir_missing_directory() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_in_memory().unwrap();
    assert!(matches!(
        FileEntryRelation::from_dir(&db, dir.path().join("nope")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_open_errors() {
    let dir = numbers_dir();
    let db = Database::open_in_memory().unwrap();

    assert!(matches!(
        FileEntryRelation::open(&db, dir.path().join("absent.csv")),
        Err(Error::InvalidPath(_))
    ));
    assert!(matches!(
        FileEntryRelation::open(&db, dir.path().join("nested.csv")),
        Err(Error::InvalidPath(_))
    ));
    assert!(matches!(
        FileEntryRelation::open(&db, dir.path().join("notes.txt")),
        Err(Error::UnsupportedExtension { .. })
    ));
}

#[test]
fn test_apply_transform() {
    let dir = numbers_dir();
    let db = Database::open_in_memory().unwrap();

    let entry = open(&db, dir.path(), "b_numbers.csv")
        .apply_transform(only_even, "even", false)
        .unwrap();
    assert_eq!(entry.relation().count().unwrap(), 2);
    assert!(entry.transform_names().contains("even"));
    assert_eq!(entry.transform_log(), vec!["even"]);
    assert_eq!(entry.file_name(), "b_numbers.csv");
}

#[test]
fn test_same_transform_twice_needs_reapply() {
    let dir = numbers_dir();
    let db = Database::open_in_memory().unwrap();

    let entry = open(&db, dir.path(), "b_numbers.csv")
        .apply_transform(doubled, "double", false)
        .unwrap();

    let err = entry
        .clone()
        .apply_transform(doubled, "double_again", false)
        .unwrap_err();
    assert!(matches!(
        &err,
        Error::TransformAlreadyApplied { name, hint: Some(_) } if name == "double_again"
    ));
    assert!(err.to_string().contains("reapply"));

    let entry = entry.apply_transform(doubled, "double_again", true).unwrap();
    let result = entry.relation().order_by("n").unwrap().fetch_all().unwrap();
    let values: Vec<i64> = result.rows().iter().map(|r| r[0].as_i64().unwrap()).collect();
    assert_eq!(values, vec![4, 8, 12, 16]);
    assert_eq!(entry.transform_log(), vec!["double", "double_again"]);
}

#[test]
fn test_alias_cannot_be_reused() {
    let dir = numbers_dir();
    let db = Database::open_in_memory().unwrap();

    let entry = open(&db, dir.path(), "b_numbers.csv")
        .apply_transform(only_even, "step", false)
        .unwrap();
    // Even with reapply and a different transform
    assert!(matches!(
        entry.apply_transform(doubled, "step", true),
        Err(Error::TransformAlreadyApplied { hint: None, .. })
    ));
}

#[test]
fn test_failed_transform_propagates() {
    let dir = numbers_dir();
    let db = Database::open_in_memory().unwrap();

    let err = open(&db, dir.path(), "a_numbers.csv")
        .apply_transform(failing, "fail", false)
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid argument: boom");
}

#[test]
fn test_log_preserves_order_and_display() {
    let dir = numbers_dir();
    let db = Database::open_in_memory().unwrap();

    let entry = open(&db, dir.path(), "b_numbers.csv")
        .apply_transform(doubled, "z_double", false)
        .unwrap()
        .apply_transform(only_even, "a_even", false)
        .unwrap();
    assert_eq!(entry.transform_log(), vec!["z_double", "a_even"]);
    assert_eq!(
        entry.transform_names().iter().cloned().collect::<Vec<_>>(),
        vec!["a_even".to_string(), "z_double".to_string()]
    );
    assert_eq!(
        entry.to_string(),
        r#"FileEntryRelation(b_numbers.csv, csv, transforms=["z_double", "a_even"])"#
    );

    let rel = entry.into_relation();
    assert_eq!(rel.count().unwrap(), 4);
}
