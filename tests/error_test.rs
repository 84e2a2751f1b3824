//! Tests for error types

use duck_plus::{Error, Side};

#[test]
fn test_missing_join_columns_error() {
    let error = Error::MissingJoinColumns {
        left: vec!["a".to_string()],
        right: vec!["b".to_string(), "c".to_string()],
    };
    assert_eq!(
        error.to_string(),
        r#"Columns missing in join: left: ["a"], right: ["b", "c"]"#
    );

    let error = Error::MissingJoinColumns {
        left: vec![],
        right: vec!["b".to_string()],
    };
    assert_eq!(error.to_string(), r#"Columns missing in join: right: ["b"]"#);
}

#[test]
fn test_columns_not_found_names_side() {
    let error = Error::ColumnsNotFound {
        columns: vec!["ts".to_string()],
        side: Side::Right,
    };
    assert_eq!(
        error.to_string(),
        r#"Columns ["ts"] not found in the second relation."#
    );
}

#[test]
fn test_missing_alias_error() {
    let error = Error::MissingAlias(Side::Left);
    assert_eq!(
        error.to_string(),
        "The first relation must have an alias for ASOF join."
    );
}

#[test]
fn test_no_common_columns_error() {
    assert_eq!(
        Error::NoCommonColumns.to_string(),
        "No common columns for natural join."
    );
}

#[test]
fn test_unsupported_join_error() {
    let error = Error::UnsupportedJoin("sideways".to_string());
    assert!(error.to_string().contains("sideways"));
}

#[test]
fn test_extension_errors() {
    let error = Error::MissingExtension("README".to_string());
    assert_eq!(error.to_string(), "No file extension found in README");

    let error = Error::UnsupportedExtension {
        extension: "json".to_string(),
        file: "data.json".to_string(),
        supported: &["parquet", "csv", "xlsx"],
    };
    assert_eq!(
        error.to_string(),
        r#"Unsupported extension 'json' in data.json. Supported: ["parquet", "csv", "xlsx"]"#
    );
}

#[test]
fn test_transform_already_applied_hint() {
    let bare = Error::TransformAlreadyApplied {
        name: "clean".to_string(),
        hint: None,
    };
    let hinted = Error::TransformAlreadyApplied {
        name: "clean".to_string(),
        hint: Some("try again".to_string()),
    };
    assert!(bare.to_string().contains("clean"));
    assert!(!bare.to_string().contains("try again"));
    assert!(hinted.to_string().ends_with(": try again"));
}

#[test]
fn test_unknown_columns_error() {
    let error = Error::UnknownColumns {
        target: "users".to_string(),
        columns: vec!["email".to_string()],
    };
    assert_eq!(error.to_string(), r#"Unknown columns for 'users': ["email"]"#);
}

#[test]
fn test_parse_error() {
    let error = Error::ParseError("invalid SQL".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("SQL parse error"));
    assert!(error_str.contains("invalid SQL"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let error: Error = io_error.into();
    assert!(matches!(error, Error::Io(_)));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(matches!(error, Error::Json(_)));
}

#[test]
fn test_error_debug() {
    let error = Error::InvalidArgument("test".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("InvalidArgument"));
}

#[test]
fn test_unexpected_result_error() {
    let error = Error::UnexpectedResult("count returned 0 rows".to_string());
    assert_eq!(error.to_string(), "Unexpected result: count returned 0 rows");
}
