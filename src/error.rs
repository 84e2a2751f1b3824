//! Error types for duck-plus
//!
//! Validation failures get their own variants with actionable messages.
//! Anything the engine rejects surfaces as [`Error::Engine`].

use std::fmt;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a two-relation operation an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The relation the method was called on
    Left,
    /// The relation passed as argument
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("first"),
            Self::Right => f.write_str("second"),
        }
    }
}

/// duck-plus error types
#[derive(Error, Debug)]
pub enum Error {
    /// Database or file path is unusable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Argument failed validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Join type string not recognised
    #[error("Unsupported join type: {0}")]
    UnsupportedJoin(String),

    /// USING columns absent from one or both join inputs
    #[error("Columns missing in join: {}", describe_missing(.left, .right))]
    MissingJoinColumns {
        /// Columns absent from the left relation
        left: Vec<String>,
        /// Columns absent from the right relation
        right: Vec<String>,
    },

    /// ASOF join columns absent from one relation
    #[error("Columns {columns:?} not found in the {side} relation.")]
    ColumnsNotFound {
        /// Missing column names
        columns: Vec<String>,
        /// Relation that lacks them
        side: Side,
    },

    /// Natural join between relations without shared columns
    #[error("No common columns for natural join.")]
    NoCommonColumns,

    /// Relation lacks the alias an ASOF join needs
    #[error("The {0} relation must have an alias for ASOF join.")]
    MissingAlias(Side),

    /// Column names unknown to a table or relation
    #[error("Unknown columns for '{target}': {columns:?}")]
    UnknownColumns {
        /// Table or relation alias
        target: String,
        /// Offending column names
        columns: Vec<String>,
    },

    /// File has no extension to derive a source type from
    #[error("No file extension found in {0}")]
    MissingExtension(String),

    /// File extension is not a supported source type
    #[error("Unsupported extension '{extension}' in {file}. Supported: {supported:?}")]
    UnsupportedExtension {
        /// Lower-cased extension
        extension: String,
        /// File name
        file: String,
        /// Extensions that are accepted
        supported: &'static [&'static str],
    },

    /// Transform name or function was already applied to a file entry
    #[error("Transform '{name}' has already been applied{}", render_hint(.hint))]
    TransformAlreadyApplied {
        /// Alias the transform was registered under
        name: String,
        /// Optional guidance for the caller
        hint: Option<String>,
    },

    /// User-supplied SQL fragment could not be parsed
    #[error("SQL parse error: {0}")]
    ParseError(String),

    /// Engine answered with a result of the wrong shape
    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),

    /// Error reported by the DuckDB engine
    #[error("DuckDB error: {0}")]
    Engine(#[from] duckdb::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe_missing(left: &[String], right: &[String]) -> String {
    match (left.is_empty(), right.is_empty()) {
        (false, false) => format!("left: {left:?}, right: {right:?}"),
        (false, true) => format!("left: {left:?}"),
        (true, false) => format!("right: {right:?}"),
        (true, true) => String::new(),
    }
}

fn render_hint(hint: &Option<String>) -> String {
    hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default()
}
