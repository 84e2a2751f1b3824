//! File loading helpers
//!
//! Each options type renders one engine table function call
//! (`read_csv`, `read_parquet`, `read_xlsx`) containing only the options
//! the caller set; everything else keeps the engine's defaults.
//!
//! XLSX scans need DuckDB 1.2+ and the `excel` extension, which the engine
//! autoloads unless autoloading is disabled.

use crate::database::Database;
use crate::relation::Relation;
use crate::sql::{quote_literal, quote_qualified};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Extensions accepted by [`SourceType::from_path`]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["parquet", "csv", "xlsx"];

/// File formats the loaders understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Apache Parquet
    Parquet,
    /// Delimited text
    Csv,
    /// Excel workbook
    Xlsx,
}

impl SourceType {
    /// Derive the source type from a file's extension (case-insensitive).
    ///
    /// # Errors
    /// - [`Error::MissingExtension`] if the file name has no extension
    /// - [`Error::UnsupportedExtension`] for anything not in [`SUPPORTED_EXTENSIONS`]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
            .into_owned();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .ok_or_else(|| Error::MissingExtension(file.clone()))?;
        extension.parse().map_err(|_| Error::UnsupportedExtension {
            extension,
            file,
            supported: SUPPORTED_EXTENSIONS,
        })
    }

    /// Engine table function that scans this format
    #[must_use]
    pub const fn scan_function(self) -> &'static str {
        match self {
            Self::Parquet => "read_parquet",
            Self::Csv => "read_csv",
            Self::Xlsx => "read_xlsx",
        }
    }

    /// Lower-case extension
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parquet" => Ok(Self::Parquet),
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(Error::InvalidArgument(format!(
                "unsupported source type '{other}'. Supported: {SUPPORTED_EXTENSIONS:?}"
            ))),
        }
    }
}

/// Options of one engine scan function
pub trait ScanOptions {
    /// Format these options apply to
    const SOURCE: SourceType;

    /// Reject option values the engine would refuse or misread.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] describing the bad option
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// `name = value` pairs for the options that were set, values already
    /// rendered as SQL
    fn named_params(&self) -> Vec<(&'static str, String)>;

    /// Full table function call for `path`
    fn scan_sql(&self, path: &str) -> String {
        let mut args = vec![quote_literal(path)];
        args.extend(
            self.named_params()
                .into_iter()
                .map(|(name, value)| format!("{name} = {value}")),
        );
        format!("{}({})", Self::SOURCE.scan_function(), args.join(", "))
    }
}

fn push_bool(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<bool>) {
    if let Some(v) = value {
        params.push((name, v.to_string()));
    }
}

fn push_text(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<&str>) {
    if let Some(v) = value {
        params.push((name, quote_literal(v)));
    }
}

fn reject_empty(name: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if v.is_empty() => Err(Error::InvalidArgument(format!("{name} must not be empty"))),
        _ => Ok(()),
    }
}

/// Options for `read_csv`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvOptions {
    /// First line holds column names
    pub header: Option<bool>,
    /// Field separator
    pub delimiter: Option<String>,
    /// Quote character
    pub quote: Option<String>,
    /// Escape character
    pub escape: Option<String>,
    /// Lines to skip before the header
    pub skip: Option<u64>,
    /// Read every column as VARCHAR
    pub all_varchar: Option<bool>,
    /// Rows sampled for type detection (`-1` = all)
    pub sample_size: Option<i64>,
    /// Skip lines that fail to parse
    pub ignore_errors: Option<bool>,
    /// Pad short lines with NULL
    pub null_padding: Option<bool>,
    /// Text that reads as NULL
    pub nullstr: Option<String>,
    /// strftime format for DATE columns
    pub date_format: Option<String>,
    /// strftime format for TIMESTAMP columns
    pub timestamp_format: Option<String>,
    /// Compression codec (`gzip`, `zstd`, `none`, `auto`)
    pub compression: Option<String>,
    /// Add a `filename` column
    pub filename: Option<bool>,
    /// Interpret hive-style partition directories
    pub hive_partitioning: Option<bool>,
    /// Unify multiple files by column name
    pub union_by_name: Option<bool>,
    /// Explicit `(name, type)` pairs in file order; disables type detection
    pub columns: Option<Vec<(String, String)>>,
}

impl CsvOptions {
    /// Engine defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the first line is a header
    #[must_use]
    pub const fn header(mut self, header: bool) -> Self {
        self.header = Some(header);
        self
    }

    /// Set the field separator
    #[must_use]
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Set the quote character
    #[must_use]
    pub fn quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = Some(quote.into());
        self
    }

    /// Set the escape character
    #[must_use]
    pub fn escape(mut self, escape: impl Into<String>) -> Self {
        self.escape = Some(escape.into());
        self
    }

    /// Skip leading lines
    #[must_use]
    pub const fn skip(mut self, lines: u64) -> Self {
        self.skip = Some(lines);
        self
    }

    /// Read every column as VARCHAR
    #[must_use]
    pub const fn all_varchar(mut self, all_varchar: bool) -> Self {
        self.all_varchar = Some(all_varchar);
        self
    }

    /// Rows sampled for type detection (`-1` = all)
    #[must_use]
    pub const fn sample_size(mut self, rows: i64) -> Self {
        self.sample_size = Some(rows);
        self
    }

    /// Skip lines that fail to parse
    #[must_use]
    pub const fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = Some(ignore);
        self
    }

    /// Pad short lines with NULL
    #[must_use]
    pub const fn null_padding(mut self, pad: bool) -> Self {
        self.null_padding = Some(pad);
        self
    }

    /// Text that reads as NULL
    #[must_use]
    pub fn nullstr(mut self, nullstr: impl Into<String>) -> Self {
        self.nullstr = Some(nullstr.into());
        self
    }

    /// strftime format for dates
    #[must_use]
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// strftime format for timestamps
    #[must_use]
    pub fn timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = Some(format.into());
        self
    }

    /// Compression codec
    #[must_use]
    pub fn compression(mut self, codec: impl Into<String>) -> Self {
        self.compression = Some(codec.into());
        self
    }

    /// Add a `filename` column
    #[must_use]
    pub const fn filename(mut self, filename: bool) -> Self {
        self.filename = Some(filename);
        self
    }

    /// Interpret hive-style partitions
    #[must_use]
    pub const fn hive_partitioning(mut self, hive: bool) -> Self {
        self.hive_partitioning = Some(hive);
        self
    }

    /// Unify files by column name
    #[must_use]
    pub const fn union_by_name(mut self, union: bool) -> Self {
        self.union_by_name = Some(union);
        self
    }

    /// Declare one column explicitly; call repeatedly for more
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns
            .get_or_insert_with(Vec::new)
            .push((name.into(), data_type.into()));
        self
    }
}

impl ScanOptions for CsvOptions {
    const SOURCE: SourceType = SourceType::Csv;

    fn validate(&self) -> Result<()> {
        reject_empty("delimiter", self.delimiter.as_deref())?;
        reject_empty("quote", self.quote.as_deref())?;
        reject_empty("escape", self.escape.as_deref())?;
        if let Some(n) = self.sample_size {
            if n == 0 || n < -1 {
                return Err(Error::InvalidArgument(format!(
                    "sample_size must be positive or -1, got {n}"
                )));
            }
        }
        if self.columns.as_ref().is_some_and(Vec::is_empty) {
            return Err(Error::InvalidArgument(
                "columns must declare at least one column".to_string(),
            ));
        }
        Ok(())
    }

    fn named_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_bool(&mut params, "header", self.header);
        push_text(&mut params, "delim", self.delimiter.as_deref());
        push_text(&mut params, "quote", self.quote.as_deref());
        push_text(&mut params, "escape", self.escape.as_deref());
        if let Some(skip) = self.skip {
            params.push(("skip", skip.to_string()));
        }
        push_bool(&mut params, "all_varchar", self.all_varchar);
        if let Some(n) = self.sample_size {
            params.push(("sample_size", n.to_string()));
        }
        push_bool(&mut params, "ignore_errors", self.ignore_errors);
        push_bool(&mut params, "null_padding", self.null_padding);
        push_text(&mut params, "nullstr", self.nullstr.as_deref());
        push_text(&mut params, "dateformat", self.date_format.as_deref());
        push_text(&mut params, "timestampformat", self.timestamp_format.as_deref());
        push_text(&mut params, "compression", self.compression.as_deref());
        push_bool(&mut params, "filename", self.filename);
        push_bool(&mut params, "hive_partitioning", self.hive_partitioning);
        push_bool(&mut params, "union_by_name", self.union_by_name);
        if let Some(columns) = &self.columns {
            let entries = columns
                .iter()
                .map(|(name, ty)| format!("{}: {}", quote_literal(name), quote_literal(ty)))
                .collect::<Vec<_>>()
                .join(", ");
            params.push(("columns", format!("{{{entries}}}")));
        }
        params
    }
}

/// Options for `read_parquet`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParquetOptions {
    /// Read BLOB columns as VARCHAR
    pub binary_as_string: Option<bool>,
    /// Add a `filename` column
    pub filename: Option<bool>,
    /// Add a `file_row_number` column
    pub file_row_number: Option<bool>,
    /// Interpret hive-style partition directories
    pub hive_partitioning: Option<bool>,
    /// Unify multiple files by column name
    pub union_by_name: Option<bool>,
}

impl ParquetOptions {
    /// Engine defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read BLOB columns as VARCHAR
    #[must_use]
    pub const fn binary_as_string(mut self, enabled: bool) -> Self {
        self.binary_as_string = Some(enabled);
        self
    }

    /// Add a `filename` column
    #[must_use]
    pub const fn filename(mut self, enabled: bool) -> Self {
        self.filename = Some(enabled);
        self
    }

    /// Add a `file_row_number` column
    #[must_use]
    pub const fn file_row_number(mut self, enabled: bool) -> Self {
        self.file_row_number = Some(enabled);
        self
    }

    /// Interpret hive-style partitions
    #[must_use]
    pub const fn hive_partitioning(mut self, enabled: bool) -> Self {
        self.hive_partitioning = Some(enabled);
        self
    }

    /// Unify files by column name
    #[must_use]
    pub const fn union_by_name(mut self, enabled: bool) -> Self {
        self.union_by_name = Some(enabled);
        self
    }
}

impl ScanOptions for ParquetOptions {
    const SOURCE: SourceType = SourceType::Parquet;

    fn named_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_bool(&mut params, "binary_as_string", self.binary_as_string);
        push_bool(&mut params, "filename", self.filename);
        push_bool(&mut params, "file_row_number", self.file_row_number);
        push_bool(&mut params, "hive_partitioning", self.hive_partitioning);
        push_bool(&mut params, "union_by_name", self.union_by_name);
        params
    }
}

/// Options for `read_xlsx`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XlsxOptions {
    /// Worksheet name (default: first sheet)
    pub sheet: Option<String>,
    /// First row holds column names
    pub header: Option<bool>,
    /// Read every column as VARCHAR
    pub all_varchar: Option<bool>,
    /// Replace cells that fail to convert with NULL
    pub ignore_errors: Option<bool>,
    /// Cell range such as `A1:C100`
    pub range: Option<String>,
    /// Stop at the first empty row
    pub stop_at_empty: Option<bool>,
}

impl XlsxOptions {
    /// Engine defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Worksheet to read
    #[must_use]
    pub fn sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Set whether the first row is a header
    #[must_use]
    pub const fn header(mut self, header: bool) -> Self {
        self.header = Some(header);
        self
    }

    /// Read every column as VARCHAR
    #[must_use]
    pub const fn all_varchar(mut self, all_varchar: bool) -> Self {
        self.all_varchar = Some(all_varchar);
        self
    }

    /// Replace unconvertible cells with NULL
    #[must_use]
    pub const fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = Some(ignore);
        self
    }

    /// Restrict to a cell range
    #[must_use]
    pub fn range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }

    /// Stop at the first empty row
    #[must_use]
    pub const fn stop_at_empty(mut self, stop: bool) -> Self {
        self.stop_at_empty = Some(stop);
        self
    }
}

impl ScanOptions for XlsxOptions {
    const SOURCE: SourceType = SourceType::Xlsx;

    fn validate(&self) -> Result<()> {
        reject_empty("sheet", self.sheet.as_deref())?;
        reject_empty("range", self.range.as_deref())
    }

    fn named_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_text(&mut params, "sheet", self.sheet.as_deref());
        push_bool(&mut params, "header", self.header);
        push_bool(&mut params, "all_varchar", self.all_varchar);
        push_bool(&mut params, "ignore_errors", self.ignore_errors);
        push_text(&mut params, "range", self.range.as_deref());
        push_bool(&mut params, "stop_at_empty", self.stop_at_empty);
        params
    }
}

/// What [`Database::load_table`] does with the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Create the table; fails if it exists
    #[default]
    Create,
    /// Create or overwrite the table
    Replace,
    /// Append to an existing table
    Append,
}

/// Paths the engine resolves itself: globs and remote URLs.
fn is_engine_resolved(path: &str) -> bool {
    path.contains(['*', '?', '['])
        || ["http://", "https://", "s3://", "gs://", "az://", "hf://"]
            .iter()
            .any(|scheme| path.starts_with(scheme))
}

fn check_source_path(path: &Path) -> Result<String> {
    let text = path.to_string_lossy().into_owned();
    if !is_engine_resolved(&text) && !path.is_file() {
        return Err(Error::InvalidPath(format!("file not found: {text}")));
    }
    Ok(text)
}

impl Database {
    /// Relation over any scan-options type.
    ///
    /// # Errors
    /// Returns error if the options are invalid, a local path does not
    /// exist, or the engine cannot read the file
    pub fn read_with<O: ScanOptions, P: AsRef<Path>>(&self, path: P, options: &O) -> Result<Relation<'_>> {
        options.validate()?;
        let path = check_source_path(path.as_ref())?;
        let query = format!("SELECT * FROM {}", options.scan_sql(&path));
        Relation::from_query(self, query, self.next_alias())
    }

    /// Relation over a CSV file (or glob).
    ///
    /// # Errors
    /// See [`Database::read_with`]
    pub fn read_csv<P: AsRef<Path>>(&self, path: P, options: &CsvOptions) -> Result<Relation<'_>> {
        self.read_with(path, options)
    }

    /// Relation over a Parquet file (or glob).
    ///
    /// # Errors
    /// See [`Database::read_with`]
    pub fn read_parquet<P: AsRef<Path>>(
        &self,
        path: P,
        options: &ParquetOptions,
    ) -> Result<Relation<'_>> {
        self.read_with(path, options)
    }

    /// Relation over an Excel worksheet.
    ///
    /// # Errors
    /// See [`Database::read_with`]
    pub fn read_xlsx<P: AsRef<Path>>(&self, path: P, options: &XlsxOptions) -> Result<Relation<'_>> {
        self.read_with(path, options)
    }

    /// Relation over a file, with the format taken from its extension and
    /// default options.
    ///
    /// # Errors
    /// Returns [`Error::MissingExtension`] / [`Error::UnsupportedExtension`]
    /// for unknown formats, otherwise see [`Database::read_with`]
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<Relation<'_>> {
        let path = path.as_ref();
        match SourceType::from_path(path)? {
            SourceType::Parquet => self.read_parquet(path, &ParquetOptions::default()),
            SourceType::Csv => self.read_csv(path, &CsvOptions::default()),
            SourceType::Xlsx => self.read_xlsx(path, &XlsxOptions::default()),
        }
    }

    /// Load a file into `table` and return the number of rows read.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or the table operation
    /// fails (existing table with [`LoadMode::Create`], missing or
    /// incompatible table with [`LoadMode::Append`])
    pub fn load_table<P: AsRef<Path>>(&self, table: &str, path: P, mode: LoadMode) -> Result<u64> {
        let source = self.read_file(path)?;
        let rows = source.count()?;
        match mode {
            LoadMode::Create => {
                source.create_table(table, false)?;
            }
            LoadMode::Replace => {
                source.create_table(table, true)?;
            }
            LoadMode::Append => {
                self.execute(
                    &format!(
                        "INSERT INTO {} BY NAME SELECT * FROM ({}\n)",
                        quote_qualified(table),
                        source.query()
                    ),
                    &[],
                )?;
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_from_path() {
        assert_eq!(SourceType::from_path("a/b/data.PARQUET").unwrap(), SourceType::Parquet);
        assert_eq!(SourceType::from_path("x.csv").unwrap(), SourceType::Csv);
        assert!(matches!(
            SourceType::from_path("notes"),
            Err(Error::MissingExtension(name)) if name == "notes"
        ));
        let err = SourceType::from_path("data.json").unwrap_err();
        assert!(err.to_string().contains("Unsupported extension 'json' in data.json"));
    }

    #[test]
    fn test_csv_defaults_render_bare_call() {
        assert_eq!(CsvOptions::new().scan_sql("/tmp/a.csv"), "read_csv('/tmp/a.csv')");
    }

    #[test]
    fn test_csv_options_render_in_order() {
        let sql = CsvOptions::new()
            .header(true)
            .delimiter(";")
            .skip(2)
            .nullstr("NA")
            .column("id", "INTEGER")
            .scan_sql("data.csv");
        assert_eq!(
            sql,
            "read_csv('data.csv', header = true, delim = ';', skip = 2, nullstr = 'NA', columns = {'id': 'INTEGER'})"
        );
    }

    #[test]
    fn test_csv_validation() {
        assert!(CsvOptions::new().delimiter("").validate().is_err());
        assert!(CsvOptions::new().sample_size(0).validate().is_err());
        assert!(CsvOptions::new().sample_size(-2).validate().is_err());
        assert!(CsvOptions::new().sample_size(-1).validate().is_ok());
    }

    #[test]
    fn test_csv_options_from_json() {
        let options: CsvOptions =
            serde_json::from_str(r#"{"header": false, "delimiter": "|"}"#).unwrap();
        assert_eq!(options, CsvOptions::new().header(false).delimiter("|"));
    }

    #[test]
    fn test_parquet_options_render() {
        let sql = ParquetOptions::new()
            .filename(true)
            .union_by_name(true)
            .scan_sql("dir/*.parquet");
        assert_eq!(
            sql,
            "read_parquet('dir/*.parquet', filename = true, union_by_name = true)"
        );
    }

    #[test]
    fn test_xlsx_options_render_and_validate() {
        let options = XlsxOptions::new().sheet("Q1").header(true).range("A1:C10");
        assert_eq!(
            options.scan_sql("book.xlsx"),
            "read_xlsx('book.xlsx', sheet = 'Q1', header = true, range = 'A1:C10')"
        );
        assert!(XlsxOptions::new().sheet("").validate().is_err());
    }

    #[test]
    fn test_path_quoting_in_scan() {
        assert_eq!(
            ParquetOptions::new().scan_sql("it's.parquet"),
            "read_parquet('it''s.parquet')"
        );
    }

    #[test]
    fn test_engine_resolved_paths() {
        assert!(is_engine_resolved("data/*.csv"));
        assert!(is_engine_resolved("s3://bucket/file.parquet"));
        assert!(!is_engine_resolved("/tmp/file.parquet"));
    }

    #[test]
    fn test_missing_local_file() {
        let err = check_source_path(Path::new("/no/such/file.csv")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
    }
}
