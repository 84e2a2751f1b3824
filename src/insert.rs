//! Bulk insert through the engine's native appender
//!
//! Rows are keyed by column name. Each row is laid out in table column
//! order before it reaches the appender; columns a row omits are appended
//! as NULL (the appender does not evaluate column defaults).

use crate::database::Database;
use crate::sql::split_qualified;
use crate::value::{Row, Value};
use crate::{Error, Result};
use duckdb::appender_params_from_iter;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Default number of rows appended between flushes
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Tuning for [`Database::insert_rows_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOptions {
    batch_size: usize,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl InsertOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows appended between flushes
    #[must_use]
    pub const fn batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows;
        self
    }

    /// Configured batch size
    #[must_use]
    pub const fn get_batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Lay out `rows` in table column order.
///
/// `columns` are the table's columns in order. Every key of every row must
/// match one of them case-insensitively.
fn layout_rows(table: &str, columns: &[String], rows: &[Row]) -> Result<Vec<Vec<Value>>> {
    let positions: FxHashMap<String, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let mut unknown = BTreeSet::new();
    let mut laid_out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = vec![Value::Null; columns.len()];
        for (key, value) in row {
            match positions.get(&key.to_lowercase()) {
                Some(&idx) => values[idx] = value.clone(),
                None => {
                    unknown.insert(key.clone());
                }
            }
        }
        laid_out.push(values);
    }

    if unknown.is_empty() {
        Ok(laid_out)
    } else {
        Err(Error::UnknownColumns {
            target: table.to_string(),
            columns: unknown.into_iter().collect(),
        })
    }
}

/// Turn a JSON object or array of objects into rows.
fn json_rows(json: &serde_json::Value) -> Result<Vec<Row>> {
    let objects: Vec<&serde_json::Map<String, serde_json::Value>> = match json {
        serde_json::Value::Object(object) => vec![object],
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| {
                    Error::InvalidArgument("every array element must be a JSON object".to_string())
                })
            })
            .collect::<Result<_>>()?,
        _ => {
            return Err(Error::InvalidArgument(
                "expected a JSON object or an array of objects".to_string(),
            ))
        }
    };

    objects
        .into_iter()
        .map(|object| {
            object
                .iter()
                .map(|(key, value)| Value::from_json(value).map(|v| (key.clone(), v)))
                .collect::<Result<Row>>()
        })
        .collect()
}

impl Database {
    /// Append `rows` to `table` with default options.
    ///
    /// # Errors
    /// See [`Database::insert_rows_with`]
    pub fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<usize> {
        self.insert_rows_with(table, rows, &InsertOptions::default())
    }

    /// Append `rows` to `table`, flushing every `batch_size` rows.
    ///
    /// Returns the number of rows appended. Column names are checked for
    /// every row before anything is written, and the append runs in one
    /// transaction: a value the engine rejects in any batch leaves the table
    /// unchanged. Inside a transaction the caller already opened, the rows
    /// join that transaction instead.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] for a zero batch size
    /// - [`Error::UnknownColumns`] listing every key that is not a table column
    /// - the engine error if the table does not exist or a value does not
    ///   convert to its column type
    pub fn insert_rows_with(
        &self,
        table: &str,
        rows: &[Row],
        options: &InsertOptions,
    ) -> Result<usize> {
        if options.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let columns: Vec<String> = self
            .table_columns(table)?
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let laid_out = layout_rows(table, &columns, rows)?;

        // A caller's open transaction owns commit and rollback
        if !self.connection().is_autocommit() {
            return self.append_rows(table, &laid_out, options.batch_size);
        }

        self.execute_batch("BEGIN TRANSACTION")?;
        match self.append_rows(table, &laid_out, options.batch_size) {
            Ok(appended) => {
                self.execute_batch("COMMIT")?;
                Ok(appended)
            }
            Err(e) => {
                if let Err(rollback) = self.execute_batch("ROLLBACK") {
                    warn!(table, error = %rollback, "rollback after failed insert");
                }
                Err(e)
            }
        }
    }

    fn append_rows(&self, table: &str, rows: &[Vec<Value>], batch_size: usize) -> Result<usize> {
        let mut appender = match split_qualified(table) {
            (Some(schema), name) => self.connection().appender_to_db(name, schema)?,
            (None, name) => self.connection().appender(name)?,
        };
        for batch in rows.chunks(batch_size) {
            for values in batch {
                appender.append_row(appender_params_from_iter(values.iter().cloned()))?;
            }
            appender.flush()?;
            debug!(table, rows = batch.len(), "appended batch");
        }
        Ok(rows.len())
    }

    /// Append rows given as a JSON object or an array of JSON objects.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for other JSON shapes or nested
    /// objects, otherwise see [`Database::insert_rows_with`]
    pub fn insert_json(&self, table: &str, json: &serde_json::Value) -> Result<usize> {
        let rows = json_rows(json)?;
        self.insert_rows(table, &rows)
    }
}
