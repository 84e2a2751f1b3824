//! Connection holder and query execution

use crate::config::{DatabaseConfig, IN_MEMORY};
use crate::relation::{Column, Relation};
use crate::sql::{ensure_query, quote_ident, quote_qualified, strip_terminator};
use crate::value::{QueryResult, Value};
use crate::Result;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::{params_from_iter, Connection};
use std::cell::Cell;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// An open DuckDB database
///
/// Owns a single engine connection. Relations borrow the database, so they
/// cannot outlive it.
pub struct Database {
    conn: Connection,
    path: String,
    relation_seq: Cell<u64>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Create a new database builder
    #[must_use]
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    /// Open (or create) a database file with default settings.
    ///
    /// # Errors
    /// Returns error if the path is invalid or the engine cannot open it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_config(&DatabaseConfig::new(path.as_ref().to_string_lossy()))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns error if the engine fails to start
    pub fn open_in_memory() -> Result<Self> {
        Self::from_config(&DatabaseConfig::default())
    }

    /// Open a database described by `config`.
    ///
    /// # Errors
    /// Returns error if the config fails validation, the engine rejects a
    /// setting, or an extension cannot be loaded
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let flags = config.to_engine_config()?;
        let conn = if config.is_in_memory() {
            Connection::open_in_memory_with_flags(flags)?
        } else {
            Connection::open_with_flags(&config.path, flags)?
        };
        info!(path = %config.path, read_only = config.read_only, "opened database");

        let db = Self {
            conn,
            path: config.path.clone(),
            relation_seq: Cell::new(0),
        };
        for extension in &config.extensions {
            let name = quote_ident(extension);
            db.execute_batch(&format!("INSTALL {name}; LOAD {name};"))?;
        }
        Ok(db)
    }

    /// Path the database was opened with (`":memory:"` for in-memory)
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True for in-memory databases
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY
    }

    /// Underlying engine connection, for calls this crate does not wrap
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Execute one statement with positional parameters.
    ///
    /// Returns the number of rows the engine reports as changed.
    ///
    /// # Errors
    /// Returns the engine error if the statement fails
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        debug!(%sql, "execute");
        Ok(self
            .conn
            .execute(sql, params_from_iter(params.iter().cloned()))?)
    }

    /// Execute a script of one or more statements without parameters.
    ///
    /// # Errors
    /// Returns the engine error of the first failing statement
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!(%sql, "execute batch");
        Ok(self.conn.execute_batch(sql)?)
    }

    /// Run a query and collect every row.
    ///
    /// # Errors
    /// Returns the engine error if preparation or execution fails
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        debug!(%sql, "query");
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter().cloned()))?;
        let columns = rows
            .as_ref()
            .map(|stmt| stmt.column_names())
            .unwrap_or_default();

        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let value: duckdb::types::Value = row.get(idx)?;
                values.push(Value::from(value));
            }
            collected.push(values);
        }
        Ok(QueryResult::new(columns, collected))
    }

    /// Run a query and return its Arrow record batches.
    ///
    /// # Errors
    /// Returns the engine error if preparation or execution fails
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        debug!(%sql, "query arrow");
        let mut stmt = self.conn.prepare(sql)?;
        let batches = stmt.query_arrow([])?.collect();
        Ok(batches)
    }

    /// Relation over a table or view (`name` or `schema.name`).
    ///
    /// # Errors
    /// Returns the engine error if the table does not exist
    pub fn table(&self, name: &str) -> Result<Relation<'_>> {
        let query = format!("SELECT * FROM {}", quote_qualified(name));
        let alias = crate::sql::split_qualified(name).1.to_string();
        Relation::from_query(self, query, alias)
    }

    /// Relation over an arbitrary query.
    ///
    /// The relation gets a generated alias (`unnamed_relation_<n>`); rename
    /// it with [`Relation::with_alias`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for
    /// non-query or multi-statement text, and the engine error if the query
    /// does not bind
    pub fn sql(&self, query: &str) -> Result<Relation<'_>> {
        ensure_query(query)?;
        let query = strip_terminator(query).to_string();
        Relation::from_query(self, query, self.next_alias())
    }

    /// Column names and types produced by `query`.
    ///
    /// # Errors
    /// Returns the engine error if the query does not bind
    pub fn describe(&self, query: &str) -> Result<Vec<Column>> {
        let result = self.query(
            &format!("DESCRIBE SELECT * FROM ({query}\n) AS \"__describe\""),
            &[],
        )?;
        Ok(describe_rows(&result))
    }

    /// Column names and types of a table.
    ///
    /// # Errors
    /// Returns the engine error if the table does not exist
    pub fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let result = self.query(&format!("DESCRIBE {}", quote_qualified(table)), &[])?;
        Ok(describe_rows(&result))
    }

    pub(crate) fn next_alias(&self) -> String {
        let n = self.relation_seq.get() + 1;
        self.relation_seq.set(n);
        format!("unnamed_relation_{n}")
    }
}

fn describe_rows(result: &QueryResult) -> Vec<Column> {
    result
        .rows()
        .iter()
        .filter_map(|row| match (row.first(), row.get(1)) {
            (Some(Value::Text(name)), Some(Value::Text(data_type))) => {
                Some(Column::new(name.clone(), data_type.clone()))
            }
            _ => None,
        })
        .collect()
}

/// Database builder
#[derive(Debug, Default, Clone)]
pub struct DatabaseBuilder {
    config: DatabaseConfig,
}

impl DatabaseBuilder {
    /// Set the database file (default `":memory:"`)
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Open read-only
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the engine's worker thread count
    #[must_use]
    pub const fn threads(mut self, threads: u32) -> Self {
        self.config.threads = Some(threads);
        self
    }

    /// Set the engine memory limit, e.g. `"1GB"`
    #[must_use]
    pub fn memory_limit(mut self, limit: impl Into<String>) -> Self {
        self.config.memory_limit = Some(limit.into());
        self
    }

    /// Toggle extension autoloading
    #[must_use]
    pub const fn autoload_extensions(mut self, enabled: bool) -> Self {
        self.config.autoload_extensions = Some(enabled);
        self
    }

    /// Install and load an extension after opening
    #[must_use]
    pub fn extension(mut self, name: impl Into<String>) -> Self {
        self.config.extensions.push(name.into());
        self
    }

    /// Pass an engine setting through verbatim
    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.settings.insert(key.into(), value.into());
        self
    }

    /// Config assembled so far
    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Build the database
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or the engine cannot open it
    pub fn build(self) -> Result<Database> {
        Database::from_config(&self.config)
    }
}
