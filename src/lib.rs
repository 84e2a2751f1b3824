//! # duck-plus: friendlier DuckDB
//!
//! duck-plus is a thin layer over the DuckDB embedded analytics engine.
//! The engine does all query planning, execution and file decoding; this
//! crate adds:
//!
//! - **Connection handling**: [`Database`] with a builder and a
//!   JSON-loadable [`DatabaseConfig`]
//! - **Relations**: lazily evaluated queries with validated `USING`,
//!   natural and ASOF joins ([`relation`])
//! - **File loading**: typed options for `read_csv`, `read_parquet` and
//!   `read_xlsx` ([`loader`]), plus file relations that track applied
//!   transforms ([`file`])
//! - **Bulk insert**: rows keyed by column name, appended through the
//!   engine's native appender ([`insert`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use duck_plus::{AsofDirection, Database, JoinKind};
//!
//! let db = Database::open_in_memory()?;
//! db.execute_batch(
//!     "CREATE TABLE trades (sym VARCHAR, ts TIMESTAMP, price DOUBLE);
//!      CREATE TABLE quotes (sym VARCHAR, ts TIMESTAMP, bid DOUBLE);",
//! )?;
//!
//! let trades = db.table("trades")?;
//! let quotes = db.table("quotes")?;
//!
//! // Latest quote at or before every trade, per symbol
//! let joined = trades.asof_join(&quotes, "ts", &["sym"], AsofDirection::Backward)?;
//! println!("{} rows", joined.count()?);
//!
//! // Symbols present in both tables
//! let both = trades.using_join(&quotes, JoinKind::Semi, &["sym"])?;
//! println!("{both}");
//! # Ok::<(), duck_plus::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod database;
pub mod error;
pub mod file;
pub mod insert;
pub mod loader;
pub mod relation;
pub mod sql;
pub mod value;

pub use config::DatabaseConfig;
pub use database::{Database, DatabaseBuilder};
pub use error::{Error, Result, Side};
pub use file::FileEntryRelation;
pub use insert::InsertOptions;
pub use loader::{CsvOptions, LoadMode, ParquetOptions, ScanOptions, SourceType, XlsxOptions};
pub use relation::{AsofDirection, Column, JoinKind, Relation};
pub use value::{QueryResult, Row, Value};
