//! Relations: named, lazily evaluated queries
//!
//! A [`Relation`] is a SELECT statement plus the alias and columns it
//! exposes. Every method that narrows or combines relations returns a new
//! relation wrapping the previous query as a subquery; nothing runs until
//! a fetch, count, export or materialisation method is called.
//!
//! Joins validate their column arguments up front so that mistakes are
//! reported with the offending names instead of an engine binder error.

use crate::database::Database;
use crate::sql::{quote_ident, quote_literal, quote_qualified, validate_expression, validate_order};
use crate::value::QueryResult;
use crate::{Error, Result, Side};
use duckdb::arrow::record_batch::RecordBatch;
use rustc_hash::FxHashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Name and engine type of one relation column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: String,
}

impl Column {
    /// Create a column description
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Column name as reported by the engine
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Engine type name, e.g. `INTEGER` or `TIMESTAMP`
    #[must_use]
    pub fn data_type(&self) -> &str {
        &self.data_type
    }
}

/// How [`Relation::using_join`] combines rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Matching rows only
    Inner,
    /// All rows from both sides (alias of [`JoinKind::Full`])
    Outer,
    /// All left rows
    Left,
    /// All right rows
    Right,
    /// All rows from both sides
    Full,
    /// Left rows with a match, left columns only
    Semi,
    /// Left rows without a match, left columns only
    Anti,
    /// Inner join on every shared column
    Natural,
    /// Left join on every shared column
    NaturalLeft,
    /// Right join on every shared column
    NaturalRight,
    /// Full join on every shared column
    NaturalFull,
    /// Semi join on every shared column
    NaturalSemi,
    /// Anti join on every shared column
    NaturalAnti,
}

impl JoinKind {
    /// True for the natural variants, which infer their join columns
    #[must_use]
    pub const fn is_natural(self) -> bool {
        matches!(
            self,
            Self::Natural
                | Self::NaturalLeft
                | Self::NaturalRight
                | Self::NaturalFull
                | Self::NaturalSemi
                | Self::NaturalAnti
        )
    }

    /// Join keyword emitted for this kind
    const fn keyword(self) -> &'static str {
        match self {
            Self::Inner | Self::Natural => "INNER JOIN",
            Self::Left | Self::NaturalLeft => "LEFT JOIN",
            Self::Right | Self::NaturalRight => "RIGHT JOIN",
            Self::Outer | Self::Full | Self::NaturalFull => "FULL OUTER JOIN",
            Self::Semi | Self::NaturalSemi => "SEMI JOIN",
            Self::Anti | Self::NaturalAnti => "ANTI JOIN",
        }
    }
}

impl FromStr for JoinKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(match normalized.to_ascii_lowercase().as_str() {
            "inner" => Self::Inner,
            "outer" => Self::Outer,
            "left" => Self::Left,
            "right" => Self::Right,
            "full" => Self::Full,
            "semi" => Self::Semi,
            "anti" => Self::Anti,
            "natural" => Self::Natural,
            "natural left" => Self::NaturalLeft,
            "natural right" => Self::NaturalRight,
            "natural full" | "natural outer" => Self::NaturalFull,
            "natural semi" => Self::NaturalSemi,
            "natural anti" => Self::NaturalAnti,
            _ => return Err(Error::UnsupportedJoin(s.to_string())),
        })
    }
}

/// Which right row an ASOF join pairs with each left row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsofDirection {
    /// Latest right row at or before the left key (`left >= right`)
    #[default]
    Backward,
    /// Earliest right row at or after the left key (`left <= right`)
    Forward,
    /// Right row with the smallest distance to the left key
    Nearest,
}

impl FromStr for AsofDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backward" | ">=" => Ok(Self::Backward),
            "forward" | "<=" => Ok(Self::Forward),
            "nearest" => Ok(Self::Nearest),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid direction: {s}. Must be 'backward', 'forward', or 'nearest'."
            ))),
        }
    }
}

/// Export format for [`Relation::write_csv`] / [`Relation::write_parquet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyFormat {
    Csv { header: bool },
    Parquet,
}

/// A named query bound to a [`Database`]
#[derive(Debug, Clone)]
pub struct Relation<'db> {
    db: &'db Database,
    query: String,
    alias: String,
    columns: Vec<Column>,
}

impl<'db> Relation<'db> {
    /// Describe `query` and wrap it as a relation.
    pub(crate) fn from_query(db: &'db Database, query: String, alias: String) -> Result<Self> {
        let columns = db.describe(&query)?;
        Ok(Self {
            db,
            query,
            alias,
            columns,
        })
    }

    /// Same database, new query; caller supplies the resulting columns.
    fn derive(&self, query: String, alias: String, columns: Vec<Column>) -> Self {
        Self {
            db: self.db,
            query,
            alias,
            columns,
        }
    }

    /// `(<query>) AS "<alias>"`, usable in a FROM clause
    fn as_subquery(&self) -> String {
        format!("({}\n) AS {}", self.query, quote_ident(&self.alias))
    }

    /// Database this relation reads from
    #[must_use]
    pub const fn database(&self) -> &'db Database {
        self.db
    }

    /// Alias used when the relation appears in a FROM clause
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// SELECT statement that produces this relation
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Columns with their engine types
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    fn lowered_names(&self) -> FxHashSet<String> {
        self.columns
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect()
    }

    fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Same relation under a different alias.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for an empty alias
    pub fn with_alias(&self, alias: &str) -> Result<Self> {
        if alias.trim().is_empty() {
            return Err(Error::InvalidArgument("alias must not be empty".to_string()));
        }
        Ok(self.derive(self.query.clone(), alias.to_string(), self.columns.clone()))
    }

    /// Rows for which `predicate` holds.
    ///
    /// # Errors
    /// Returns [`Error::ParseError`] if `predicate` is not a single expression
    pub fn filter(&self, predicate: &str) -> Result<Self> {
        validate_expression(predicate)?;
        let query = format!("SELECT * FROM {} WHERE {predicate}\n", self.as_subquery());
        Ok(self.derive(query, self.alias.clone(), self.columns.clone()))
    }

    /// Rows sorted by `order` (anything valid after `ORDER BY`).
    ///
    /// # Errors
    /// Returns [`Error::ParseError`] if `order` does not parse
    pub fn order_by(&self, order: &str) -> Result<Self> {
        validate_order(order)?;
        let query = format!("SELECT * FROM {} ORDER BY {order}\n", self.as_subquery());
        Ok(self.derive(query, self.alias.clone(), self.columns.clone()))
    }

    /// Keep only the named columns, in the given order.
    ///
    /// # Errors
    /// Returns [`Error::UnknownColumns`] naming every column that does not exist
    pub fn project(&self, columns: &[&str]) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::InvalidArgument(
                "project needs at least one column".to_string(),
            ));
        }
        let mut kept = Vec::with_capacity(columns.len());
        let mut unknown = Vec::new();
        for name in columns {
            match self.find_column(name) {
                Some(col) => kept.push(col.clone()),
                None => unknown.push((*name).to_string()),
            }
        }
        if !unknown.is_empty() {
            return Err(Error::UnknownColumns {
                target: self.alias.clone(),
                columns: unknown,
            });
        }

        let select = kept
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!("SELECT {select} FROM {}", self.as_subquery());
        Ok(self.derive(query, self.alias.clone(), kept))
    }

    /// First `n` rows
    #[must_use]
    pub fn limit(&self, n: usize) -> Self {
        let query = format!("SELECT * FROM {} LIMIT {n}", self.as_subquery());
        self.derive(query, self.alias.clone(), self.columns.clone())
    }

    /// Execute and collect every row.
    ///
    /// # Errors
    /// Returns the engine error if execution fails
    pub fn fetch_all(&self) -> Result<QueryResult> {
        self.db.query(&self.query, &[])
    }

    /// Execute and return Arrow record batches.
    ///
    /// # Errors
    /// Returns the engine error if execution fails
    pub fn to_arrow(&self) -> Result<Vec<RecordBatch>> {
        self.db.query_arrow(&self.query)
    }

    /// Number of rows the relation produces.
    ///
    /// # Errors
    /// Returns the engine error if execution fails, or
    /// [`Error::UnexpectedResult`] if the engine does not answer with one
    /// non-negative integer
    pub fn count(&self) -> Result<u64> {
        let result = self.db.query(
            &format!("SELECT count(*) FROM {}", self.as_subquery()),
            &[],
        )?;
        single_count(&result)
    }

    /// Materialise into a new table (`replace` overwrites an existing one).
    ///
    /// # Errors
    /// Returns the engine error, e.g. when the table exists and `replace` is false
    pub fn create_table(&self, table: &str, replace: bool) -> Result<Relation<'db>> {
        let verb = if replace {
            "CREATE OR REPLACE TABLE"
        } else {
            "CREATE TABLE"
        };
        self.db.execute_batch(&format!(
            "{verb} {} AS {}\n",
            quote_qualified(table),
            self.query
        ))?;
        self.db.table(table)
    }

    /// Append all rows into an existing table (matched by position).
    ///
    /// # Errors
    /// Returns the engine error if the table is missing or the shapes differ
    pub fn insert_into(&self, table: &str) -> Result<usize> {
        self.db.execute(
            &format!(
                "INSERT INTO {} SELECT * FROM {}",
                quote_qualified(table),
                self.as_subquery()
            ),
            &[],
        )
    }

    /// Write the rows to a CSV file.
    ///
    /// # Errors
    /// Returns the engine error if the file cannot be written
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, header: bool) -> Result<()> {
        self.copy_to(path.as_ref(), CopyFormat::Csv { header })
    }

    /// Write the rows to a Parquet file.
    ///
    /// # Errors
    /// Returns the engine error if the file cannot be written
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.copy_to(path.as_ref(), CopyFormat::Parquet)
    }

    fn copy_to(&self, path: &Path, format: CopyFormat) -> Result<()> {
        let options = match format {
            CopyFormat::Csv { header } => format!("FORMAT CSV, HEADER {header}"),
            CopyFormat::Parquet => "FORMAT PARQUET".to_string(),
        };
        self.db.execute_batch(&format!(
            "COPY ({}\n) TO {} ({options})",
            self.query,
            quote_literal(&path.to_string_lossy())
        ))
    }

    fn ensure_same_database(&self, other: &Self) -> Result<()> {
        if std::ptr::eq(self.db, other.db) {
            Ok(())
        } else {
            Err(Error::InvalidArgument(
                "cannot join relations from different databases".to_string(),
            ))
        }
    }

    /// Join with `other` on named columns (`USING`).
    ///
    /// Natural kinds infer the join columns from the names both relations
    /// share and must not be given any. Other kinds need at least one
    /// column, no duplicates, and every column present on both sides.
    /// Names are matched case-insensitively.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] for a bad column list
    /// - [`Error::NoCommonColumns`] for a natural join without shared columns
    /// - [`Error::MissingJoinColumns`] listing columns absent from either side
    pub fn using_join(
        &self,
        other: &Relation<'db>,
        how: JoinKind,
        using_columns: &[&str],
    ) -> Result<Relation<'db>> {
        self.ensure_same_database(other)?;
        let right_names = other.lowered_names();

        let join_columns: Vec<String> = if how.is_natural() {
            if !using_columns.is_empty() {
                return Err(Error::InvalidArgument(
                    "Do not specify using_columns for natural joins.".to_string(),
                ));
            }
            let common: Vec<String> = self
                .columns
                .iter()
                .filter(|c| right_names.contains(&c.name.to_lowercase()))
                .map(|c| c.name.clone())
                .collect();
            if common.is_empty() {
                return Err(Error::NoCommonColumns);
            }
            common
        } else {
            if using_columns.is_empty() {
                return Err(Error::InvalidArgument(
                    "using_columns must be specified and non-empty unless using a natural join."
                        .to_string(),
                ));
            }
            let mut seen = FxHashSet::default();
            if !using_columns.iter().all(|c| seen.insert(c.to_lowercase())) {
                return Err(Error::InvalidArgument(
                    "Duplicate columns specified in using_columns.".to_string(),
                ));
            }
            let left_names = self.lowered_names();
            let missing = |names: &FxHashSet<String>| -> Vec<String> {
                using_columns
                    .iter()
                    .filter(|c| !names.contains(&c.to_lowercase()))
                    .map(|c| (*c).to_string())
                    .collect()
            };
            let (left, right) = (missing(&left_names), missing(&right_names));
            if !left.is_empty() || !right.is_empty() {
                return Err(Error::MissingJoinColumns { left, right });
            }
            using_columns.iter().map(|c| (*c).to_string()).collect()
        };

        let using = join_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let (left_alias, right_alias) = self.join_aliases(other);
        let query = format!(
            "SELECT * FROM ({}\n) AS {} {} ({}\n) AS {} USING ({using})",
            self.query,
            quote_ident(&left_alias),
            how.keyword(),
            other.query,
            quote_ident(&right_alias),
        );
        Relation::from_query(self.db, query, self.db.next_alias())
    }

    /// Aliases for the two sides of a join; a self-join gets a suffix on
    /// the right so both sides stay addressable.
    fn join_aliases(&self, other: &Self) -> (String, String) {
        if self.alias.eq_ignore_ascii_case(&other.alias) {
            (self.alias.clone(), format!("{}_right", other.alias))
        } else {
            (self.alias.clone(), other.alias.clone())
        }
    }

    /// ASOF join: pair each left row with one right row by the ordered key
    /// `on`, within groups of equal `by` columns.
    ///
    /// The result has all left columns followed by the right columns whose
    /// names do not occur on the left. Left rows without a partner are
    /// dropped.
    ///
    /// # Errors
    /// - [`Error::MissingAlias`] if either relation has an empty alias
    /// - [`Error::InvalidArgument`] if both relations share an alias
    /// - [`Error::ColumnsNotFound`] for `on` / `by` columns missing on a side
    pub fn asof_join(
        &self,
        other: &Relation<'db>,
        on: &str,
        by: &[&str],
        direction: AsofDirection,
    ) -> Result<Relation<'db>> {
        self.ensure_same_database(other)?;
        if self.alias.is_empty() {
            return Err(Error::MissingAlias(Side::Left));
        }
        if other.alias.is_empty() {
            return Err(Error::MissingAlias(Side::Right));
        }
        if self.alias.eq_ignore_ascii_case(&other.alias) {
            return Err(Error::InvalidArgument(format!(
                "both relations are aliased '{}'; rename one with with_alias()",
                self.alias
            )));
        }

        let left_names = self.lowered_names();
        let right_names = other.lowered_names();
        let check = |columns: &[&str]| -> Result<()> {
            for (names, side) in [(&left_names, Side::Left), (&right_names, Side::Right)] {
                let missing: Vec<String> = columns
                    .iter()
                    .filter(|c| !names.contains(&c.to_lowercase()))
                    .map(|c| (*c).to_string())
                    .collect();
                if !missing.is_empty() {
                    return Err(Error::ColumnsNotFound {
                        columns: missing,
                        side,
                    });
                }
            }
            Ok(())
        };
        check(&[on])?;
        check(by)?;

        let l = quote_ident(&self.alias);
        let r = quote_ident(&other.alias);
        let key = quote_ident(on);

        let mut columns = self.columns.clone();
        let mut select: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{l}.{0} AS {0}", quote_ident(&c.name)))
            .collect();
        for col in &other.columns {
            if !left_names.contains(&col.name.to_lowercase()) {
                select.push(format!("{r}.{0} AS {0}", quote_ident(&col.name)));
                columns.push(col.clone());
            }
        }
        let select = select.join(", ");

        let mut conditions: Vec<String> = by
            .iter()
            .map(|c| format!("{l}.{0} = {r}.{0}", quote_ident(c)))
            .collect();

        let query = match direction {
            AsofDirection::Backward | AsofDirection::Forward => {
                let op = if direction == AsofDirection::Backward {
                    ">="
                } else {
                    "<="
                };
                conditions.push(format!("{l}.{key} {op} {r}.{key}"));
                format!(
                    "SELECT {select} FROM {} ASOF JOIN {} ON {}",
                    self.as_subquery(),
                    other.as_subquery(),
                    conditions.join(" AND ")
                )
            }
            AsofDirection::Nearest => {
                let row_id = quote_ident("__duck_plus_row");
                let on_clause = if conditions.is_empty() {
                    "TRUE".to_string()
                } else {
                    conditions.join(" AND ")
                };
                format!(
                    "SELECT {select} FROM (SELECT *, row_number() OVER () AS {row_id} FROM ({}\n)) AS {l} \
                     INNER JOIN {} ON {on_clause} \
                     QUALIFY row_number() OVER (PARTITION BY {l}.{row_id} \
                     ORDER BY greatest({l}.{key}, {r}.{key}) - least({l}.{key}, {r}.{key}), {r}.{key}) = 1",
                    self.query,
                    other.as_subquery(),
                )
            }
        };

        Ok(self.derive(query, self.db.next_alias(), columns))
    }
}

impl fmt::Display for Relation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Relation(source={}, columns={:?})",
            self.db.path(),
            self.column_names()
        )
    }
}

/// The value of a one-row, one-column `count(*)` result
fn single_count(result: &QueryResult) -> Result<u64> {
    match result.rows() {
        [row] => match row.as_slice() {
            [value] => value
                .as_i64()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| Error::UnexpectedResult(format!("count returned {value:?}"))),
            _ => Err(Error::UnexpectedResult(format!(
                "count returned {} columns",
                row.len()
            ))),
        },
        rows => Err(Error::UnexpectedResult(format!(
            "count returned {} rows",
            rows.len()
        ))),
    }
}
