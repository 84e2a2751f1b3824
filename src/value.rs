//! Cell values, rows and query results
//!
//! [`Value`] is the crate's owned cell type. Engine values convert into it
//! losslessly where a natural Rust type exists, and it binds back into the
//! engine as a statement or appender parameter.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use duckdb::types::{TimeUnit, ToSql, ToSqlOutput, Value as EngineValue};
use std::collections::BTreeMap;
use std::fmt;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A row keyed by column name
pub type Row = BTreeMap<String, Value>;

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// BOOLEAN
    Boolean(bool),
    /// Any integer that fits in 64 bits
    Integer(i64),
    /// FLOAT, DOUBLE or DECIMAL
    Real(f64),
    /// VARCHAR (and values without a closer Rust type)
    Text(String),
    /// BLOB
    Blob(Vec<u8>),
    /// DATE
    Date(NaiveDate),
    /// TIME
    Time(NaiveTime),
    /// TIMESTAMP (UTC, no zone)
    Timestamp(NaiveDateTime),
    /// LIST / ARRAY
    List(Vec<Value>),
}

impl Value {
    /// True for SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer payload, if any.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric payload widened to f64.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Text payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Timestamp payload, if any.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert a JSON scalar or array into a cell.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for JSON objects and for numbers
    /// outside the i64/f64 range.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Real(f)
                } else {
                    return Err(Error::InvalidArgument(format!(
                        "number {n} does not fit a 64-bit cell"
                    )));
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect::<Result<_>>()?)
            }
            serde_json::Value::Object(_) => {
                return Err(Error::InvalidArgument(
                    "JSON objects cannot be stored in a single cell".to_string(),
                ))
            }
        })
    }

    /// Render as JSON. Temporal values become ISO-8601 strings, blobs
    /// become arrays of bytes.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Boolean(b) => Json::Bool(*b),
            Self::Integer(i) => Json::from(*i),
            Self::Real(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::Text(s) => Json::String(s.clone()),
            Self::Blob(bytes) => Json::from(bytes.clone()),
            Self::Date(d) => Json::String(d.to_string()),
            Self::Time(t) => Json::String(t.to_string()),
            Self::Timestamp(ts) => Json::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

fn micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn timestamp_from_micros(us: i64) -> Value {
    DateTime::from_timestamp_micros(us)
        .map_or_else(|| Value::Integer(us), |dt| Value::Timestamp(dt.naive_utc()))
}

fn date_from_days(days: i32) -> Value {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map_or_else(|| Value::Integer(i64::from(days)), Value::Date)
}

fn time_from_micros(us: i64) -> Value {
    let secs = u32::try_from(us.div_euclid(1_000_000)).ok();
    let nanos = u32::try_from(us.rem_euclid(1_000_000) * 1_000).ok();
    secs.zip(nanos)
        .and_then(|(s, n)| NaiveTime::from_num_seconds_from_midnight_opt(s, n))
        .map_or_else(|| Value::Integer(us), Value::Time)
}

fn wide_integer<T: TryInto<i64> + ToString + Copy>(v: T) -> Value {
    v.try_into()
        .map_or_else(|_| Value::Text(v.to_string()), Value::Integer)
}

impl From<EngineValue> for Value {
    fn from(value: EngineValue) -> Self {
        match value {
            EngineValue::Null => Self::Null,
            EngineValue::Boolean(b) => Self::Boolean(b),
            EngineValue::TinyInt(v) => Self::Integer(v.into()),
            EngineValue::SmallInt(v) => Self::Integer(v.into()),
            EngineValue::Int(v) => Self::Integer(v.into()),
            EngineValue::BigInt(v) => Self::Integer(v),
            EngineValue::HugeInt(v) => wide_integer(v),
            EngineValue::UTinyInt(v) => Self::Integer(v.into()),
            EngineValue::USmallInt(v) => Self::Integer(v.into()),
            EngineValue::UInt(v) => Self::Integer(v.into()),
            EngineValue::UBigInt(v) => wide_integer(v),
            EngineValue::Float(v) => Self::Real(f64::from(v)),
            EngineValue::Double(v) => Self::Real(v),
            EngineValue::Decimal(d) => d
                .to_string()
                .parse::<f64>()
                .map_or_else(|_| Self::Text(d.to_string()), Self::Real),
            EngineValue::Timestamp(unit, v) => timestamp_from_micros(micros(unit, v)),
            EngineValue::Text(s) => Self::Text(s),
            EngineValue::Blob(b) => Self::Blob(b),
            EngineValue::Date32(days) => date_from_days(days),
            EngineValue::Time64(unit, v) => time_from_micros(micros(unit, v)),
            EngineValue::List(items) | EngineValue::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            EngineValue::Enum(s) => Self::Text(s),
            EngineValue::UHugeInt(v) => wide_integer(v),
            EngineValue::Geometry(wkb) => Self::Blob(wkb),
            EngineValue::Interval {
                months,
                days,
                nanos,
            } => Self::Text(interval_text(months, days, nanos)),
            EngineValue::Struct(fields) => {
                let body = fields
                    .iter()
                    .map(|(name, v)| format!("{}: {}", quote_text(name), nested_text(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                Self::Text(format!("{{{body}}}"))
            }
            EngineValue::Map(entries) => {
                let body = entries
                    .iter()
                    .map(|(k, v)| format!("{}={}", nested_text(k), nested_text(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                Self::Text(format!("{{{body}}}"))
            }
            EngineValue::Union(inner) => Self::from(*inner),
            // Variants from newer engine releases
            other => Self::Text(format!("{other:?}")),
        }
    }
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Text of a value nested inside a struct or map; strings are quoted
fn nested_text(value: &EngineValue) -> String {
    match Value::from(value.clone()) {
        Value::Text(s) if matches!(value, EngineValue::Text(_) | EngineValue::Enum(_)) => {
            quote_text(&s)
        }
        other => other.to_string(),
    }
}

/// Interval in the engine's text form, e.g. `1 year 2 months 3 days 04:05:06.5`
fn interval_text(months: i32, days: i32, nanos: i64) -> String {
    fn unit(n: i32, name: &str) -> String {
        if n.abs() == 1 {
            format!("{n} {name}")
        } else {
            format!("{n} {name}s")
        }
    }

    let mut parts = Vec::new();
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "month"));
    }
    if days != 0 {
        parts.push(unit(days, "day"));
    }
    let micros = nanos / 1_000;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3_600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = micros % 1_000_000;
        if frac != 0 {
            clock.push_str(format!(".{frac:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(bytes) => {
                for byte in bytes {
                    write!(f, "\\x{byte:02X}")?;
                }
                Ok(())
            }
            Self::Date(d) => write!(f, "{d}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Timestamp(ts) => write!(f, "{ts}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            Self::Null => EngineValue::Null,
            Self::Boolean(b) => EngineValue::Boolean(*b),
            Self::Integer(i) => EngineValue::BigInt(*i),
            Self::Real(f) => EngineValue::Double(*f),
            Self::Text(s) => EngineValue::Text(s.clone()),
            Self::Blob(b) => EngineValue::Blob(b.clone()),
            // Temporal values bind as ISO text; the engine casts to the column type.
            Self::Date(d) => EngineValue::Text(d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => EngineValue::Text(t.format("%H:%M:%S%.f").to_string()),
            Self::Timestamp(ts) => {
                EngineValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            Self::List(_) => {
                return Err(duckdb::Error::ToSqlConversionFailure(
                    "LIST values cannot be bound as parameters".into(),
                ))
            }
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Integer,
    f32 => Real,
    f64 => Real,
    String => Text,
    &str => Text,
    Vec<u8> => Blob,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Rows returned by [`Database::query`](crate::Database::query)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Create a result from column names and row-major values.
    #[must_use]
    pub const fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Column names in engine order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row-major values
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the query returned no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// All values of one column, or `None` if the column does not exist
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Consume into row tuples
    #[must_use]
    pub fn tuples(self) -> Vec<Vec<Value>> {
        self.rows
    }

    /// Rows keyed by column name.
    ///
    /// When a result has duplicate column names the last one wins.
    #[must_use]
    pub fn records(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Rows as a JSON array of objects
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object: serde_json::Map<String, serde_json::Value> = self
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().map(Value::to_json))
                        .collect();
                    serde_json::Value::Object(object)
                })
                .collect(),
        )
    }
}
