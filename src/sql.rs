//! SQL text helpers
//!
//! Quoting for identifiers and string literals, plus parser-backed checks
//! for the fragments callers hand to [`Relation`](crate::relation::Relation)
//! methods. Every fragment is embedded inside a larger statement, so it
//! must parse as exactly one expression with nothing after it.

use crate::{Error, Result};
use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Location, Token, Tokenizer};

/// Quote an identifier with double quotes, doubling embedded quotes.
///
/// ```
/// use duck_plus::sql::quote_ident;
///
/// assert_eq!(quote_ident("ts"), r#""ts""#);
/// assert_eq!(quote_ident(r#"a"b"#), r#""a""b""#);
/// ```
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified name (`schema.table`) part by part.
#[must_use]
pub fn quote_qualified(name: &str) -> String {
    name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

/// Quote a string literal with single quotes, doubling embedded quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Split `schema.table` into `(Some(schema), table)`.
pub(crate) fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    }
}

/// Check that `expr` is a single boolean/scalar expression usable in a
/// `WHERE` clause.
///
/// # Errors
/// Returns [`Error::ParseError`] if the fragment does not parse, or if
/// anything follows the expression (`UNION`, `LIMIT`, a second statement).
pub fn validate_expression(expr: &str) -> Result<()> {
    if expr.trim().is_empty() {
        return Err(Error::ParseError("empty expression".to_string()));
    }
    parse_whole(expr, |parser| parser.parse_expr().map(drop))
}

/// Check that `expr` is usable as an `ORDER BY` list.
///
/// # Errors
/// Returns [`Error::ParseError`] if the fragment does not parse, or if
/// anything follows the list.
pub fn validate_order(expr: &str) -> Result<()> {
    if expr.trim().is_empty() {
        return Err(Error::ParseError("empty ORDER BY expression".to_string()));
    }
    parse_whole(expr, |parser| {
        parser
            .parse_comma_separated(Parser::parse_order_by_expr)
            .map(drop)
    })
}

/// Run `parse` over `fragment` and require it to consume every token.
fn parse_whole<F>(fragment: &str, parse: F) -> Result<()>
where
    F: FnOnce(&mut Parser<'_>) -> std::result::Result<(), ParserError>,
{
    let err = |e: ParserError| Error::ParseError(format!("'{fragment}': {e}"));
    let mut parser = Parser::new(&DuckDbDialect {})
        .try_with_sql(fragment)
        .map_err(err)?;
    parse(&mut parser).map_err(err)?;

    match parser.peek_token().token {
        Token::EOF => Ok(()),
        trailing => Err(Error::ParseError(format!(
            "'{fragment}' must be a single expression, found trailing '{trailing}'"
        ))),
    }
}

/// Drop a trailing statement terminator, along with any comments around it.
///
/// Text that does not tokenize is only trimmed.
pub(crate) fn strip_terminator(sql: &str) -> &str {
    let fallback = || sql.trim().trim_end_matches(';').trim_end();
    let Ok(tokens) = Tokenizer::new(&DuckDbDialect {}, sql).tokenize_with_location() else {
        return fallback();
    };

    let terminator = tokens
        .iter()
        .rev()
        .take_while(|t| matches!(t.token, Token::Whitespace(_) | Token::SemiColon))
        .filter(|t| t.token == Token::SemiColon)
        .last();

    match terminator.and_then(|t| byte_offset(sql, t.location)) {
        Some(end) => sql[..end].trim(),
        None => sql.trim(),
    }
}

fn byte_offset(sql: &str, location: Location) -> Option<usize> {
    let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
    let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
    let line_start: usize = sql.split_inclusive('\n').take(line).map(str::len).sum();
    sql.get(line_start..)?
        .char_indices()
        .nth(column)
        .map(|(i, _)| line_start + i)
}

/// Check text that backs a relation.
///
/// Text the generic parser understands must be exactly one query. DuckDB
/// accepts syntax the parser does not (`FROM tbl SELECT ...`, `PIVOT`), so
/// a parse failure is not an error here; the engine has the final word.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] for multiple statements or for
/// statements that are not queries.
pub fn ensure_query(sql: &str) -> Result<()> {
    let statements = match Parser::parse_sql(&DuckDbDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => {
            tracing::debug!(error = %e, "deferring query validation to the engine");
            return Ok(());
        }
    };

    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        [_] => Err(Error::InvalidArgument(
            "only queries can back a relation".to_string(),
        )),
        _ => Err(Error::InvalidArgument(format!(
            "expected a single query, got {} statements",
            statements.len()
        ))),
    }
}
