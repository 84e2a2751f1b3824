//! Basic duck-plus usage: loading, joining and inserting
//!
//! This example demonstrates:
//! - Opening an in-memory database through the builder
//! - Bulk inserting rows keyed by column name
//! - Validated USING and ASOF joins
//! - Exporting a relation to CSV and reading it back as a file entry
//!
//! Run with: RUST_LOG=duck_plus=debug cargo run --example basic_usage

use anyhow::Context;
use duck_plus::{
    AsofDirection, Database, FileEntryRelation, JoinKind, Result as DuckResult, Row, Value,
};
use tracing_subscriber::EnvFilter;

fn trade(sym: &str, ts: &str, qty: i64) -> Row {
    Row::from([
        ("sym".to_string(), Value::from(sym)),
        ("ts".to_string(), Value::from(ts)),
        ("qty".to_string(), Value::from(qty)),
    ])
}

fn large_trades(entry: FileEntryRelation<'_>) -> DuckResult<FileEntryRelation<'_>> {
    entry.map_relation(|rel| rel.filter("qty >= 100"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== duck-plus Basic Usage Example ===\n");

    let db = Database::builder().threads(2).build()?;
    db.execute_batch(
        "CREATE TABLE trades (sym VARCHAR, ts TIMESTAMP, qty BIGINT);
         CREATE TABLE quotes (sym VARCHAR, ts TIMESTAMP, bid DOUBLE);
         INSERT INTO quotes VALUES
             ('ACME', '2024-03-01 09:30:00', 10.0),
             ('ACME', '2024-03-01 09:31:00', 10.5),
             ('INIT', '2024-03-01 09:30:30', 42.0);",
    )?;

    // Bulk insert
    let inserted = db.insert_rows(
        "trades",
        &[
            trade("ACME", "2024-03-01 09:30:10", 50),
            trade("ACME", "2024-03-01 09:31:05", 200),
            trade("INIT", "2024-03-01 09:30:45", 120),
        ],
    )?;
    println!("Inserted {inserted} trades");

    let trades = db.table("trades")?;
    let quotes = db.table("quotes")?;
    println!("  {trades}");
    println!("  {quotes}\n");

    // ASOF: latest quote at or before each trade
    let priced = trades.asof_join(&quotes, "ts", &["sym"], AsofDirection::Backward)?;
    println!("Trades priced by latest quote:");
    let result = priced.order_by("ts")?.fetch_all()?;
    println!("{}", serde_json::to_string_pretty(&result.to_json())?);

    // USING: symbols that have quotes
    let quoted = trades.using_join(&quotes, JoinKind::Semi, &["sym"])?;
    println!("\nTrades with quotes: {}", quoted.count()?);

    // Validation errors name the offending columns
    if let Err(e) = trades.using_join(&quotes, JoinKind::Inner, &["price"]) {
        println!("Expected error: {e}");
    }

    // Round trip through a CSV file with a transform log
    let dir = std::env::temp_dir().join("duck_plus_demo");
    std::fs::create_dir_all(&dir).context("creating demo directory")?;
    let csv = dir.join("priced.csv");
    priced.write_csv(&csv, true)?;

    let entry = FileEntryRelation::open(&db, &csv)?.apply_transform(large_trades, "large", false)?;
    println!("\n{entry}");
    println!("Large trades: {}", entry.relation().count()?);

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}
