// Import entrypoint: ingest one ACH file into the local database.
//
// Usage: ach-ingest <ach-file> [db-path] [file-id]

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::Path;

use ach_ingest::{ingest_file, register_file, setup_database};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: ach-ingest <ach-file> [db-path] [file-id]");
    }

    let file_path = Path::new(&args[1]);
    let db_path = args.get(2).map(String::as_str).unwrap_or("ach_ingest.db");
    let file_id: i64 = match args.get(3) {
        Some(raw) => raw.parse().context("file-id must be an integer")?,
        None => 1,
    };

    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;

    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path))?;
    setup_database(&conn)?;

    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.display().to_string());
    register_file(&conn, file_id, &file_name)?;

    let result = ingest_file(&mut conn, file_id, &content)?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.structural {
        println!(
            "✓ Ingested {}: {} batches, {} entries, {} reconciliation warnings",
            file_name,
            result.batch_count,
            result.entry_count,
            result.reconciliation_warnings.len()
        );
    } else {
        println!(
            "✗ Parse failed for {}: {} (audit trail retained)",
            file_name,
            result.fatal_error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}
