// SQLite persistence - schema setup plus the per-file replace orchestrator.
// A file's structural rows are always fully consistent with its latest parse
// or fully absent; the raw line audit trail survives either way.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::parser::{ParseResult, ParsedFile, RawLine};
use crate::reconciliation::{ReconciliationReport, ReconciliationWarning};

/// Child tables owned by one file, in delete order.
const FILE_CHILD_TABLES: [&str; 7] = [
    "ach_file_lines",
    "ach_file_headers",
    "ach_batch_headers",
    "ach_entry_details",
    "ach_addenda",
    "ach_batch_controls",
    "ach_file_controls",
];

// ============================================================================
// FILE PROCESSING STATUS
// ============================================================================

/// Externally visible lifecycle of a registered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileStatus {
    Pending,
    Processed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "Pending",
            FileStatus::Processed => "Processed",
            FileStatus::Failed => "Failed",
        }
    }
}

// ============================================================================
// PERSIST RESULT
// ============================================================================

/// One result object per file: distinguishes "parsed with warnings" from
/// "parse failed" from "storage failed" (the last arrives as an `Err`).
#[derive(Debug, Clone, Serialize)]
pub struct PersistResult {
    pub file_id: i64,
    pub structural: bool,
    pub batch_count: u32,
    pub entry_count: u32,
    pub reconciliation_warnings: Vec<ReconciliationWarning>,
    pub fatal_error: Option<String>,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; busy timeout bounds waiting on a concurrent
    // persistence attempt (callers may override with their own deadline).
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ach_files (
            file_id INTEGER PRIMARY KEY,
            file_name TEXT,
            processing_status TEXT NOT NULL DEFAULT 'Pending',
            created_date TEXT,
            updated_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ach_file_lines (
            file_lines_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            line_number INTEGER NOT NULL,
            line_content TEXT NOT NULL,
            record_type_code TEXT,
            line_errors TEXT,
            created_date TEXT,
            UNIQUE(file_id, line_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ach_file_headers (
            file_header_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            priority_code TEXT,
            immediate_destination TEXT,
            immediate_origin TEXT,
            file_creation_date TEXT,
            file_creation_time TEXT,
            file_id_modifier TEXT,
            record_size TEXT,
            blocking_factor TEXT,
            format_code TEXT,
            immediate_dest_name TEXT,
            immediate_origin_name TEXT,
            reference_code TEXT,
            raw_record TEXT,
            created_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ach_batch_headers (
            batch_header_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            batch_number INTEGER NOT NULL,
            service_class_code TEXT,
            company_name TEXT,
            company_discretionary_data TEXT,
            company_identification TEXT,
            standard_entry_class_code TEXT,
            company_entry_description TEXT,
            company_descriptive_date TEXT,
            effective_entry_date TEXT,
            settlement_date TEXT,
            originator_status_code TEXT,
            originating_dfi_id TEXT,
            raw_record TEXT,
            created_date TEXT,
            UNIQUE(file_id, batch_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ach_entry_details (
            entry_detail_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            batch_number INTEGER NOT NULL,
            transaction_code TEXT,
            receiving_dfi_id TEXT,
            check_digit TEXT,
            dfi_account_number TEXT,
            amount INTEGER NOT NULL DEFAULT 0,
            amount_decimal REAL,
            individual_id_number TEXT,
            individual_name TEXT,
            discretionary_data TEXT,
            addenda_record_indicator TEXT,
            trace_number TEXT,
            trace_sequence_number INTEGER,
            raw_record TEXT,
            created_date TEXT,
            UNIQUE(file_id, batch_number, trace_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ach_addenda (
            addenda_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            batch_number INTEGER NOT NULL,
            entry_trace_number TEXT,
            addenda_type_code TEXT,
            payment_related_info TEXT,
            addenda_sequence_number INTEGER,
            entry_detail_sequence_num INTEGER,
            raw_record TEXT,
            created_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ach_batch_controls (
            batch_control_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            batch_number INTEGER NOT NULL,
            service_class_code TEXT,
            entry_addenda_count INTEGER,
            entry_hash TEXT,
            total_debit_amount INTEGER NOT NULL DEFAULT 0,
            total_debit_amount_decimal REAL,
            total_credit_amount INTEGER NOT NULL DEFAULT 0,
            total_credit_amount_decimal REAL,
            company_identification TEXT,
            message_auth_code TEXT,
            reserved TEXT,
            originating_dfi_id TEXT,
            reconciliation_notes TEXT,
            raw_record TEXT,
            created_date TEXT,
            UNIQUE(file_id, batch_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ach_file_controls (
            file_control_id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            batch_count INTEGER,
            block_count INTEGER,
            entry_addenda_count INTEGER,
            entry_hash TEXT,
            total_debit_amount INTEGER NOT NULL DEFAULT 0,
            total_debit_amount_decimal REAL,
            total_credit_amount INTEGER NOT NULL DEFAULT 0,
            total_credit_amount_decimal REAL,
            reserved TEXT,
            reconciliation_notes TEXT,
            raw_record TEXT,
            created_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_file_lines_file ON ach_file_lines(file_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entry_details_file_batch
         ON ach_entry_details(file_id, batch_number)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_addenda_file_batch
         ON ach_addenda(file_id, batch_number)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// FILE REGISTRY
// ============================================================================

/// Register a file in the root table. Safe to call again for reprocessing;
/// the existing row (and its status history) is kept.
pub fn register_file(conn: &Connection, file_id: i64, file_name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO ach_files (file_id, file_name, processing_status, created_date)
         VALUES (?1, ?2, 'Pending', ?3)",
        params![file_id, file_name, Utc::now().to_rfc3339()],
    )
    .context("Failed to register file")?;
    Ok(())
}

pub fn update_processing_status(
    conn: &Connection,
    file_id: i64,
    status: FileStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE ach_files SET processing_status = ?1, updated_date = ?2 WHERE file_id = ?3",
        params![status.as_str(), Utc::now().to_rfc3339(), file_id],
    )
    .context("Failed to update processing status")?;
    Ok(())
}

pub fn get_processing_status(conn: &Connection, file_id: i64) -> Result<Option<String>> {
    let mut stmt =
        conn.prepare("SELECT processing_status FROM ach_files WHERE file_id = ?1")?;
    let mut rows = stmt.query(params![file_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

// ============================================================================
// PERSISTENCE ORCHESTRATOR
// ============================================================================

/// Atomically replace everything previously stored for `file_id` with the
/// outcome of this parse attempt.
///
/// Raw lines persist regardless of parse outcome; structural rows persist
/// only when the parse succeeded. Any insert failure rolls the whole
/// transaction back, so partial structural state is never visible. The
/// immediate transaction takes the write lock up front, serializing
/// concurrent persistence attempts for the same store.
pub fn persist_file(
    conn: &mut Connection,
    file_id: i64,
    parse: &ParseResult,
    report: Option<&ReconciliationReport>,
) -> Result<PersistResult> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to open persistence transaction")?;

    // Idempotent reprocessing: clear every prior row for this file first.
    let mut deleted = 0usize;
    for table in FILE_CHILD_TABLES {
        deleted += tx
            .execute(
                &format!("DELETE FROM {} WHERE file_id = ?1", table),
                params![file_id],
            )
            .with_context(|| format!("Failed to clear {} for file {}", table, file_id))?;
    }
    if deleted > 0 {
        info!(file_id, deleted, "cleared previously persisted rows");
    }

    insert_raw_lines(&tx, file_id, &parse.raw_lines)?;

    let result = match &parse.structure {
        Ok(file) => {
            insert_structure(&tx, file_id, file, report)?;
            PersistResult {
                file_id,
                structural: true,
                batch_count: file.batches.len() as u32,
                entry_count: file.entry_count() as u32,
                reconciliation_warnings: report
                    .map(|r| r.warnings.clone())
                    .unwrap_or_default(),
                fatal_error: None,
            }
        }
        Err(err) => PersistResult {
            file_id,
            structural: false,
            batch_count: 0,
            entry_count: 0,
            reconciliation_warnings: Vec::new(),
            fatal_error: Some(err.to_string()),
        },
    };

    tx.commit().context("Failed to commit persistence transaction")?;

    info!(
        file_id,
        structural = result.structural,
        raw_lines = parse.raw_lines.len(),
        batches = result.batch_count,
        entries = result.entry_count,
        warnings = result.reconciliation_warnings.len(),
        "persisted file"
    );
    Ok(result)
}

fn join_errors(errors: &[String]) -> Option<String> {
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

fn join_warnings(warnings: &[&ReconciliationWarning]) -> Option<String> {
    if warnings.is_empty() {
        None
    } else {
        Some(
            warnings
                .iter()
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Display form of an integer-cents amount. Derived column only; arithmetic
/// and comparisons always use the cents value.
fn cents_to_decimal(cents: u64) -> f64 {
    cents as f64 / 100.0
}

fn insert_raw_lines(tx: &rusqlite::Transaction<'_>, file_id: i64, lines: &[RawLine]) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = tx
        .prepare(
            "INSERT INTO ach_file_lines (
                file_id, line_number, line_content, record_type_code, line_errors, created_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .context("Failed to prepare raw line insert")?;

    for line in lines {
        stmt.execute(params![
            file_id,
            line.line_number as i64,
            line.content,
            line.record_type_char.to_string(),
            join_errors(&line.errors),
            now,
        ])
        .with_context(|| format!("Failed to insert raw line {}", line.line_number))?;
    }
    Ok(())
}

fn insert_structure(
    tx: &rusqlite::Transaction<'_>,
    file_id: i64,
    file: &ParsedFile,
    report: Option<&ReconciliationReport>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    let h = &file.header;
    tx.execute(
        "INSERT INTO ach_file_headers (
            file_id, priority_code, immediate_destination, immediate_origin,
            file_creation_date, file_creation_time, file_id_modifier, record_size,
            blocking_factor, format_code, immediate_dest_name, immediate_origin_name,
            reference_code, raw_record, created_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            file_id,
            h.priority_code,
            h.immediate_destination,
            h.immediate_origin,
            h.file_creation_date,
            h.file_creation_time,
            h.file_id_modifier,
            h.record_size,
            h.blocking_factor,
            h.format_code,
            h.immediate_dest_name,
            h.immediate_origin_name,
            h.reference_code,
            h.raw_record,
            now,
        ],
    )
    .context("Failed to insert file header")?;

    let mut entry_stmt = tx.prepare(
        "INSERT INTO ach_entry_details (
            file_id, batch_number, transaction_code, receiving_dfi_id, check_digit,
            dfi_account_number, amount, amount_decimal, individual_id_number,
            individual_name, discretionary_data, addenda_record_indicator,
            trace_number, trace_sequence_number, raw_record, created_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    )?;
    let mut addenda_stmt = tx.prepare(
        "INSERT INTO ach_addenda (
            file_id, batch_number, entry_trace_number, addenda_type_code,
            payment_related_info, addenda_sequence_number, entry_detail_sequence_num,
            raw_record, created_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    for batch in &file.batches {
        let bh = &batch.header;
        tx.execute(
            "INSERT INTO ach_batch_headers (
                file_id, batch_number, service_class_code, company_name,
                company_discretionary_data, company_identification,
                standard_entry_class_code, company_entry_description,
                company_descriptive_date, effective_entry_date, settlement_date,
                originator_status_code, originating_dfi_id, raw_record, created_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                file_id,
                batch.batch_number,
                bh.service_class_code,
                bh.company_name,
                bh.company_discretionary_data,
                bh.company_identification,
                bh.standard_entry_class_code,
                bh.company_entry_description,
                bh.company_descriptive_date,
                bh.effective_entry_date,
                bh.settlement_date,
                bh.originator_status_code,
                bh.originating_dfi_id,
                bh.raw_record,
                now,
            ],
        )
        .with_context(|| format!("Failed to insert batch header {}", batch.batch_number))?;

        for entry in &batch.entries {
            let d = &entry.detail;
            entry_stmt
                .execute(params![
                    file_id,
                    batch.batch_number,
                    d.transaction_code,
                    d.receiving_dfi_id,
                    d.check_digit,
                    d.dfi_account_number,
                    d.amount as i64,
                    cents_to_decimal(d.amount),
                    d.individual_id_number,
                    d.individual_name,
                    d.discretionary_data,
                    d.addenda_record_indicator,
                    d.trace_number,
                    d.trace_sequence_number,
                    d.raw_record,
                    now,
                ])
                .with_context(|| format!("Failed to insert entry {}", d.trace_number))?;

            for addenda in &entry.addenda {
                addenda_stmt
                    .execute(params![
                        file_id,
                        batch.batch_number,
                        d.trace_number,
                        addenda.addenda_type_code,
                        addenda.payment_related_info,
                        addenda.addenda_sequence_number,
                        addenda.entry_detail_sequence_num,
                        addenda.raw_record,
                        now,
                    ])
                    .with_context(|| {
                        format!("Failed to insert addenda for entry {}", d.trace_number)
                    })?;
            }
        }

        let c = &batch.control;
        let notes = report.map(|r| r.warnings_for_batch(batch.batch_number));
        tx.execute(
            "INSERT INTO ach_batch_controls (
                file_id, batch_number, service_class_code, entry_addenda_count,
                entry_hash, total_debit_amount, total_debit_amount_decimal,
                total_credit_amount, total_credit_amount_decimal,
                company_identification, message_auth_code, reserved,
                originating_dfi_id, reconciliation_notes, raw_record, created_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                file_id,
                batch.batch_number,
                c.service_class_code,
                c.entry_addenda_count,
                c.entry_hash,
                c.total_debit_amount as i64,
                cents_to_decimal(c.total_debit_amount),
                c.total_credit_amount as i64,
                cents_to_decimal(c.total_credit_amount),
                c.company_identification,
                c.message_auth_code,
                c.reserved,
                c.originating_dfi_id,
                notes.as_deref().and_then(join_warnings),
                c.raw_record,
                now,
            ],
        )
        .with_context(|| format!("Failed to insert batch control {}", batch.batch_number))?;
    }

    let fc = &file.control;
    let file_notes = report.map(|r| r.file_warnings());
    tx.execute(
        "INSERT INTO ach_file_controls (
            file_id, batch_count, block_count, entry_addenda_count, entry_hash,
            total_debit_amount, total_debit_amount_decimal,
            total_credit_amount, total_credit_amount_decimal,
            reserved, reconciliation_notes, raw_record, created_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            file_id,
            fc.batch_count,
            fc.block_count,
            fc.entry_addenda_count,
            fc.entry_hash,
            fc.total_debit_amount as i64,
            cents_to_decimal(fc.total_debit_amount),
            fc.total_credit_amount as i64,
            cents_to_decimal(fc.total_credit_amount),
            fc.reserved,
            file_notes.as_deref().and_then(join_warnings),
            fc.raw_record,
            now,
        ],
    )
    .context("Failed to insert file control")?;

    Ok(())
}

// ============================================================================
// QUERIES
// ============================================================================

/// Row count in one of the per-file tables. Table names are fixed at compile
/// time by the callers below.
fn count_for_file(conn: &Connection, table: &str, file_id: i64) -> Result<i64> {
    debug_assert!(FILE_CHILD_TABLES.contains(&table));
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE file_id = ?1", table),
        params![file_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn raw_line_count(conn: &Connection, file_id: i64) -> Result<i64> {
    count_for_file(conn, "ach_file_lines", file_id)
}

pub fn batch_header_count(conn: &Connection, file_id: i64) -> Result<i64> {
    count_for_file(conn, "ach_batch_headers", file_id)
}

pub fn entry_detail_count(conn: &Connection, file_id: i64) -> Result<i64> {
    count_for_file(conn, "ach_entry_details", file_id)
}

pub fn addenda_count(conn: &Connection, file_id: i64) -> Result<i64> {
    count_for_file(conn, "ach_addenda", file_id)
}

/// Total rows across all six structural tables for a file (excludes the raw
/// line audit trail).
pub fn structural_row_count(conn: &Connection, file_id: i64) -> Result<i64> {
    let mut total = 0;
    for table in FILE_CHILD_TABLES.iter().skip(1) {
        total += count_for_file(conn, table, file_id)?;
    }
    Ok(total)
}

/// One persisted audit-trail line.
#[derive(Debug, Clone)]
pub struct StoredLine {
    pub line_number: i64,
    pub content: String,
    pub record_type_code: String,
    pub errors: Option<String>,
}

pub fn get_raw_lines(conn: &Connection, file_id: i64) -> Result<Vec<StoredLine>> {
    let mut stmt = conn.prepare(
        "SELECT line_number, line_content, record_type_code, line_errors
         FROM ach_file_lines
         WHERE file_id = ?1
         ORDER BY line_number",
    )?;
    let lines = stmt
        .query_map(params![file_id], |row| {
            Ok(StoredLine {
                line_number: row.get(0)?,
                content: row.get(1)?,
                record_type_code: row.get(2)?,
                errors: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines)
}

// ============================================================================
// TESTS
// ============================================================================
