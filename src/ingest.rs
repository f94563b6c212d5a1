// Ingest pipeline: parse -> reconcile -> persist for one file.
// Each call owns its parse state; distinct file ids can run on separate
// workers, and the persistence transaction serializes same-id attempts.

use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{persist_file, update_processing_status, FileStatus, PersistResult};
use crate::parser::FileParser;
use crate::reconciliation::reconcile;

/// Parse a file's text, reconcile its control totals, and atomically replace
/// its persisted representation. A registered file's `processing_status`
/// flips to `Processed` or `Failed` to match the outcome.
///
/// Returns `Ok` for both "parsed with warnings" and "parse failed" (the
/// result object distinguishes them); `Err` means the storage attempt itself
/// failed and was rolled back, leaving the prior persisted state intact.
pub fn ingest_file(conn: &mut Connection, file_id: i64, content: &str) -> Result<PersistResult> {
    let parse = FileParser::parse(content);
    info!(
        file_id,
        lines = parse.raw_lines.len(),
        structural = parse.is_structural(),
        "parsed file"
    );

    let report = match &parse.structure {
        Ok(file) => {
            let report = reconcile(file);
            for warning in &report.warnings {
                warn!(file_id, %warning, "reconciliation mismatch");
            }
            Some(report)
        }
        Err(err) => {
            warn!(file_id, error = %err, "structural parse failed, keeping audit trail only");
            None
        }
    };

    let result = persist_file(conn, file_id, &parse, report.as_ref())?;

    let status = if result.structural {
        FileStatus::Processed
    } else {
        FileStatus::Failed
    };
    update_processing_status(conn, file_id, status)?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        entry_detail_count, get_processing_status, raw_line_count, register_file, setup_database,
        structural_row_count,
    };
    use crate::testfile::{
        addenda_line, batch_control_line, batch_header_line, entry_line, file_control_line,
        file_header_line, single_batch_file,
    };

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn clean_file_round_trips_through_pipeline() {
        let mut conn = test_conn();
        // one $100.00 debit, declared totals match exactly
        let content = single_batch_file(&[entry_line("27", 10000, "076401250000001")], 1, 10000, 0);

        let result = ingest_file(&mut conn, 1, &content).unwrap();

        assert!(result.structural);
        assert_eq!(result.batch_count, 1);
        assert_eq!(result.entry_count, 1);
        assert!(result.reconciliation_warnings.is_empty());
    }

    #[test]
    fn multi_batch_file_persists_every_batch() {
        let mut conn = test_conn();
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 1000, "076401250000001"),
            entry_line("27", 2000, "076401250000002"),
            batch_control_line(1, 2, 3000, 0),
            batch_header_line(2),
            entry_line("22", 4000, "076401250000003"),
            addenda_line(1, 3),
            batch_control_line(2, 2, 0, 4000),
            file_control_line(2, 4, 3000, 4000),
        ];

        let result = ingest_file(&mut conn, 2, &lines.join("\n")).unwrap();

        assert!(result.structural);
        assert_eq!(result.batch_count, 2);
        assert_eq!(result.entry_count, 3);
        assert!(result.reconciliation_warnings.is_empty());
        assert_eq!(entry_detail_count(&conn, 2).unwrap(), 3);
    }

    #[test]
    fn sequence_error_keeps_audit_trail_only() {
        let mut conn = test_conn();
        // valid header, garbage discriminator, file control
        let lines = vec![
            file_header_line(),
            format!("2{}", "x".repeat(93)),
            file_control_line(0, 0, 0, 0),
        ];

        let result = ingest_file(&mut conn, 3, &lines.join("\n")).unwrap();

        assert!(!result.structural);
        assert_eq!(result.batch_count, 0);
        assert_eq!(result.entry_count, 0);
        assert!(result
            .fatal_error
            .as_deref()
            .unwrap()
            .contains("unknown record type"));
        assert_eq!(raw_line_count(&conn, 3).unwrap(), 3);
        assert_eq!(structural_row_count(&conn, 3).unwrap(), 0);
    }

    #[test]
    fn duplicate_trace_numbers_keep_audit_trail() {
        let mut conn = test_conn();
        // two entries share a trace number within the batch
        let content = single_batch_file(
            &[
                entry_line("27", 10000, "076401250000001"),
                entry_line("22", 2500, "076401250000001"),
            ],
            2,
            10000,
            2500,
        );

        let result = ingest_file(&mut conn, 8, &content).unwrap();

        assert!(!result.structural);
        assert!(result
            .fatal_error
            .as_deref()
            .unwrap()
            .contains("duplicate trace number"));
        assert_eq!(raw_line_count(&conn, 8).unwrap(), 6);
        assert_eq!(structural_row_count(&conn, 8).unwrap(), 0);
    }

    #[test]
    fn totals_mismatch_is_flagged_but_persisted() {
        let mut conn = test_conn();
        let content = single_batch_file(&[entry_line("27", 10000, "076401250000001")], 1, 12345, 0);

        let result = ingest_file(&mut conn, 4, &content).unwrap();

        assert!(result.structural);
        assert_eq!(result.reconciliation_warnings.len(), 2);
        assert_eq!(entry_detail_count(&conn, 4).unwrap(), 1);
    }

    #[test]
    fn ingest_flips_processing_status() {
        let mut conn = test_conn();
        register_file(&conn, 9, "ACH_20240115.txt").unwrap();
        assert_eq!(
            get_processing_status(&conn, 9).unwrap().as_deref(),
            Some("Pending")
        );

        let clean = single_batch_file(&[entry_line("27", 10000, "076401250000001")], 1, 10000, 0);
        ingest_file(&mut conn, 9, &clean).unwrap();
        assert_eq!(
            get_processing_status(&conn, 9).unwrap().as_deref(),
            Some("Processed")
        );

        // an entry with no file header fails structurally
        let broken = entry_line("27", 10000, "076401250000001");
        ingest_file(&mut conn, 9, &broken).unwrap();
        assert_eq!(
            get_processing_status(&conn, 9).unwrap().as_deref(),
            Some("Failed")
        );
    }

    #[test]
    fn reingest_wins_over_previous_content() {
        let mut conn = test_conn();
        let first = single_batch_file(&[entry_line("27", 10000, "076401250000001")], 1, 10000, 0);
        let second = single_batch_file(
            &[
                entry_line("22", 100, "076401250000008"),
                entry_line("22", 200, "076401250000009"),
            ],
            2,
            0,
            300,
        );

        ingest_file(&mut conn, 6, &first).unwrap();
        let result = ingest_file(&mut conn, 6, &second).unwrap();

        assert_eq!(result.entry_count, 2);
        assert_eq!(entry_detail_count(&conn, 6).unwrap(), 2);
    }
}
