// Reconciliation engine - recompute counts and debit/credit totals from the
// parsed tree and compare them with the declared control totals.
//
// Mismatches are data-quality signals from the upstream originator, not
// grounds for rejection: the file still persists, flagged for review.

use serde::{Deserialize, Serialize};

use crate::parser::{ParsedBatch, ParsedFile};

/// Transaction codes that move money out of the receiving account.
pub const DEBIT_TRANSACTION_CODES: [&str; 6] = ["27", "28", "29", "37", "38", "39"];

/// Transaction codes that move money into the receiving account.
pub const CREDIT_TRANSACTION_CODES: [&str; 6] = ["22", "23", "24", "32", "33", "34"];

pub fn is_debit(transaction_code: &str) -> bool {
    DEBIT_TRANSACTION_CODES.contains(&transaction_code)
}

pub fn is_credit(transaction_code: &str) -> bool {
    CREDIT_TRANSACTION_CODES.contains(&transaction_code)
}

// ============================================================================
// COMPUTED TOTALS
// ============================================================================

/// Totals recomputed from entry/addenda records, all in integer cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedTotals {
    pub entry_addenda_count: u32,
    pub total_debit_amount: u64,
    pub total_credit_amount: u64,
}

impl ComputedTotals {
    fn add(&mut self, other: ComputedTotals) {
        self.entry_addenda_count += other.entry_addenda_count;
        self.total_debit_amount += other.total_debit_amount;
        self.total_credit_amount += other.total_credit_amount;
    }
}

/// Sum one batch's entries and addenda. Entries whose transaction code is
/// outside both sets contribute to neither total; the validator has already
/// flagged the code itself.
pub fn compute_batch_totals(batch: &ParsedBatch) -> ComputedTotals {
    let mut totals = ComputedTotals {
        entry_addenda_count: batch.entry_addenda_count(),
        ..Default::default()
    };
    for entry in &batch.entries {
        if is_debit(&entry.detail.transaction_code) {
            totals.total_debit_amount += entry.detail.amount;
        } else if is_credit(&entry.detail.transaction_code) {
            totals.total_credit_amount += entry.detail.amount;
        }
    }
    totals
}

// ============================================================================
// WARNINGS
// ============================================================================

/// Where a declared/computed mismatch was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningScope {
    Batch { batch_number: u32 },
    File,
}

/// One declared-vs-computed mismatch. Non-fatal; attached to the control
/// record it contradicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationWarning {
    pub scope: WarningScope,
    pub field: String,
    pub declared: u64,
    pub computed: u64,
}

impl std::fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            WarningScope::Batch { batch_number } => write!(
                f,
                "batch {}: {} declared {} but computed {}",
                batch_number, self.field, self.declared, self.computed
            ),
            WarningScope::File => write!(
                f,
                "file: {} declared {} but computed {}",
                self.field, self.declared, self.computed
            ),
        }
    }
}

/// Full reconciliation outcome for one parsed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub file_totals: ComputedTotals,
    pub batch_count: u32,
    pub warnings: Vec<ReconciliationWarning>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Warnings for one batch's control record, used when persisting notes.
    pub fn warnings_for_batch(&self, batch_number: u32) -> Vec<&ReconciliationWarning> {
        self.warnings
            .iter()
            .filter(|w| w.scope == WarningScope::Batch { batch_number })
            .collect()
    }

    pub fn file_warnings(&self) -> Vec<&ReconciliationWarning> {
        self.warnings
            .iter()
            .filter(|w| w.scope == WarningScope::File)
            .collect()
    }
}

// ============================================================================
// ENGINE
// ============================================================================

fn compare(
    warnings: &mut Vec<ReconciliationWarning>,
    scope: WarningScope,
    field: &str,
    declared: u64,
    computed: u64,
) {
    if declared != computed {
        warnings.push(ReconciliationWarning {
            scope,
            field: field.to_string(),
            declared,
            computed,
        });
    }
}

/// Reconcile every batch and the file scope in one pass over the tree.
pub fn reconcile(file: &ParsedFile) -> ReconciliationReport {
    let mut warnings = Vec::new();
    let mut file_totals = ComputedTotals::default();

    for batch in &file.batches {
        let computed = compute_batch_totals(batch);
        let scope = WarningScope::Batch {
            batch_number: batch.batch_number,
        };
        compare(
            &mut warnings,
            scope,
            "entry_addenda_count",
            batch.control.entry_addenda_count as u64,
            computed.entry_addenda_count as u64,
        );
        compare(
            &mut warnings,
            scope,
            "total_debit_amount",
            batch.control.total_debit_amount,
            computed.total_debit_amount,
        );
        compare(
            &mut warnings,
            scope,
            "total_credit_amount",
            batch.control.total_credit_amount,
            computed.total_credit_amount,
        );
        file_totals.add(computed);
    }

    let batch_count = file.batches.len() as u32;
    compare(
        &mut warnings,
        WarningScope::File,
        "batch_count",
        file.control.batch_count as u64,
        batch_count as u64,
    );
    compare(
        &mut warnings,
        WarningScope::File,
        "entry_addenda_count",
        file.control.entry_addenda_count as u64,
        file_totals.entry_addenda_count as u64,
    );
    compare(
        &mut warnings,
        WarningScope::File,
        "total_debit_amount",
        file.control.total_debit_amount,
        file_totals.total_debit_amount,
    );
    compare(
        &mut warnings,
        WarningScope::File,
        "total_credit_amount",
        file.control.total_credit_amount,
        file_totals.total_credit_amount,
    );

    ReconciliationReport {
        file_totals,
        batch_count,
        warnings,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::FileParser;
    use crate::testfile::{
        addenda_line, batch_control_line, batch_header_line, entry_line, file_control_line,
        file_header_line, single_batch_file,
    };

    fn parse(content: &str) -> ParsedFile {
        FileParser::parse(content).structure.expect("structural parse")
    }

    #[test]
    fn matching_totals_produce_no_warnings() {
        // one $100.00 debit, control declares 10000 cents
        let content = single_batch_file(
            &[entry_line("27", 10000, "076401250000001")],
            1,
            10000,
            0,
        );
        let report = reconcile(&parse(&content));

        assert!(report.is_clean(), "warnings: {:?}", report.warnings);
        assert_eq!(report.batch_count, 1);
        assert_eq!(report.file_totals.total_debit_amount, 10000);
        assert_eq!(report.file_totals.entry_addenda_count, 1);
    }

    #[test]
    fn debit_and_credit_totals_split_by_transaction_code() {
        let content = single_batch_file(
            &[
                entry_line("27", 7500, "076401250000001"), // checking debit
                entry_line("22", 2500, "076401250000002"), // checking credit
                entry_line("37", 1000, "076401250000003"), // savings debit
            ],
            3,
            8500,
            2500,
        );
        let report = reconcile(&parse(&content));

        assert!(report.is_clean(), "warnings: {:?}", report.warnings);
        assert_eq!(report.file_totals.total_debit_amount, 8500);
        assert_eq!(report.file_totals.total_credit_amount, 2500);
    }

    #[test]
    fn addenda_count_toward_entry_addenda_count() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
            addenda_line(1, 1),
            batch_control_line(1, 2, 10000, 0),
            file_control_line(1, 2, 10000, 0),
        ];
        let report = reconcile(&parse(&lines.join("\n")));
        assert!(report.is_clean(), "warnings: {:?}", report.warnings);
        assert_eq!(report.file_totals.entry_addenda_count, 2);
    }

    #[test]
    fn declared_total_mismatch_warns_at_batch_and_file_scope() {
        // entries sum to 10000 but controls declare 99999
        let content = single_batch_file(
            &[entry_line("27", 10000, "076401250000001")],
            1,
            99999,
            0,
        );
        let report = reconcile(&parse(&content));

        assert!(!report.is_clean());
        let batch_warnings = report.warnings_for_batch(1);
        assert_eq!(batch_warnings.len(), 1);
        assert_eq!(batch_warnings[0].field, "total_debit_amount");
        assert_eq!(batch_warnings[0].declared, 99999);
        assert_eq!(batch_warnings[0].computed, 10000);

        let file_warnings = report.file_warnings();
        assert_eq!(file_warnings.len(), 1);
        assert_eq!(file_warnings[0].field, "total_debit_amount");
    }

    #[test]
    fn batch_count_mismatch_warns_at_file_scope() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
            batch_control_line(1, 1, 10000, 0),
            // file control claims two batches
            file_control_line(2, 1, 10000, 0),
        ];
        let report = reconcile(&parse(&lines.join("\n")));

        let file_warnings = report.file_warnings();
        assert_eq!(file_warnings.len(), 1);
        assert_eq!(file_warnings[0].field, "batch_count");
        assert_eq!(file_warnings[0].declared, 2);
        assert_eq!(file_warnings[0].computed, 1);
    }

    #[test]
    fn unknown_transaction_code_contributes_to_neither_total() {
        let content = single_batch_file(
            &[entry_line("99", 5000, "076401250000001")],
            1,
            0,
            0,
        );
        let report = reconcile(&parse(&content));

        assert!(report.is_clean(), "warnings: {:?}", report.warnings);
        assert_eq!(report.file_totals.total_debit_amount, 0);
        assert_eq!(report.file_totals.total_credit_amount, 0);
    }
}
