// ACH Ingest - NACHA file decoding, validation, and persistence
// Exposes all modules for use in the import binary and tests

pub mod db;
pub mod ingest;
pub mod parser;
pub mod reconciliation;
pub mod records;
pub mod validator;

#[cfg(test)]
pub(crate) mod testfile;

// Re-export commonly used types
pub use db::{
    addenda_count, batch_header_count, entry_detail_count, get_processing_status, get_raw_lines,
    persist_file, raw_line_count, register_file, setup_database, structural_row_count,
    update_processing_status, FileStatus, PersistResult, StoredLine,
};
pub use ingest::ingest_file;
pub use parser::{
    FileParser, ParseResult, ParsedBatch, ParsedEntry, ParsedFile, RawLine, SequenceError,
};
pub use reconciliation::{
    compute_batch_totals, is_credit, is_debit, reconcile, ComputedTotals, ReconciliationReport,
    ReconciliationWarning, WarningScope,
};
pub use records::{
    AchRecord, Addenda, BatchControl, BatchHeader, EntryDetail, FileControl, FileHeader,
    RecordType, RECORD_WIDTH,
};
pub use validator::{validate_line, ValidationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
