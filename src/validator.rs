// NACHA line validation - advisory, structural checks per record type
// Validation never stops the parser; errors accumulate against the raw line

use crate::records::{column, normalize_line, RecordType, RECORD_WIDTH};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Transaction codes accepted on Entry Detail records.
pub const VALID_TRANSACTION_CODES: [&str; 12] = [
    "22", "23", "24", "27", "28", "29", "32", "33", "34", "37", "38", "39",
];

/// Service class codes accepted on Batch Header / Batch Control records.
pub const VALID_SERVICE_CLASS_CODES: [&str; 5] = ["200", "220", "225", "280", "285"];

/// Standard entry class codes accepted on Batch Header records.
pub const VALID_STANDARD_ENTRY_CLASSES: [&str; 8] =
    ["PPD", "CCD", "TEL", "WEB", "ARC", "BOC", "POP", "RCK"];

// ============================================================================
// VALIDATION ERROR
// ============================================================================

/// A single structural issue found on one line. Advisory - the line is still
/// decoded and retained in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub line_number: usize,
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    fn line(line_number: usize, message: String) -> Self {
        ValidationError {
            line_number,
            field: None,
            message,
        }
    }

    fn field(line_number: usize, field: &str, message: String) -> Self {
        ValidationError {
            line_number,
            field: Some(field.to_string()),
            message,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "line {}: {}: {}", self.line_number, field, self.message),
            None => write!(f, "line {}: {}", self.line_number, self.message),
        }
    }
}

// ============================================================================
// LINE VALIDATOR
// ============================================================================

/// Validate one line. Checks run in order: length, discriminator, then
/// variant-specific field formats. All findings are returned; none abort.
pub fn validate_line(line: &str, line_number: usize) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let length = line.chars().count();
    if length != RECORD_WIDTH {
        errors.push(ValidationError::line(
            line_number,
            format!(
                "line length must be {} characters, got {}",
                RECORD_WIDTH, length
            ),
        ));
    }

    let type_char = match line.chars().next() {
        Some(c) => c,
        None => return errors,
    };
    let record_type = match RecordType::from_char(type_char) {
        Some(t) => t,
        None => {
            errors.push(ValidationError::line(
                line_number,
                format!("invalid record type: '{}'", type_char),
            ));
            return errors;
        }
    };

    // Field checks operate on the padded form so column slices always exist.
    let line = normalize_line(line);

    match record_type {
        RecordType::FileHeader => validate_file_header(&line, line_number, &mut errors),
        RecordType::BatchHeader => validate_batch_header(&line, line_number, &mut errors),
        RecordType::EntryDetail => validate_entry_detail(&line, line_number, &mut errors),
        RecordType::Addenda => validate_addenda(&line, line_number, &mut errors),
        RecordType::BatchControl => validate_batch_control(&line, line_number, &mut errors),
        RecordType::FileControl => validate_file_control(&line, line_number, &mut errors),
    }

    errors
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn check_digits(
    line: &str,
    start: usize,
    end: usize,
    field: &str,
    line_number: usize,
    errors: &mut Vec<ValidationError>,
) {
    let value = column(line, start, end);
    if !is_digits(&value) {
        errors.push(ValidationError::field(
            line_number,
            field,
            format!("must be numeric: '{}'", value),
        ));
    }
}

fn check_yymmdd(
    line: &str,
    start: usize,
    end: usize,
    field: &str,
    line_number: usize,
    errors: &mut Vec<ValidationError>,
) {
    let value = column(line, start, end);
    let value = value.trim();
    if NaiveDate::parse_from_str(value, "%y%m%d").is_err() {
        errors.push(ValidationError::field(
            line_number,
            field,
            format!("must be a valid YYMMDD date: '{}'", value),
        ));
    }
}

/// DFI routing ids in batch/entry records are 8 digits (the check digit
/// lives in its own column where one exists).
fn check_routing8(
    line: &str,
    start: usize,
    end: usize,
    field: &str,
    line_number: usize,
    errors: &mut Vec<ValidationError>,
) {
    let value = column(line, start, end);
    let value = value.trim();
    if !(is_digits(value) && value.len() == 8) {
        errors.push(ValidationError::field(
            line_number,
            field,
            format!("must be an 8-digit routing id: '{}'", value),
        ));
    }
}

fn validate_file_header(line: &str, line_number: usize, errors: &mut Vec<ValidationError>) {
    // Immediate destination/origin carry a 9-digit routing number, usually
    // blank-prefixed to 10 columns; a 10-digit form also appears in practice.
    for (start, end, field) in [(3, 13, "immediate_destination"), (13, 23, "immediate_origin")] {
        let value = column(line, start, end);
        let value = value.trim();
        if !(is_digits(value) && (value.len() == 9 || value.len() == 10)) {
            errors.push(ValidationError::field(
                line_number,
                field,
                format!("must be a 9- or 10-digit routing number: '{}'", value),
            ));
        }
    }
    check_yymmdd(line, 23, 29, "file_creation_date", line_number, errors);
    check_digits(line, 29, 33, "file_creation_time", line_number, errors);
    check_digits(line, 1, 3, "priority_code", line_number, errors);
}

fn validate_batch_header(line: &str, line_number: usize, errors: &mut Vec<ValidationError>) {
    let service_class = column(line, 1, 4);
    if !VALID_SERVICE_CLASS_CODES.contains(&service_class.as_str()) {
        errors.push(ValidationError::field(
            line_number,
            "service_class_code",
            format!("invalid service class code: '{}'", service_class),
        ));
    }
    let sec = column(line, 50, 53);
    if !VALID_STANDARD_ENTRY_CLASSES.contains(&sec.as_str()) {
        errors.push(ValidationError::field(
            line_number,
            "standard_entry_class",
            format!("invalid standard entry class: '{}'", sec),
        ));
    }
    check_yymmdd(line, 69, 75, "effective_entry_date", line_number, errors);
    check_routing8(line, 79, 87, "originating_dfi_id", line_number, errors);
    check_digits(line, 87, 94, "batch_number", line_number, errors);
}

fn validate_entry_detail(line: &str, line_number: usize, errors: &mut Vec<ValidationError>) {
    let transaction_code = column(line, 1, 3);
    if !VALID_TRANSACTION_CODES.contains(&transaction_code.as_str()) {
        errors.push(ValidationError::field(
            line_number,
            "transaction_code",
            format!("invalid transaction code: '{}'", transaction_code),
        ));
    }
    check_routing8(line, 3, 11, "receiving_dfi_id", line_number, errors);
    check_digits(line, 11, 12, "check_digit", line_number, errors);

    let amount = column(line, 29, 39);
    if !is_digits(&amount) {
        errors.push(ValidationError::field(
            line_number,
            "amount",
            format!("must be a 10-digit numeric amount: '{}'", amount),
        ));
    }

    let addenda_indicator = column(line, 78, 79);
    if addenda_indicator != "0" && addenda_indicator != "1" {
        errors.push(ValidationError::field(
            line_number,
            "addenda_indicator",
            format!("must be 0 or 1: '{}'", addenda_indicator),
        ));
    }

    let trace = column(line, 79, 94);
    let trace = trace.trim();
    if !(is_digits(trace) && trace.len() == 15) {
        errors.push(ValidationError::field(
            line_number,
            "trace_number",
            format!("must be a 15-digit trace number: '{}'", trace),
        ));
    }
}

fn validate_addenda(line: &str, line_number: usize, errors: &mut Vec<ValidationError>) {
    check_digits(line, 1, 3, "addenda_type_code", line_number, errors);
    check_digits(line, 83, 87, "addenda_sequence_number", line_number, errors);
    check_digits(line, 87, 94, "entry_detail_sequence_number", line_number, errors);
}

fn validate_batch_control(line: &str, line_number: usize, errors: &mut Vec<ValidationError>) {
    let service_class = column(line, 1, 4);
    if !VALID_SERVICE_CLASS_CODES.contains(&service_class.as_str()) {
        errors.push(ValidationError::field(
            line_number,
            "service_class_code",
            format!("invalid service class code: '{}'", service_class),
        ));
    }
    check_digits(line, 4, 10, "entry_addenda_count", line_number, errors);
    check_digits(line, 20, 32, "total_debit_amount", line_number, errors);
    check_digits(line, 32, 44, "total_credit_amount", line_number, errors);
    check_routing8(line, 79, 87, "originating_dfi_id", line_number, errors);
    check_digits(line, 87, 94, "batch_number", line_number, errors);
}

fn validate_file_control(line: &str, line_number: usize, errors: &mut Vec<ValidationError>) {
    check_digits(line, 1, 7, "batch_count", line_number, errors);
    check_digits(line, 7, 13, "block_count", line_number, errors);
    check_digits(line, 13, 21, "entry_addenda_count", line_number, errors);
    check_digits(line, 31, 43, "total_debit_amount", line_number, errors);
    check_digits(line, 43, 55, "total_credit_amount", line_number, errors);
}

// ============================================================================
// TESTS
// ============================================================================
