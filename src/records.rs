// NACHA record codec - fixed-width decode/encode for the six ACH record types
// Column layouts follow the NACHA specification (94-character records)

use serde::{Deserialize, Serialize};

/// Every NACHA record is exactly 94 characters wide.
pub const RECORD_WIDTH: usize = 94;

// ============================================================================
// RECORD TYPE DISCRIMINATOR
// ============================================================================

/// Record type, selected by the first character of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    FileHeader,
    BatchHeader,
    EntryDetail,
    Addenda,
    BatchControl,
    FileControl,
}

impl RecordType {
    /// Map a type discriminator character to a record type.
    /// Returns `None` for anything outside {1,5,6,7,8,9}.
    pub fn from_char(c: char) -> Option<RecordType> {
        match c {
            '1' => Some(RecordType::FileHeader),
            '5' => Some(RecordType::BatchHeader),
            '6' => Some(RecordType::EntryDetail),
            '7' => Some(RecordType::Addenda),
            '8' => Some(RecordType::BatchControl),
            '9' => Some(RecordType::FileControl),
            _ => None,
        }
    }

    /// The discriminator character this type occupies in column 0.
    pub fn code(&self) -> char {
        match self {
            RecordType::FileHeader => '1',
            RecordType::BatchHeader => '5',
            RecordType::EntryDetail => '6',
            RecordType::Addenda => '7',
            RecordType::BatchControl => '8',
            RecordType::FileControl => '9',
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RecordType::FileHeader => "File Header Record",
            RecordType::BatchHeader => "Batch Header Record",
            RecordType::EntryDetail => "Entry Detail Record",
            RecordType::Addenda => "Addenda Record",
            RecordType::BatchControl => "Batch Control Record",
            RecordType::FileControl => "File Control Record",
        }
    }
}

// ============================================================================
// FIELD EXTRACTION HELPERS
// ============================================================================

/// Pad or truncate a line to exactly 94 characters.
pub fn normalize_line(line: &str) -> String {
    let mut s: String = line.chars().take(RECORD_WIDTH).collect();
    while s.chars().count() < RECORD_WIDTH {
        s.push(' ');
    }
    s
}

/// Slice a column range out of a normalized line by character position and
/// trim surrounding blanks. Character-based so a stray non-ASCII byte cannot
/// split the slice mid-character.
pub(crate) fn column(line: &str, start: usize, end: usize) -> String {
    line.chars().skip(start).take(end - start).collect()
}

fn text(line: &str, start: usize, end: usize) -> String {
    column(line, start, end).trim().to_string()
}

/// Parse a numeric column as unsigned cents/count. Non-numeric content yields
/// zero plus a recorded error, never a silent truncation.
fn digits_u64(line: &str, start: usize, end: usize, field: &str, errors: &mut Vec<String>) -> u64 {
    let raw = column(line, start, end);
    let raw = raw.trim();
    match raw.parse::<u64>() {
        Ok(v) => v,
        Err(_) => {
            errors.push(format!("{} must be numeric, got '{}'", field, raw));
            0
        }
    }
}

fn digits_u32(line: &str, start: usize, end: usize, field: &str, errors: &mut Vec<String>) -> u32 {
    digits_u64(line, start, end, field, errors) as u32
}

/// Left-justified, space-padded text field (encode direction).
fn pad_text(value: &str, width: usize) -> String {
    let mut s: String = value.chars().take(width).collect();
    while s.chars().count() < width {
        s.push(' ');
    }
    s
}

/// Right-justified, zero-padded numeric field (encode direction).
fn pad_num(value: u64, width: usize) -> String {
    format!("{:0>width$}", value, width = width)
}

/// Last 7 characters of a trace number, parsed as the per-entry sequence.
/// Counted in characters so non-ASCII content degrades to `None` instead of
/// splitting the string mid-character.
fn trace_tail(trace_number: &str) -> Option<u32> {
    let chars: Vec<char> = trace_number.chars().collect();
    if chars.len() < 7 {
        return None;
    }
    let tail: String = chars[chars.len() - 7..].iter().collect();
    tail.parse::<u32>().ok()
}

// ============================================================================
// RECORD STRUCTS
// ============================================================================

/// File Header Record (Type 1) - first structural record of every file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub priority_code: String,
    pub immediate_destination: String,
    pub immediate_origin: String,
    pub file_creation_date: String,
    pub file_creation_time: String,
    pub file_id_modifier: String,
    pub record_size: String,
    pub blocking_factor: String,
    pub format_code: String,
    pub immediate_dest_name: String,
    pub immediate_origin_name: String,
    pub reference_code: String,
    pub raw_record: String,
}

/// Batch Header Record (Type 5) - opens a batch, carries its batch number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchHeader {
    pub service_class_code: String,
    pub company_name: String,
    pub company_discretionary_data: String,
    pub company_identification: String,
    pub standard_entry_class_code: String,
    pub company_entry_description: String,
    pub company_descriptive_date: String,
    pub effective_entry_date: String,
    pub settlement_date: String,
    pub originator_status_code: String,
    pub originating_dfi_id: String,
    pub batch_number: u32,
    pub raw_record: String,
}

/// Entry Detail Record (Type 6) - one payment entry within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDetail {
    pub transaction_code: String,
    pub receiving_dfi_id: String,
    pub check_digit: String,
    pub dfi_account_number: String,
    /// Amount in integer cents. All arithmetic uses this field; the
    /// decimal-scaled form is derived at the persistence boundary for display.
    pub amount: u64,
    pub individual_id_number: String,
    pub individual_name: String,
    pub discretionary_data: String,
    pub addenda_record_indicator: String,
    /// 15 digits: 8-digit origin routing prefix + 7-digit sequence.
    pub trace_number: String,
    /// Derived from the last 7 digits of the trace number when numeric.
    pub trace_sequence_number: Option<u32>,
    pub raw_record: String,
}

/// Addenda Record (Type 7) - supplemental payment info for the preceding entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addenda {
    pub addenda_type_code: String,
    pub payment_related_info: String,
    pub addenda_sequence_number: u32,
    pub entry_detail_sequence_num: u32,
    pub raw_record: String,
}

/// Batch Control Record (Type 8) - declared totals for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchControl {
    pub service_class_code: String,
    pub entry_addenda_count: u32,
    pub entry_hash: String,
    pub total_debit_amount: u64,
    pub total_credit_amount: u64,
    pub company_identification: String,
    pub message_auth_code: String,
    pub reserved: String,
    pub originating_dfi_id: String,
    pub batch_number: u32,
    pub raw_record: String,
}

/// File Control Record (Type 9) - declared totals for the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileControl {
    pub batch_count: u32,
    pub block_count: u32,
    pub entry_addenda_count: u32,
    pub entry_hash: String,
    pub total_debit_amount: u64,
    pub total_credit_amount: u64,
    pub reserved: String,
    pub raw_record: String,
}

// ============================================================================
// CLOSED RECORD UNION
// ============================================================================

/// One decoded NACHA record. Closed union - the six types are the format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AchRecord {
    FileHeader(FileHeader),
    BatchHeader(BatchHeader),
    EntryDetail(EntryDetail),
    Addenda(Addenda),
    BatchControl(BatchControl),
    FileControl(FileControl),
}

impl AchRecord {
    pub fn record_type(&self) -> RecordType {
        match self {
            AchRecord::FileHeader(_) => RecordType::FileHeader,
            AchRecord::BatchHeader(_) => RecordType::BatchHeader,
            AchRecord::EntryDetail(_) => RecordType::EntryDetail,
            AchRecord::Addenda(_) => RecordType::Addenda,
            AchRecord::BatchControl(_) => RecordType::BatchControl,
            AchRecord::FileControl(_) => RecordType::FileControl,
        }
    }

    /// Decode one line into its typed record. The first character selects the
    /// variant; `None` means the discriminator is not a known record type.
    ///
    /// Decoding itself never fails: the line is padded/truncated to 94
    /// characters, text fields are trimmed, and numeric fields that fail to
    /// parse come back as zero with an error pushed onto the returned list.
    pub fn decode(line: &str) -> Option<(AchRecord, Vec<String>)> {
        let type_char = line.chars().next()?;
        let record_type = RecordType::from_char(type_char)?;

        let mut errors = Vec::new();
        if line.chars().count() < RECORD_WIDTH {
            errors.push(format!(
                "record shorter than {} characters, missing columns read as blank",
                RECORD_WIDTH
            ));
        }
        let line = normalize_line(line);

        let record = match record_type {
            RecordType::FileHeader => AchRecord::FileHeader(FileHeader {
                priority_code: text(&line, 1, 3),
                immediate_destination: text(&line, 3, 13),
                immediate_origin: text(&line, 13, 23),
                file_creation_date: text(&line, 23, 29),
                file_creation_time: text(&line, 29, 33),
                file_id_modifier: text(&line, 33, 34),
                record_size: text(&line, 34, 37),
                blocking_factor: text(&line, 37, 39),
                format_code: text(&line, 39, 40),
                immediate_dest_name: text(&line, 40, 63),
                immediate_origin_name: text(&line, 63, 86),
                reference_code: text(&line, 86, 94),
                raw_record: line.clone(),
            }),
            RecordType::BatchHeader => AchRecord::BatchHeader(BatchHeader {
                service_class_code: text(&line, 1, 4),
                company_name: text(&line, 4, 20),
                company_discretionary_data: text(&line, 20, 40),
                company_identification: text(&line, 40, 50),
                standard_entry_class_code: text(&line, 50, 53),
                company_entry_description: text(&line, 53, 63),
                company_descriptive_date: text(&line, 63, 69),
                effective_entry_date: text(&line, 69, 75),
                settlement_date: text(&line, 75, 78),
                originator_status_code: text(&line, 78, 79),
                originating_dfi_id: text(&line, 79, 87),
                batch_number: digits_u32(&line, 87, 94, "batch_number", &mut errors),
                raw_record: line.clone(),
            }),
            RecordType::EntryDetail => {
                let trace_number = text(&line, 79, 94);
                let trace_sequence_number = trace_tail(&trace_number);
                AchRecord::EntryDetail(EntryDetail {
                    transaction_code: text(&line, 1, 3),
                    receiving_dfi_id: text(&line, 3, 11),
                    check_digit: text(&line, 11, 12),
                    dfi_account_number: text(&line, 12, 29),
                    amount: digits_u64(&line, 29, 39, "amount", &mut errors),
                    individual_id_number: text(&line, 39, 54),
                    individual_name: text(&line, 54, 76),
                    discretionary_data: text(&line, 76, 78),
                    addenda_record_indicator: text(&line, 78, 79),
                    trace_number,
                    trace_sequence_number,
                    raw_record: line.clone(),
                })
            }
            RecordType::Addenda => AchRecord::Addenda(Addenda {
                addenda_type_code: text(&line, 1, 3),
                payment_related_info: text(&line, 3, 83),
                addenda_sequence_number: digits_u32(
                    &line,
                    83,
                    87,
                    "addenda_sequence_number",
                    &mut errors,
                ),
                entry_detail_sequence_num: digits_u32(
                    &line,
                    87,
                    94,
                    "entry_detail_sequence_num",
                    &mut errors,
                ),
                raw_record: line.clone(),
            }),
            RecordType::BatchControl => AchRecord::BatchControl(BatchControl {
                service_class_code: text(&line, 1, 4),
                entry_addenda_count: digits_u32(&line, 4, 10, "entry_addenda_count", &mut errors),
                entry_hash: text(&line, 10, 20),
                total_debit_amount: digits_u64(&line, 20, 32, "total_debit_amount", &mut errors),
                total_credit_amount: digits_u64(&line, 32, 44, "total_credit_amount", &mut errors),
                company_identification: text(&line, 44, 54),
                message_auth_code: text(&line, 54, 73),
                reserved: text(&line, 73, 79),
                originating_dfi_id: text(&line, 79, 87),
                batch_number: digits_u32(&line, 87, 94, "batch_number", &mut errors),
                raw_record: line.clone(),
            }),
            RecordType::FileControl => AchRecord::FileControl(FileControl {
                batch_count: digits_u32(&line, 1, 7, "batch_count", &mut errors),
                block_count: digits_u32(&line, 7, 13, "block_count", &mut errors),
                entry_addenda_count: digits_u32(&line, 13, 21, "entry_addenda_count", &mut errors),
                entry_hash: text(&line, 21, 31),
                total_debit_amount: digits_u64(&line, 31, 43, "total_debit_amount", &mut errors),
                total_credit_amount: digits_u64(&line, 43, 55, "total_credit_amount", &mut errors),
                reserved: text(&line, 55, 94),
                raw_record: line.clone(),
            }),
        };

        Some((record, errors))
    }

    /// Re-encode a record to its canonical 94-character line. Inverse of
    /// `decode` for well-formed input; used by tests and fixture builders,
    /// not by the ingestion path.
    pub fn encode(&self) -> String {
        let line = match self {
            AchRecord::FileHeader(h) => format!(
                "1{}{}{}{}{}{}{}{}{}{}{}{}",
                pad_text(&h.priority_code, 2),
                pad_text(&h.immediate_destination, 10),
                pad_text(&h.immediate_origin, 10),
                pad_text(&h.file_creation_date, 6),
                pad_text(&h.file_creation_time, 4),
                pad_text(&h.file_id_modifier, 1),
                pad_text(&h.record_size, 3),
                pad_text(&h.blocking_factor, 2),
                pad_text(&h.format_code, 1),
                pad_text(&h.immediate_dest_name, 23),
                pad_text(&h.immediate_origin_name, 23),
                pad_text(&h.reference_code, 8),
            ),
            AchRecord::BatchHeader(h) => format!(
                "5{}{}{}{}{}{}{}{}{}{}{}{}",
                pad_text(&h.service_class_code, 3),
                pad_text(&h.company_name, 16),
                pad_text(&h.company_discretionary_data, 20),
                pad_text(&h.company_identification, 10),
                pad_text(&h.standard_entry_class_code, 3),
                pad_text(&h.company_entry_description, 10),
                pad_text(&h.company_descriptive_date, 6),
                pad_text(&h.effective_entry_date, 6),
                pad_text(&h.settlement_date, 3),
                pad_text(&h.originator_status_code, 1),
                pad_text(&h.originating_dfi_id, 8),
                pad_num(h.batch_number as u64, 7),
            ),
            AchRecord::EntryDetail(e) => format!(
                "6{}{}{}{}{}{}{}{}{}{}",
                pad_text(&e.transaction_code, 2),
                pad_text(&e.receiving_dfi_id, 8),
                pad_text(&e.check_digit, 1),
                pad_text(&e.dfi_account_number, 17),
                pad_num(e.amount, 10),
                pad_text(&e.individual_id_number, 15),
                pad_text(&e.individual_name, 22),
                pad_text(&e.discretionary_data, 2),
                pad_text(&e.addenda_record_indicator, 1),
                pad_text(&e.trace_number, 15),
            ),
            AchRecord::Addenda(a) => format!(
                "7{}{}{}{}",
                pad_text(&a.addenda_type_code, 2),
                pad_text(&a.payment_related_info, 80),
                pad_num(a.addenda_sequence_number as u64, 4),
                pad_num(a.entry_detail_sequence_num as u64, 7),
            ),
            AchRecord::BatchControl(c) => format!(
                "8{}{}{}{}{}{}{}{}{}{}",
                pad_text(&c.service_class_code, 3),
                pad_num(c.entry_addenda_count as u64, 6),
                pad_text(&c.entry_hash, 10),
                pad_num(c.total_debit_amount, 12),
                pad_num(c.total_credit_amount, 12),
                pad_text(&c.company_identification, 10),
                pad_text(&c.message_auth_code, 19),
                pad_text(&c.reserved, 6),
                pad_text(&c.originating_dfi_id, 8),
                pad_num(c.batch_number as u64, 7),
            ),
            AchRecord::FileControl(c) => format!(
                "9{}{}{}{}{}{}{}",
                pad_num(c.batch_count as u64, 6),
                pad_num(c.block_count as u64, 6),
                pad_num(c.entry_addenda_count as u64, 8),
                pad_text(&c.entry_hash, 10),
                pad_num(c.total_debit_amount, 12),
                pad_num(c.total_credit_amount, 12),
                pad_text(&c.reserved, 39),
            ),
        };

        debug_assert_eq!(line.chars().count(), RECORD_WIDTH);
        line
    }
}

// ============================================================================
// TESTS
// ============================================================================
