// ACH file parser - single-pass state machine over the record discriminators
// Batch membership and control totals only resolve in file order, so parsing
// is strictly sequential per file; distinct files parse independently.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{
    normalize_line, AchRecord, Addenda, BatchControl, BatchHeader, EntryDetail, FileControl,
    FileHeader,
};
use crate::validator::validate_line;

// ============================================================================
// RAW LINE AUDIT TRAIL
// ============================================================================

/// One input line, kept verbatim for the audit trail. Exists for every
/// non-empty line, including ones that fail decoding or abort the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLine {
    pub line_number: usize,
    /// Content padded/truncated to the canonical 94 characters.
    pub content: String,
    pub record_type_char: char,
    pub errors: Vec<String>,
}

// ============================================================================
// PARSED HIERARCHY
// ============================================================================

/// An entry plus the addenda records that immediately followed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEntry {
    pub detail: EntryDetail,
    pub addenda: Vec<Addenda>,
}

/// A closed batch: header, entries, and the control record that closed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedBatch {
    pub batch_number: u32,
    pub header: BatchHeader,
    pub entries: Vec<ParsedEntry>,
    pub control: BatchControl,
}

impl ParsedBatch {
    /// Entries plus addenda, the unit the control record counts in.
    pub fn entry_addenda_count(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| 1 + e.addenda.len() as u32)
            .sum()
    }
}

/// The fully assembled hierarchy for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    pub header: FileHeader,
    pub batches: Vec<ParsedBatch>,
    pub control: FileControl,
}

impl ParsedFile {
    pub fn entry_count(&self) -> usize {
        self.batches.iter().map(|b| b.entries.len()).sum()
    }

    pub fn addenda_count(&self) -> usize {
        self.batches
            .iter()
            .flat_map(|b| b.entries.iter())
            .map(|e| e.addenda.len())
            .sum()
    }
}

// ============================================================================
// SEQUENCE ERRORS (fatal)
// ============================================================================

/// A record discriminator arrived in a state that cannot accept it. Fatal:
/// the hierarchy cannot be reconstructed, only the raw audit trail survives.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SequenceError {
    #[error("line {line_number}: unknown record type '{type_char}'")]
    UnknownRecordType { line_number: usize, type_char: char },

    #[error("line {line_number}: unexpected {description} while {expected}")]
    UnexpectedRecord {
        line_number: usize,
        description: String,
        expected: String,
    },

    #[error(
        "line {line_number}: batch number {batch_number} does not increase (previous batch was {previous})"
    )]
    BatchNumberNotIncreasing {
        line_number: usize,
        batch_number: u32,
        previous: u32,
    },

    #[error("line {line_number}: duplicate trace number '{trace_number}' within batch {batch_number}")]
    DuplicateTraceNumber {
        line_number: usize,
        batch_number: u32,
        trace_number: String,
    },

    #[error("file ended before the file control record (last line {last_line})")]
    TruncatedFile { last_line: usize },
}

impl SequenceError {
    /// The raw line this error should be recorded against, if any.
    pub fn line_number(&self) -> Option<usize> {
        match self {
            SequenceError::UnknownRecordType { line_number, .. }
            | SequenceError::UnexpectedRecord { line_number, .. }
            | SequenceError::BatchNumberNotIncreasing { line_number, .. }
            | SequenceError::DuplicateTraceNumber { line_number, .. } => Some(*line_number),
            SequenceError::TruncatedFile { .. } => None,
        }
    }
}

/// Output of one parse attempt. `raw_lines` is always complete; `structure`
/// is the hierarchy or the sequence error that aborted assembly.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub raw_lines: Vec<RawLine>,
    pub structure: Result<ParsedFile, SequenceError>,
}

impl ParseResult {
    pub fn is_structural(&self) -> bool {
        self.structure.is_ok()
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    ExpectFileHeader,
    ExpectBatchHeaderOrFileControl,
    InBatch,
    Done,
}

impl ParserState {
    fn expected(&self) -> &'static str {
        match self {
            ParserState::ExpectFileHeader => "expecting the file header",
            ParserState::ExpectBatchHeaderOrFileControl => {
                "expecting a batch header or the file control"
            }
            ParserState::InBatch => "inside an open batch",
            ParserState::Done => "after the file control",
        }
    }
}

/// One in-flight batch while its control record has not yet arrived.
#[derive(Debug)]
struct OpenBatch {
    batch_number: u32,
    header: BatchHeader,
    entries: Vec<ParsedEntry>,
}

/// Per-file parse state. Owned by the worker parsing that file; nothing here
/// is shared across files.
#[derive(Debug)]
pub struct FileParser {
    state: ParserState,
    header: Option<FileHeader>,
    control: Option<FileControl>,
    batches: Vec<ParsedBatch>,
    open_batch: Option<OpenBatch>,
    /// True only directly after a type 6 or a type 7 in the same batch.
    addenda_allowed: bool,
    last_line_number: usize,
}

impl FileParser {
    pub fn new() -> Self {
        FileParser {
            state: ParserState::ExpectFileHeader,
            header: None,
            control: None,
            batches: Vec::new(),
            open_batch: None,
            addenda_allowed: false,
            last_line_number: 0,
        }
    }

    /// Parse a whole file's text in one pass. Empty lines are skipped and a
    /// trailing carriage return is stripped before any validation.
    pub fn parse(content: &str) -> ParseResult {
        let mut parser = FileParser::new();
        let mut raw_lines = Vec::new();
        let mut fatal: Option<SequenceError> = None;

        let mut line_number = 0;
        for line in content.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() {
                continue;
            }
            line_number += 1;

            let mut raw = RawLine {
                line_number,
                content: normalize_line(line),
                record_type_char: line.chars().next().unwrap_or(' '),
                errors: validate_line(line, line_number)
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
            };

            if fatal.is_none() {
                if let Err(err) = parser.step(line, line_number, &mut raw.errors) {
                    raw.errors.push(err.to_string());
                    fatal = Some(err);
                }
            }

            raw_lines.push(raw);
        }

        let structure = match fatal {
            Some(err) => Err(err),
            None => parser.finish(),
        };

        ParseResult {
            raw_lines,
            structure,
        }
    }

    /// Feed one non-empty line to the state machine.
    fn step(
        &mut self,
        line: &str,
        line_number: usize,
        line_errors: &mut Vec<String>,
    ) -> Result<(), SequenceError> {
        self.last_line_number = line_number;

        let type_char = line.chars().next().unwrap_or(' ');

        // Block-filler lines (all 9s) pad files to a block boundary after the
        // file control. They carry no structure but stay in the audit trail.
        if self.state == ParserState::Done && is_block_filler(line) {
            return Ok(());
        }

        let (record, decode_errors) = match AchRecord::decode(line) {
            Some(ok) => ok,
            None => {
                return Err(SequenceError::UnknownRecordType {
                    line_number,
                    type_char,
                })
            }
        };
        for err in decode_errors {
            if !line_errors.iter().any(|e| e.contains(&err)) {
                line_errors.push(err);
            }
        }

        match record {
            AchRecord::FileHeader(header) => {
                if self.state != ParserState::ExpectFileHeader {
                    return Err(self.unexpected(line_number, "file header record"));
                }
                self.header = Some(header);
                self.state = ParserState::ExpectBatchHeaderOrFileControl;
            }
            AchRecord::BatchHeader(header) => {
                if self.state != ParserState::ExpectBatchHeaderOrFileControl {
                    return Err(self.unexpected(line_number, "batch header record"));
                }
                // Batch numbers are unique and strictly increasing in file order.
                if let Some(previous) = self.batches.last().map(|b| b.batch_number) {
                    if header.batch_number <= previous {
                        return Err(SequenceError::BatchNumberNotIncreasing {
                            line_number,
                            batch_number: header.batch_number,
                            previous,
                        });
                    }
                }
                self.open_batch = Some(OpenBatch {
                    batch_number: header.batch_number,
                    header,
                    entries: Vec::new(),
                });
                self.addenda_allowed = false;
                self.state = ParserState::InBatch;
            }
            AchRecord::EntryDetail(detail) => {
                if self.state != ParserState::InBatch {
                    return Err(self.unexpected(line_number, "entry detail record"));
                }
                let Some(batch) = self.open_batch.as_mut() else {
                    return Err(self.unexpected(line_number, "entry detail record"));
                };
                // Trace numbers key entries within a batch; a repeat cannot be
                // stored, so it aborts here with the audit trail intact.
                if batch
                    .entries
                    .iter()
                    .any(|e| e.detail.trace_number == detail.trace_number)
                {
                    return Err(SequenceError::DuplicateTraceNumber {
                        line_number,
                        batch_number: batch.batch_number,
                        trace_number: detail.trace_number,
                    });
                }
                batch.entries.push(ParsedEntry {
                    detail,
                    addenda: Vec::new(),
                });
                self.addenda_allowed = true;
            }
            AchRecord::Addenda(addenda) => {
                if self.state != ParserState::InBatch || !self.addenda_allowed {
                    return Err(self.unexpected(line_number, "addenda record"));
                }
                let Some(entry) = self.open_batch.as_mut().and_then(|b| b.entries.last_mut())
                else {
                    return Err(self.unexpected(line_number, "addenda record"));
                };
                // An addenda forces the owning entry's indicator on.
                entry.detail.addenda_record_indicator = "1".to_string();
                entry.addenda.push(addenda);
            }
            AchRecord::BatchControl(control) => {
                if self.state != ParserState::InBatch {
                    return Err(self.unexpected(line_number, "batch control record"));
                }
                let Some(batch) = self.open_batch.take() else {
                    return Err(self.unexpected(line_number, "batch control record"));
                };
                self.batches.push(ParsedBatch {
                    batch_number: batch.batch_number,
                    header: batch.header,
                    entries: batch.entries,
                    control,
                });
                self.addenda_allowed = false;
                self.state = ParserState::ExpectBatchHeaderOrFileControl;
            }
            AchRecord::FileControl(control) => {
                if self.state != ParserState::ExpectBatchHeaderOrFileControl {
                    return Err(self.unexpected(line_number, "file control record"));
                }
                self.control = Some(control);
                self.state = ParserState::Done;
            }
        }

        Ok(())
    }

    fn unexpected(&self, line_number: usize, description: &str) -> SequenceError {
        SequenceError::UnexpectedRecord {
            line_number,
            description: description.to_string(),
            expected: self.state.expected().to_string(),
        }
    }

    /// End of input: only valid after the file control record.
    fn finish(self) -> Result<ParsedFile, SequenceError> {
        match (self.state, self.header, self.control) {
            (ParserState::Done, Some(header), Some(control)) => Ok(ParsedFile {
                header,
                batches: self.batches,
                control,
            }),
            _ => Err(SequenceError::TruncatedFile {
                last_line: self.last_line_number,
            }),
        }
    }
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new()
    }
}

/// NACHA block filler: a line of nothing but 9s.
fn is_block_filler(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '9')
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testfile::{
        addenda_line, batch_control_line, batch_header_line, entry_line, file_control_line,
        file_header_line,
    };

    #[test]
    fn parses_single_batch_file() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
            batch_control_line(1, 1, 10000, 0),
            file_control_line(1, 1, 10000, 0),
        ];
        let result = FileParser::parse(&lines.join("\n"));

        assert_eq!(result.raw_lines.len(), 5);
        let file = result.structure.expect("structural parse");
        assert_eq!(file.batches.len(), 1);
        assert_eq!(file.entry_count(), 1);
        assert_eq!(file.batches[0].batch_number, 1);
        assert_eq!(file.batches[0].entries[0].detail.amount, 10000);
    }

    #[test]
    fn skips_blank_lines_and_carriage_returns() {
        let content = format!(
            "{}\r\n\r\n{}\r\n{}\r\n{}\r\n{}\r\n\n",
            file_header_line(),
            batch_header_line(1),
            entry_line("22", 5000, "076401250000001"),
            batch_control_line(1, 1, 0, 5000),
            file_control_line(1, 1, 0, 5000),
        );
        let result = FileParser::parse(&content);

        assert_eq!(result.raw_lines.len(), 5);
        assert!(result.is_structural());
        // padded content never keeps the \r
        assert!(result.raw_lines.iter().all(|l| !l.content.contains('\r')));
    }

    #[test]
    fn addenda_attaches_to_most_recent_entry() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
            addenda_line(1, 1),
            addenda_line(2, 1),
            entry_line("27", 2000, "076401250000002"),
            batch_control_line(1, 5, 12000, 0),
            file_control_line(1, 5, 12000, 0),
        ];
        let file = FileParser::parse(&lines.join("\n"))
            .structure
            .expect("structural parse");

        let batch = &file.batches[0];
        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.entries[0].addenda.len(), 2);
        assert_eq!(batch.entries[1].addenda.len(), 0);
        // the indicator is forced on once addenda exist
        assert_eq!(batch.entries[0].detail.addenda_record_indicator, "1");
        assert_eq!(batch.entries[1].detail.addenda_record_indicator, "0");
        assert_eq!(batch.entry_addenda_count(), 4);
    }

    #[test]
    fn unknown_record_type_is_fatal_but_audited() {
        // bad discriminator on line 2 aborts assembly at that line
        let lines = vec![
            file_header_line(),
            format!("2{}", "2".repeat(93)),
            file_control_line(0, 0, 0, 0),
        ];
        let result = FileParser::parse(&lines.join("\n"));

        assert_eq!(result.raw_lines.len(), 3);
        match result.structure {
            Err(SequenceError::UnknownRecordType {
                line_number,
                type_char,
            }) => {
                assert_eq!(line_number, 2);
                assert_eq!(type_char, '2');
            }
            other => panic!("expected unknown record type, got {:?}", other),
        }
        // the offending raw line carries the sequence error too
        assert!(result.raw_lines[1]
            .errors
            .iter()
            .any(|e| e.contains("unknown record type")));
    }

    #[test]
    fn missing_file_header_is_fatal() {
        let lines = vec![
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
        ];
        let result = FileParser::parse(&lines.join("\n"));

        assert_eq!(result.raw_lines.len(), 2);
        match result.structure {
            Err(SequenceError::UnexpectedRecord { line_number, .. }) => {
                assert_eq!(line_number, 1)
            }
            other => panic!("expected unexpected record, got {:?}", other),
        }
    }

    #[test]
    fn entry_outside_batch_is_fatal() {
        let lines = vec![
            file_header_line(),
            entry_line("27", 10000, "076401250000001"),
        ];
        let result = FileParser::parse(&lines.join("\n"));
        assert!(matches!(
            result.structure,
            Err(SequenceError::UnexpectedRecord { line_number: 2, .. })
        ));
    }

    #[test]
    fn addenda_without_preceding_entry_is_fatal() {
        let lines = vec![file_header_line(), batch_header_line(1), addenda_line(1, 1)];
        let result = FileParser::parse(&lines.join("\n"));
        assert!(matches!(
            result.structure,
            Err(SequenceError::UnexpectedRecord { line_number: 3, .. })
        ));
    }

    #[test]
    fn file_control_with_open_batch_is_fatal() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
            file_control_line(1, 1, 10000, 0),
        ];
        let result = FileParser::parse(&lines.join("\n"));
        assert!(matches!(
            result.structure,
            Err(SequenceError::UnexpectedRecord { line_number: 4, .. })
        ));
    }

    #[test]
    fn second_file_header_is_fatal() {
        let lines = vec![file_header_line(), file_header_line()];
        let result = FileParser::parse(&lines.join("\n"));
        assert!(matches!(
            result.structure,
            Err(SequenceError::UnexpectedRecord { line_number: 2, .. })
        ));
    }

    #[test]
    fn truncated_file_is_fatal() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
        ];
        let result = FileParser::parse(&lines.join("\n"));
        assert!(matches!(
            result.structure,
            Err(SequenceError::TruncatedFile { last_line: 3 })
        ));
    }

    #[test]
    fn batch_numbers_must_strictly_increase() {
        let lines = vec![
            file_header_line(),
            batch_header_line(2),
            batch_control_line(2, 0, 0, 0),
            batch_header_line(2),
            batch_control_line(2, 0, 0, 0),
            file_control_line(2, 0, 0, 0),
        ];
        let result = FileParser::parse(&lines.join("\n"));
        assert!(matches!(
            result.structure,
            Err(SequenceError::BatchNumberNotIncreasing {
                line_number: 4,
                batch_number: 2,
                previous: 2,
            })
        ));
    }

    #[test]
    fn duplicate_trace_number_in_batch_is_fatal() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
            entry_line("22", 2500, "076401250000001"),
            batch_control_line(1, 2, 10000, 2500),
            file_control_line(1, 2, 10000, 2500),
        ];
        let result = FileParser::parse(&lines.join("\n"));

        // every line stays in the audit trail; line 4 carries the error
        assert_eq!(result.raw_lines.len(), 6);
        match result.structure {
            Err(SequenceError::DuplicateTraceNumber {
                line_number,
                batch_number,
                ref trace_number,
            }) => {
                assert_eq!(line_number, 4);
                assert_eq!(batch_number, 1);
                assert_eq!(trace_number, "076401250000001");
            }
            other => panic!("expected duplicate trace number, got {:?}", other),
        }
        assert!(result.raw_lines[3]
            .errors
            .iter()
            .any(|e| e.contains("duplicate trace number")));
    }

    #[test]
    fn same_trace_number_in_different_batches_is_allowed() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
            batch_control_line(1, 1, 10000, 0),
            batch_header_line(2),
            entry_line("27", 2000, "076401250000001"),
            batch_control_line(2, 1, 2000, 0),
            file_control_line(2, 2, 12000, 0),
        ];
        let result = FileParser::parse(&lines.join("\n"));
        assert!(result.is_structural());
    }

    #[test]
    fn block_filler_after_file_control_is_tolerated() {
        let lines = vec![
            file_header_line(),
            batch_header_line(1),
            entry_line("27", 10000, "076401250000001"),
            batch_control_line(1, 1, 10000, 0),
            file_control_line(1, 1, 10000, 0),
            "9".repeat(94),
            "9".repeat(94),
        ];
        let result = FileParser::parse(&lines.join("\n"));

        assert_eq!(result.raw_lines.len(), 7);
        assert!(result.is_structural());
        assert_eq!(result.structure.unwrap().batches.len(), 1);
    }
}
