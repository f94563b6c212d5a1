// Shared NACHA fixture builders for unit tests. Lines are produced through
// the codec's encode path so fixtures stay aligned with the column layout.

use crate::records::{
    AchRecord, Addenda, BatchControl, BatchHeader, EntryDetail, FileControl, FileHeader,
};

pub fn file_header_line() -> String {
    AchRecord::FileHeader(FileHeader {
        priority_code: "01".to_string(),
        immediate_destination: "076401251".to_string(),
        immediate_origin: "076401251".to_string(),
        file_creation_date: "240115".to_string(),
        file_creation_time: "1200".to_string(),
        file_id_modifier: "A".to_string(),
        record_size: "094".to_string(),
        blocking_factor: "10".to_string(),
        format_code: "1".to_string(),
        immediate_dest_name: "DEST BANK".to_string(),
        immediate_origin_name: "ORIGIN COMPANY".to_string(),
        reference_code: "".to_string(),
        raw_record: String::new(),
    })
    .encode()
}

pub fn batch_header_line(batch_number: u32) -> String {
    AchRecord::BatchHeader(BatchHeader {
        service_class_code: "220".to_string(),
        company_name: "ACME PAYROLL".to_string(),
        company_discretionary_data: "".to_string(),
        company_identification: "1234567890".to_string(),
        standard_entry_class_code: "PPD".to_string(),
        company_entry_description: "PAYROLL".to_string(),
        company_descriptive_date: "240116".to_string(),
        effective_entry_date: "240116".to_string(),
        settlement_date: "".to_string(),
        originator_status_code: "1".to_string(),
        originating_dfi_id: "07640125".to_string(),
        batch_number,
        raw_record: String::new(),
    })
    .encode()
}

pub fn entry_line(transaction_code: &str, amount: u64, trace: &str) -> String {
    AchRecord::EntryDetail(EntryDetail {
        transaction_code: transaction_code.to_string(),
        receiving_dfi_id: "09101298".to_string(),
        check_digit: "7".to_string(),
        dfi_account_number: "123456789".to_string(),
        amount,
        individual_id_number: "ID-0001".to_string(),
        individual_name: "JANE DOE".to_string(),
        discretionary_data: "".to_string(),
        addenda_record_indicator: "0".to_string(),
        trace_number: trace.to_string(),
        trace_sequence_number: None,
        raw_record: String::new(),
    })
    .encode()
}

pub fn addenda_line(sequence: u32, entry_sequence: u32) -> String {
    AchRecord::Addenda(Addenda {
        addenda_type_code: "05".to_string(),
        payment_related_info: "PAYMENT RELATED INFORMATION".to_string(),
        addenda_sequence_number: sequence,
        entry_detail_sequence_num: entry_sequence,
        raw_record: String::new(),
    })
    .encode()
}

pub fn batch_control_line(batch_number: u32, count: u32, debit: u64, credit: u64) -> String {
    AchRecord::BatchControl(BatchControl {
        service_class_code: "220".to_string(),
        entry_addenda_count: count,
        entry_hash: "0009101298".to_string(),
        total_debit_amount: debit,
        total_credit_amount: credit,
        company_identification: "1234567890".to_string(),
        message_auth_code: "".to_string(),
        reserved: "".to_string(),
        originating_dfi_id: "07640125".to_string(),
        batch_number,
        raw_record: String::new(),
    })
    .encode()
}

pub fn file_control_line(batch_count: u32, count: u32, debit: u64, credit: u64) -> String {
    AchRecord::FileControl(FileControl {
        batch_count,
        block_count: 1,
        entry_addenda_count: count,
        entry_hash: "0009101298".to_string(),
        total_debit_amount: debit,
        total_credit_amount: credit,
        reserved: "".to_string(),
        raw_record: String::new(),
    })
    .encode()
}

/// A minimal well-formed file: one batch, the given entries, correct totals
/// left to the caller via the control parameters.
pub fn single_batch_file(entry_lines: &[String], count: u32, debit: u64, credit: u64) -> String {
    let mut lines = vec![file_header_line(), batch_header_line(1)];
    lines.extend_from_slice(entry_lines);
    lines.push(batch_control_line(1, count, debit, credit));
    lines.push(file_control_line(1, count, debit, credit));
    lines.join("\n")
}
