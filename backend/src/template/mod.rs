//! Downloadable blank rosters showing the header convention.

use rust_xlsxwriter::{Format, Workbook, XlsxError};

/// Class header placed above the roster block.
pub const TEMPLATE_CLASS_HEADER: &str = "GRADE 1 - A";

/// Column labels of the roster block.
pub const TEMPLATE_COLUMNS: [&str; 4] = ["Name", "Gender", "Date of Birth", "Mother Name"];

/// Example row; its name cells use roster vocabulary so imports skip it.
const SAMPLE_ROW: [&str; 4] = ["Student Full Name", "M", "2017-09-15", "Mother Full Name"];

/// CSV template.
pub fn csv_template() -> String {
    let mut out = String::new();
    out.push_str(TEMPLATE_CLASS_HEADER);
    out.push_str(&",".repeat(TEMPLATE_COLUMNS.len() - 1));
    out.push('\n');
    out.push_str(&TEMPLATE_COLUMNS.join(","));
    out.push('\n');
    out.push_str(&SAMPLE_ROW.join(","));
    out.push('\n');
    out
}

/// XLSX template, as file bytes.
pub fn xlsx_template() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Roster")?;

    sheet.write_string_with_format(0, 0, TEMPLATE_CLASS_HEADER, &bold)?;
    for (col, label) in TEMPLATE_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(1, col as u16, *label, &bold)?;
        sheet.set_column_width(col as u16, 22)?;
    }
    for (col, value) in SAMPLE_ROW.iter().enumerate() {
        sheet.write_string(2, col as u16, *value)?;
    }

    workbook.save_to_buffer()
}
