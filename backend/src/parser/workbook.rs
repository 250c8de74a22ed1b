//! Workbook (xlsx/xls/ods) decoding via calamine. First worksheet only.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use super::row::CellValue;
use crate::error::{ReadError, ReadResult};

/// Decode the first worksheet of a workbook into a grid of cells.
pub fn read_first_sheet(bytes: &[u8]) -> ReadResult<Vec<Vec<CellValue>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ReadError::Workbook(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ReadError::Empty)?
        .map_err(|e| ReadError::Workbook(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect())
}

/// Map a calamine cell onto the pipeline's scalar model.
///
/// Dates stay Excel serial numbers so the date normalizer sees one encoding.
pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::String(s) => CellValue::from_text(s),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::from_text(s),
        _ => CellValue::Empty,
    }
}
