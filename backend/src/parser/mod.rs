//! Roster spreadsheet reader with format, encoding and delimiter auto-detection.
//!
//! Decodes `.xlsx`/`.xls`/`.csv` into ordered [`RawRow`]s. No school-specific
//! inference happens here beyond deciding whether the first row is a header.

pub mod row;
pub mod workbook;

pub use row::{is_roster_label, normalize_label, positional_key, CellValue, LogicalField, RawRow};

use std::collections::HashSet;
use std::path::Path;

use crate::error::{ReadError, ReadResult};

/// Physical format of the uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    /// Pick the decoder from the filename extension.
    pub fn from_filename(filename: &str) -> ReadResult<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" | "txt" => Ok(SourceFormat::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(SourceFormat::Workbook),
            other => Err(ReadError::Unsupported(other.to_string())),
        }
    }
}

/// Result of reading a roster, with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Data rows in sheet order
    pub rows: Vec<RawRow>,
    /// Column keys (header labels or positional keys)
    pub headers: Vec<String>,
    /// Whether the first sheet row was consumed as a header
    pub has_header_row: bool,
    pub format: SourceFormat,
    /// Detected encoding (CSV only)
    pub encoding: Option<String>,
    /// Detected delimiter (CSV only)
    pub delimiter: Option<char>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // Anything else: UTF-8, lossy.
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Split CSV text into a grid of cells.
pub fn csv_grid(content: &str, delimiter: char) -> ReadResult<Vec<Vec<CellValue>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ReadError::Csv(format!("line {}: {}", idx + 1, e)))?;
        grid.push(record.iter().map(CellValue::from_text).collect());
    }
    Ok(grid)
}

/// Turn a cell grid into keyed rows.
///
/// A row naming roster fields ("Name", "Gender", ...) is a label row: it is
/// not emitted and re-keys every row below it. Rows above the first label row
/// are keyed positionally. Blank rows are dropped.
///
/// Returns the first key set, the data rows, and whether the sheet opened
/// with a label row.
pub fn grid_to_rows(grid: Vec<Vec<CellValue>>) -> (Vec<String>, Vec<RawRow>, bool) {
    let grid: Vec<Vec<CellValue>> = grid
        .into_iter()
        .filter(|cells| !cells.iter().all(CellValue::is_empty))
        .collect();

    let width = grid.iter().map(Vec::len).fold(0, usize::max);
    let has_header_row = grid.first().is_some_and(|first| is_label_row(first));

    let mut keys = header_keys(&[], width);
    let mut first_keys = None;
    let mut rows = Vec::new();

    for cells in grid {
        if is_label_row(&cells) {
            keys = header_keys(&cells, width);
            first_keys.get_or_insert_with(|| keys.clone());
            continue;
        }

        let mut row = RawRow::new();
        let mut cells = cells.into_iter();
        for key in &keys {
            row.push(key.clone(), cells.next().unwrap_or(CellValue::Empty));
        }
        rows.push(row);
    }

    let headers = if has_header_row {
        first_keys.unwrap_or(keys)
    } else {
        header_keys(&[], width)
    };
    (headers, rows, has_header_row)
}

/// A label row names at least one roster field and carries no numbers.
fn is_label_row(cells: &[CellValue]) -> bool {
    cells.iter().all(|c| c.as_number().is_none())
        && cells.iter().any(|c| c.as_text().is_some_and(is_roster_label))
}

/// Header labels for `width` columns; blank or repeated labels become positional keys.
fn header_keys(header: &[CellValue], width: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    (0..width)
        .map(|i| {
            let label = header.get(i).map(CellValue::to_text).unwrap_or_default();
            let label = label.trim().to_string();
            if !label.is_empty() && seen.insert(label.clone()) {
                label
            } else {
                positional_key(i)
            }
        })
        .collect()
}

/// Read a roster from bytes; `filename` selects the decoder.
pub fn read_bytes(bytes: &[u8], filename: &str) -> ReadResult<ParseResult> {
    if bytes.is_empty() {
        return Err(ReadError::Empty);
    }

    let format = SourceFormat::from_filename(filename)?;
    let (grid, encoding, delimiter) = match format {
        SourceFormat::Csv => {
            let encoding = detect_encoding(bytes);
            let content = decode_content(bytes, &encoding);
            let delimiter = detect_delimiter(&content);
            (csv_grid(&content, delimiter)?, Some(encoding), Some(delimiter))
        }
        SourceFormat::Workbook => (workbook::read_first_sheet(bytes)?, None, None),
    };

    let (headers, rows, has_header_row) = grid_to_rows(grid);
    if rows.is_empty() {
        return Err(ReadError::Empty);
    }

    Ok(ParseResult {
        rows,
        headers,
        has_header_row,
        format,
        encoding,
        delimiter,
    })
}

/// Read a roster file from disk.
pub fn read_file<P: AsRef<Path>>(path: P) -> ReadResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    read_bytes(&bytes, filename)
}
