//! Typed roster rows.
//!
//! Source files carry no fixed schema, so a [`RawRow`] keeps the sheet's own
//! column keys and resolves logical fields through ordered alias lists.

use serde::{Serialize, Serializer};

/// Key prefix used for blank or positional columns (`__EMPTY`, `__EMPTY_1`, ...).
pub const EMPTY_KEY: &str = "__EMPTY";

/// Scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Build from raw CSV text; blank text becomes [`CellValue::Empty`].
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Display form; integral numbers lose their `.0`.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Empty => String::new(),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Empty => serializer.serialize_none(),
        }
    }
}

/// Logical roster fields a row may carry under many spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalField {
    Name,
    Grade,
    Gender,
    DateOfBirth,
    MotherName,
}

impl LogicalField {
    /// Known column labels, most specific first. Compared after [`normalize_label`].
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            LogicalField::Name => &[
                "studentname",
                "fullname",
                "studentfullname",
                "nameofstudent",
                "name",
                "student",
                "pupil",
            ],
            LogicalField::Grade => &["grade", "gradelevel", "class", "level", "section"],
            LogicalField::Gender => &["gender", "sex", "genderms", "boygirl"],
            LogicalField::DateOfBirth => &[
                "dateofbirth",
                "birthdate",
                "dob",
                "birthday",
                "dateofbirthddmmyyyy",
                "birth",
            ],
            LogicalField::MotherName => &["mothername", "mothersname", "mother", "motherfullname"],
        }
    }
}

/// Lower-case a label and drop everything but letters and digits.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Positional key for column `index` (0-based).
pub fn positional_key(index: usize) -> String {
    if index == 0 {
        EMPTY_KEY.to_string()
    } else {
        format!("{}_{}", EMPTY_KEY, index)
    }
}

/// Ordered mapping of column key to cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: Vec<(String, CellValue)>) -> Self {
        Self { cells }
    }

    pub fn push(&mut self, key: impl Into<String>, value: CellValue) {
        self.cells.push((key.into(), value));
    }

    /// Cell stored under the exact column key.
    pub fn cell(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Resolve a logical field through its alias list; empty cells do not count.
    pub fn get(&self, field: LogicalField) -> Option<&CellValue> {
        let normalized: Vec<(String, &CellValue)> = self
            .cells
            .iter()
            .map(|(k, v)| (normalize_label(k), v))
            .collect();

        field.aliases().iter().find_map(|alias| {
            normalized
                .iter()
                .find(|(k, v)| k == alias && !v.is_empty())
                .map(|(_, v)| *v)
        })
    }

    pub fn get_text(&self, field: LogicalField) -> Option<String> {
        self.get(field).map(CellValue::to_text)
    }

    /// Non-empty cell values in column order.
    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.cells.iter().map(|(_, v)| v).filter(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// True when `label` names one of the roster fields (used for header-row detection).
pub fn is_roster_label(label: &str) -> bool {
    let normalized = normalize_label(label);
    !normalized.is_empty()
        && [
            LogicalField::Name,
            LogicalField::Gender,
            LogicalField::DateOfBirth,
            LogicalField::MotherName,
        ]
        .iter()
        .any(|f| f.aliases().contains(&normalized.as_str()))
}
