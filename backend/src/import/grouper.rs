//! Phase 1: discover which rows belong to which class.
//!
//! # Architecture
//!
//! ```text
//! file "5A.csv" ──▶ seed group GRADE 5 - A
//!
//! rows                          groups
//! ┌───────────────────────┐    ┌──────────────────────────┐
//! │ KG - B                │ ─▶ │ KG - B                   │  header row
//! │ Nour Samy Adel    F   │ ─▶ │   Nour Samy Adel         │  student
//! │ Homeroom teacher: ... │    │                          │  skipped
//! │ GRADE 2 - A           │ ─▶ │ GRADE 2 - A              │  header row
//! │ Omar Yusuf Mohammed   │ ─▶ │   Omar Yusuf Mohammed    │  student
//! └───────────────────────┘    └──────────────────────────┘
//! ```
//!
//! Groups keep first-seen order; a header naming an existing class resumes
//! that group.

use std::collections::HashMap;

use serde::Serialize;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::classify;
use crate::error::ImportError;
use crate::models::{ClassGroup, ClassSignal, StudentRow};
use crate::normalize::parse_gender_word;
use crate::parser::{CellValue, LogicalField, RawRow};

use super::progress::ProgressSink;

/// Words that never appear in a student's name.
const NON_NAME_WORDS: &[&str] = &[
    "teacher", "homeroom", "absent", "semester", "gender", "male", "female", "name", "names",
    "student", "students", "total", "class", "grade", "date", "birth", "signature", "principal",
    "term", "attendance", "present", "notes", "remarks", "number", "year", "section", "list",
];

/// Shortest unlabeled cell accepted as a name, in characters.
const MIN_NAME_LEN: usize = 6;

/// Outcome of phase 1.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discovery {
    /// Groups in first-seen order.
    pub groups: Vec<ClassGroup>,
    /// Signal taken from the filename, if any.
    pub filename_signal: Option<ClassSignal>,
    /// Rows consumed as class headers.
    pub header_rows: usize,
    /// Rows that were neither headers nor attributable students.
    pub skipped_rows: usize,
}

impl Discovery {
    pub fn student_count(&self) -> usize {
        self.groups.iter().map(|g| g.students.len()).sum()
    }
}

fn is_name_text(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_alphabetic() || c.is_whitespace() || matches!(c, '\'' | '-' | '.'))
}

fn has_non_name_word(text: &str) -> bool {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .any(|t| NON_NAME_WORDS.contains(&t.to_lowercase().as_str()))
}

/// Heuristic for an unlabeled cell: several alphabetic words, long enough,
/// free of roster vocabulary.
pub fn looks_like_name(text: &str) -> bool {
    let text = text.trim();
    let tokens: Vec<&str> = text.split_whitespace().collect();
    text.chars().count() >= MIN_NAME_LEN
        && tokens.len() >= 2
        && tokens.iter().all(|t| t.chars().any(char::is_alphabetic))
        && is_name_text(text)
        && !has_non_name_word(text)
}

/// Value of a labelled name column; single words are allowed there.
fn labelled_name(row: &RawRow) -> Option<String> {
    let text = row.get(LogicalField::Name)?.as_text()?.trim();
    let plausible = text.chars().any(char::is_alphabetic) && is_name_text(text) && !has_non_name_word(text);
    plausible.then(|| text.to_string())
}

/// The row's student name, if it has one.
pub fn student_name(row: &RawRow) -> Option<String> {
    labelled_name(row).or_else(|| {
        row.values()
            .filter_map(CellValue::as_text)
            .find(|t| looks_like_name(t))
            .map(|t| t.trim().to_string())
    })
}

/// Raw gender value: the labelled column, else any cell spelling a gender word.
fn gender_hint(row: &RawRow) -> Option<String> {
    if let Some(value) = row.get(LogicalField::Gender) {
        return Some(value.to_text());
    }
    row.values()
        .filter_map(CellValue::as_text)
        .find(|t| parse_gender_word(t).is_some())
        .map(String::from)
}

/// First cell carrying a class signal, a labelled grade column first.
fn row_signal(row: &RawRow) -> Option<(ClassSignal, &str)> {
    row.get(LogicalField::Grade)
        .into_iter()
        .chain(row.values())
        .filter_map(CellValue::as_text)
        .find_map(|text| classify::from_header_text(text).map(|s| (s, text)))
}

struct Groups {
    groups: Vec<ClassGroup>,
    index: HashMap<String, usize>,
}

impl Groups {
    fn new() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Position of the signal's group, creating it if new.
    fn open(&mut self, signal: &ClassSignal) -> usize {
        let name = signal.class_name();
        if let Some(&idx) = self.index.get(&name) {
            return idx;
        }
        log_success(format!(
            "Found class {} ({})",
            name,
            classify::strategy_name(signal.matched_strategy)
        ));
        self.groups.push(ClassGroup::from_signal(signal));
        self.index.insert(name, self.groups.len() - 1);
        self.groups.len() - 1
    }
}

/// Group roster rows into classes.
///
/// Fails with [`ImportError::NoClassesFound`] when neither the filename nor
/// any row yields a class, and with [`ImportError::Cancelled`] if `progress`
/// stops the scan.
pub fn discover_classes<P>(
    rows: &[RawRow],
    filename: &str,
    progress: &mut P,
) -> Result<Discovery, ImportError>
where
    P: ProgressSink + ?Sized,
{
    let mut groups = Groups::new();
    let mut header_rows = 0;
    let mut skipped_rows = 0;

    let filename_signal = classify::from_filename(filename);
    let seeded = filename_signal.as_ref().map(|signal| {
        log_info(format!("Filename suggests {}", signal.class_name()));
        groups.open(signal)
    });
    let mut current = seeded;

    let total = rows.len();
    for (i, row) in rows.iter().enumerate() {
        let row_number = i + 1;

        if let Some((signal, text)) = row_signal(row) {
            let idx = groups.open(&signal);
            current = Some(idx);

            // A labelled name next to a class cell is a per-row class column
            if let Some(name) = labelled_name(row).filter(|n| n.as_str() != text.trim()) {
                groups.groups[idx].students.push(StudentRow {
                    row_number,
                    full_name: name,
                    gender_hint: gender_hint(row),
                    row: row.clone(),
                });
            } else {
                header_rows += 1;
                if looks_like_name(text) {
                    log_warning(format!(
                        "Row {}: '{}' read as class header {}, not as a student",
                        row_number,
                        text,
                        signal.class_name()
                    ));
                }
            }
        } else {
            match (student_name(row), current) {
                (Some(full_name), Some(idx)) => groups.groups[idx].students.push(StudentRow {
                    row_number,
                    full_name,
                    gender_hint: gender_hint(row),
                    row: row.clone(),
                }),
                (Some(full_name), None) => {
                    log_warning(format!(
                        "Row {}: '{}' appears before any class header, skipped",
                        row_number, full_name
                    ));
                    skipped_rows += 1;
                }
                (None, _) => skipped_rows += 1,
            }
        }

        if progress
            .report(row_number, total, &format!("Scanning row {}", row_number))
            .is_break()
        {
            return Err(ImportError::Cancelled);
        }
    }

    let mut groups = groups.groups;
    if let Some(idx) = seeded {
        if header_rows > 0 && groups[idx].students.is_empty() {
            log_info(format!(
                "Sheet headers override filename class {}",
                groups[idx].class_name
            ));
            groups.remove(idx);
        }
    }

    if groups.is_empty() {
        return Err(ImportError::NoClassesFound {
            filename: filename.to_string(),
        });
    }

    Ok(Discovery {
        groups,
        filename_signal,
        header_rows,
        skipped_rows,
    })
}
