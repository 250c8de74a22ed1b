//! Domain models for the enrollment import pipeline.
//!
//! - [`GradeLevelCode`] - Enrollment tier (Pre-K, KG, Prep, Grade 1-12)
//! - [`ClassSignal`] - Provisional class inference extracted from text
//! - [`ClassGroup`] - Rows believed to belong to one class
//! - [`ParsedStudentRecord`] - A student ready to be persisted
//! - [`ImportSummary`] - Success/failure accounting for a run
//!
//! Entities owned by the remote registries live in [`remote`].

pub mod remote;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::parser::RawRow;

// =============================================================================
// Grade Level
// =============================================================================

/// Coarse enrollment tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum GradeLevelCode {
    PreK,
    Kg,
    Prep,
    /// Numbered grade, always in `1..=12`.
    Grade(u8),
}

impl GradeLevelCode {
    /// Build a numbered grade, rejecting values outside 1-12.
    pub fn grade(n: u32) -> Option<Self> {
        (1..=12).contains(&n).then_some(Self::Grade(n as u8))
    }

    /// Normalize a free-text grade token (`"PRE KG"`, `"kg"`, `"5"`, `"grade_5"`).
    pub fn from_token(token: &str) -> Option<Self> {
        let compact: String = token
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();

        match compact.as_str() {
            "PREKG" | "PREK" | "PREKINDERGARTEN" | "NURSERY" => return Some(Self::PreK),
            "KG" | "KINDERGARTEN" => return Some(Self::Kg),
            "PREP" | "PREPARATORY" => return Some(Self::Prep),
            _ => {}
        }

        let digits = compact
            .strip_prefix("GRADE")
            .or_else(|| compact.strip_prefix("CLASS"))
            .unwrap_or(&compact);
        digits.parse::<u32>().ok().and_then(Self::grade)
    }

    /// Stable code used by the registries (`pre_k`, `kg`, `prep`, `grade_5`).
    pub fn code(&self) -> String {
        match self {
            Self::PreK => "pre_k".to_string(),
            Self::Kg => "kg".to_string(),
            Self::Prep => "prep".to_string(),
            Self::Grade(n) => format!("grade_{}", n),
        }
    }

    /// Upper-case label used when rebuilding canonical class names.
    pub fn label(&self) -> String {
        match self {
            Self::PreK => "PRE-KG".to_string(),
            Self::Kg => "KG".to_string(),
            Self::Prep => "PREP".to_string(),
            Self::Grade(n) => format!("GRADE {}", n),
        }
    }

    /// Typical student age for this tier; drives the birth-date fallback.
    pub fn default_age(&self) -> u32 {
        match self {
            Self::PreK => 4,
            Self::Kg => 5,
            Self::Prep => 6,
            Self::Grade(n) => u32::from(*n) + 6,
        }
    }

    /// Number embedded in the tier, used by the fuzzy grade-level lookup.
    pub fn number(&self) -> Option<u8> {
        match self {
            Self::Grade(n) => Some(*n),
            _ => None,
        }
    }

    /// Canonical class name: `"<GRADE LABEL> - <SECTION>"`.
    pub fn class_name(&self, section: char) -> String {
        format!("{} - {}", self.label(), section.to_ascii_uppercase())
    }
}

impl std::fmt::Display for GradeLevelCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code())
    }
}

impl From<GradeLevelCode> for String {
    fn from(code: GradeLevelCode) -> Self {
        code.code()
    }
}

impl TryFrom<String> for GradeLevelCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_token(&value).ok_or_else(|| format!("unknown grade level '{}'", value))
    }
}

// =============================================================================
// Gender & Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Graduated,
}

// =============================================================================
// Class inference
// =============================================================================

/// Which strategy produced a [`ClassSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrategy {
    FilenameDoubleSection,
    FilenameSection,
    DecoratedHeader,
    NamedGrade,
    NumberedGrade,
    LooseNamedGrade,
    LooseNumberedGrade,
}

/// Provisional `(className, gradeLevel)` inference. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSignal {
    pub raw_text: String,
    pub matched_strategy: SignalStrategy,
    pub grade_level: GradeLevelCode,
    pub section: char,
}

impl ClassSignal {
    pub fn class_name(&self) -> String {
        self.grade_level.class_name(self.section)
    }
}

/// A roster row accepted as a student during class discovery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    /// 1-based row number in the source sheet.
    pub row_number: usize,
    /// Full name as it appeared in the sheet.
    pub full_name: String,
    /// Raw value of a gender column, when one was detected.
    pub gender_hint: Option<String>,
    #[serde(skip)]
    pub row: RawRow,
}

/// Rows believed to belong to one class.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub class_name: String,
    pub grade_level: GradeLevelCode,
    pub section: char,
    pub students: Vec<StudentRow>,
}

impl ClassGroup {
    pub fn from_signal(signal: &ClassSignal) -> Self {
        Self {
            class_name: signal.class_name(),
            grade_level: signal.grade_level,
            section: signal.section,
            students: Vec::new(),
        }
    }
}

// =============================================================================
// Parsed student
// =============================================================================

/// A student record ready for the Student registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStudentRecord {
    pub first_name: String,
    pub last_name: String,
    pub father_name: String,
    pub grandfather_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub grade_level: GradeLevelCode,
    pub class_id: String,
    pub student_id: String,
    pub status: StudentStatus,
}

// =============================================================================
// Import summary
// =============================================================================

/// Result of an import run; immutable once returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
    /// Students created whose registration-fee seed failed.
    #[serde(default)]
    pub payment_failures: usize,
    /// Canonical names of the classes touched by the run.
    #[serde(default)]
    pub classes: Vec<String>,
}

impl ImportSummary {
    /// First `limit` errors plus how many were left out.
    pub fn error_preview(&self, limit: usize) -> (&[String], usize) {
        let shown = &self.errors[..self.errors.len().min(limit)];
        (shown, self.errors.len() - shown.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_tokens() {
        assert_eq!(GradeLevelCode::from_token("PRE KG"), Some(GradeLevelCode::PreK));
        assert_eq!(GradeLevelCode::from_token("pre-k"), Some(GradeLevelCode::PreK));
        assert_eq!(GradeLevelCode::from_token("Kg"), Some(GradeLevelCode::Kg));
        assert_eq!(GradeLevelCode::from_token("PREP"), Some(GradeLevelCode::Prep));
        assert_eq!(GradeLevelCode::from_token("5"), Some(GradeLevelCode::Grade(5)));
        assert_eq!(GradeLevelCode::from_token("grade_12"), Some(GradeLevelCode::Grade(12)));
        assert_eq!(GradeLevelCode::from_token("13"), None);
        assert_eq!(GradeLevelCode::from_token("teacher"), None);
    }

    #[test]
    fn test_canonical_class_name() {
        assert_eq!(GradeLevelCode::PreK.class_name('a'), "PRE-KG - A");
        assert_eq!(GradeLevelCode::Grade(5).class_name('B'), "GRADE 5 - B");
    }

    #[test]
    fn test_default_ages() {
        assert_eq!(GradeLevelCode::PreK.default_age(), 4);
        assert_eq!(GradeLevelCode::Grade(1).default_age(), 7);
        assert_eq!(GradeLevelCode::Grade(12).default_age(), 18);
    }

    #[test]
    fn test_grade_code_serializes_as_string() {
        let json = serde_json::to_string(&GradeLevelCode::Grade(3)).unwrap();
        assert_eq!(json, "\"grade_3\"");
        let back: GradeLevelCode = serde_json::from_str("\"pre_k\"").unwrap();
        assert_eq!(back, GradeLevelCode::PreK);
    }

    #[test]
    fn test_error_preview() {
        let summary = ImportSummary {
            errors: (0..7).map(|i| format!("e{}", i)).collect(),
            ..Default::default()
        };
        let (shown, rest) = summary.error_preview(5);
        assert_eq!(shown.len(), 5);
        assert_eq!(rest, 2);
    }
}
