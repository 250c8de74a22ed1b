//! Error types for the enrollment import pipeline.
//!
//! This module defines one error type per layer:
//!
//! - [`ReadError`] - Spreadsheet decoding errors
//! - [`RegistryError`] - Failures of the remote school registries
//! - [`SequenceError`] - Student ID exhaustion
//! - [`ImportError`] - Top-level orchestration errors (the only ones a caller sees)
//! - [`ConfigError`] - Environment configuration errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

/// Conventions listed to the operator when no class could be inferred.
pub const ACCEPTED_CONVENTIONS: &str = "name the file after the class (e.g. \"5A.xlsx\", \"5BB.csv\") \
or put a class header row above each roster block (e.g. \"GRADE 5 - A\", \"KG - B\", \
\"Grade : _PRE KG - A___\")";

// =============================================================================
// Spreadsheet Errors
// =============================================================================

/// Errors while decoding an uploaded roster file.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Extension is not one of the accepted spreadsheet formats.
    #[error("Unsupported file type '{0}' (expected .xlsx, .xls or .csv)")]
    Unsupported(String),

    /// The workbook container could not be decoded.
    #[error("Invalid workbook: {0}")]
    Workbook(String),

    /// Invalid CSV content.
    #[error("Invalid CSV: {0}")]
    Csv(String),

    /// The file decoded but holds no sheet or no rows.
    #[error("Roster file is empty")]
    Empty,
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the remote Student/Class/GradeLevel registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Backend answered with a non-success status.
    #[error("Registry returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded.
    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),

    /// Entity lookup failed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness constraint violated on create.
    #[error("Already exists: {0}")]
    Conflict(String),

    /// The registry refused the write.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RegistryError::InvalidResponse(e.to_string())
        } else {
            RegistryError::Http(e.to_string())
        }
    }
}

// =============================================================================
// Student ID Errors
// =============================================================================

/// Failures to hand out a student identifier.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// The five-digit space for the year is used up.
    #[error("Student ID sequence for {year} is exhausted (last id SCH-{year}-99999)")]
    Exhausted { year: i32 },
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Fatal import errors.
///
/// Per-student and per-class failures never surface here; they are collected
/// into [`crate::models::ImportSummary::errors`].
#[derive(Debug, Error)]
pub enum ImportError {
    /// The uploaded file could not be decoded.
    #[error("Cannot read roster: {0}")]
    Read(#[from] ReadError),

    /// Phase 1 produced no class group at all.
    #[error("No class could be inferred from '{filename}'. To import, {}", ACCEPTED_CONVENTIONS)]
    NoClassesFound { filename: String },

    /// The progress sink stopped the run before any registry write.
    #[error("Import cancelled before any student was created")]
    Cancelled,

    /// A registry call needed before any per-row work failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },

    /// A variable the command needs is not set.
    #[error("Missing configuration: {0} is not set")]
    Missing(&'static str),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Import error.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server misconfiguration or internal failure.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for spreadsheet decoding.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let read_err = ReadError::Empty;
        let import_err: ImportError = read_err.into();
        assert!(import_err.to_string().contains("empty"));

        let reg_err = RegistryError::NotFound("grade level grade_5".into());
        let import_err: ImportError = reg_err.into();
        assert!(import_err.to_string().contains("grade_5"));
    }

    #[test]
    fn test_no_classes_message_lists_conventions() {
        let err = ImportError::NoClassesFound {
            filename: "roster.xlsx".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("roster.xlsx"));
        assert!(msg.contains("5A.xlsx"));
        assert!(msg.contains("GRADE 5 - A"));
    }
}
