//! REST API response types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::ImportSummary;

/// Errors shown inline; the rest are only counted.
pub const ERROR_PREVIEW_LIMIT: usize = 20;

/// Response sent after an import upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// Identifier minted for this response; log stream entries do not carry it
    pub job_id: String,

    /// "ok", "partial" or "failed"
    pub status: String,

    pub filename: String,

    pub success_count: usize,
    pub failed_count: usize,
    pub payment_failures: usize,
    pub classes: Vec<String>,

    /// First errors of the run
    pub errors: Vec<String>,

    /// Errors left out of `errors`
    pub more_errors: usize,
}

impl ImportResponse {
    pub fn new(filename: impl Into<String>, summary: &ImportSummary) -> Self {
        let status = match (summary.success_count, summary.errors.is_empty()) {
            (_, true) => "ok",
            (0, false) => "failed",
            _ => "partial",
        };
        let (shown, more_errors) = summary.error_preview(ERROR_PREVIEW_LIMIT);

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            filename: filename.into(),
            success_count: summary.success_count,
            failed_count: summary.failed_count,
            payment_failures: summary.payment_failures,
            classes: summary.classes.clone(),
            errors: shown.to_vec(),
            more_errors,
        }
    }
}

/// Create an error response
pub fn error_response(message: &str) -> Value {
    json!({
        "status": "error",
        "error": message
    })
}
