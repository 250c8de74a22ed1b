//! # Enroll - bulk student enrollment from messy rosters
//!
//! Enroll reads school roster spreadsheets in whatever shape they arrive,
//! works out which class each student belongs to from weak textual signals
//! (file names, header rows), and creates the classes, students and
//! registration payments in the school backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Roster file │────▶│   Parser    │────▶│  Phase 1    │────▶│  Phase 2    │
//! │ xlsx / csv  │     │ (auto-enc)  │     │  classify   │     │  registries │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use enroll::{import_file, ImportOptions, LogProgress, MemoryRegistry, BranchId};
//!
//! #[tokio::main]
//! async fn main() {
//!     let branch = BranchId::new("main");
//!     let registry = MemoryRegistry::with_default_grade_levels(&branch);
//!     let options = ImportOptions::new(branch);
//!     let summary = import_file("5A.xlsx", &registry, &options, &mut LogProgress).await.unwrap();
//!     println!("{} students enrolled", summary.success_count);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (GradeLevelCode, ClassGroup, ImportSummary)
//! - [`parser`] - Spreadsheet decoding with auto-detection
//! - [`classify`] - Class-signal strategies
//! - [`normalize`] - Name, gender and birth-date normalization
//! - [`registry`] - Backend collaborators, classes and student ids
//! - [`import`] - Two-phase import pipeline
//! - [`template`] - Downloadable roster templates
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing and inference
pub mod classify;
pub mod normalize;
pub mod parser;

// Backend collaborators
pub mod registry;

// Pipeline
pub mod import;
pub mod template;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ImportError, ReadError, RegistryError, SequenceError, ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::remote::BranchId;
pub use models::{
    ClassGroup, ClassSignal, Gender, GradeLevelCode, ImportSummary, ParsedStudentRecord,
    SignalStrategy,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{read_bytes, read_file, CellValue, LogicalField, ParseResult, RawRow};

// =============================================================================
// Re-exports - Registries
// =============================================================================

pub use registry::{
    ClassRegistry, HttpRegistry, MemoryRegistry, Registry, StudentIdGenerator,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use import::{
    import_bytes, import_file, import_rows, preview, Cancellable, ImportOptions, ImportPreview,
    LogProgress, NoProgress, ProgressSink,
};

pub use config::EnrollConfig;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
