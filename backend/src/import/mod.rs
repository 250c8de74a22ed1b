//! Two-phase roster import.
//!
//! - [`grouper`] - Phase 1, class discovery
//! - [`pipeline`] - Phase 2 and the public entry points
//! - [`progress`] - Progress callbacks and cancellation

pub mod grouper;
pub mod pipeline;
pub mod progress;

pub use grouper::{discover_classes, Discovery};
pub use pipeline::{
    draft_student, import_bytes, import_file, import_rows, preview, ClassPreview, ImportOptions,
    ImportPreview, StudentDraft,
};
pub use progress::{Cancellable, LogProgress, NoProgress, ProgressSink};

#[cfg(test)]
mod tests;
