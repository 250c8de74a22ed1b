//! Synchronous progress reporting.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::logs::log_progress;

/// Receives `(current, total, status)` after each processed row.
///
/// Returning `ControlFlow::Break(())` stops the import before the next row.
/// Records already written stay written.
pub trait ProgressSink {
    fn report(&mut self, current: usize, total: usize, status: &str) -> ControlFlow<()>;
}

/// Plain closures observe progress and never cancel.
impl<F> ProgressSink for F
where
    F: FnMut(usize, usize, &str),
{
    fn report(&mut self, current: usize, total: usize, status: &str) -> ControlFlow<()> {
        self(current, total, status);
        ControlFlow::Continue(())
    }
}

/// Ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _: usize, _: usize, _: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Forwards progress to the log stream (`/api/logs` and stdout).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, current: usize, total: usize, status: &str) -> ControlFlow<()> {
        log_progress(current, total, status);
        ControlFlow::Continue(())
    }
}

/// Stops the wrapped sink's run once its flag is raised.
#[derive(Debug)]
pub struct Cancellable<S> {
    inner: S,
    cancelled: Arc<AtomicBool>,
}

impl<S> Cancellable<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that cancels the run when set.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl<S: ProgressSink> ProgressSink for Cancellable<S> {
    fn report(&mut self, current: usize, total: usize, status: &str) -> ControlFlow<()> {
        if self.inner.report(current, total, status).is_break()
            || self.cancelled.load(Ordering::Relaxed)
        {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}
