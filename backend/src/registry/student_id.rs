//! Student identifier sequencing.
//!
//! Ids look like `SCH-2024-00042`. A session reserves one block of sequence
//! numbers up front, atomically when the backend offers a sequence service.
//! Otherwise the block is derived from a single scan of existing students,
//! which two concurrent imports can still race on.

use crate::api::logs::log_warning;
use crate::error::{RegistryResult, SequenceError};
use crate::models::remote::BranchId;

use super::StudentStore;

/// Highest sequence number representable in five digits.
pub const MAX_SEQUENCE: u32 = 99_999;

/// Render a student id.
pub fn format_student_id(year: i32, sequence: u32) -> String {
    format!("SCH-{}-{:05}", year, sequence)
}

/// Sequence number of `id` if it is a well-formed id for `year`.
pub fn parse_sequence(id: &str, year: i32) -> Option<u32> {
    let digits = id.strip_prefix(&format!("SCH-{}-", year))?;
    if digits.len() != 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// How the session's block was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceSource {
    /// Reserved through the backend's atomic counter.
    Reserved,
    /// Derived from the highest existing id.
    Scanned,
}

/// Hands out ids from a block reserved for one import session.
#[derive(Debug, Clone)]
pub struct StudentIdGenerator {
    year: i32,
    next: u32,
    source: SequenceSource,
}

impl StudentIdGenerator {
    /// Start handing out ids at `first`.
    pub fn starting_at(year: i32, first: u32, source: SequenceSource) -> Self {
        Self {
            year,
            next: first.max(1),
            source,
        }
    }

    /// Reserve `count` ids for `year`.
    pub async fn reserve<S>(
        store: &S,
        branch: &BranchId,
        year: i32,
        count: u32,
    ) -> RegistryResult<Self>
    where
        S: StudentStore + ?Sized,
    {
        if let Some(first) = store.reserve_student_ids(year, count).await? {
            return Ok(Self::starting_at(year, first, SequenceSource::Reserved));
        }

        log_warning(format!(
            "No student-id sequence service; scanning existing students for {}",
            year
        ));
        let students = store.list_students(branch).await?;
        let highest = students
            .iter()
            .filter_map(|s| parse_sequence(&s.student_id, year))
            .max()
            .unwrap_or(0);
        Ok(Self::starting_at(year, highest + 1, SequenceSource::Scanned))
    }

    pub fn source(&self) -> SequenceSource {
        self.source
    }

    /// Next id of the block.
    pub fn next_id(&mut self) -> Result<String, SequenceError> {
        if self.next > MAX_SEQUENCE {
            return Err(SequenceError::Exhausted { year: self.year });
        }
        let id = format_student_id(self.year, self.next);
        self.next += 1;
        Ok(id)
    }
}
