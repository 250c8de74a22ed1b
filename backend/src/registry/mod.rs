//! Remote school registries and the class/ID services built on them.
//!
//! The import engine talks to the school backend through four small CRUD
//! traits. [`Registry`] bundles them so the orchestrator can take a single
//! `&dyn Registry`.
//!
//! - [`memory::MemoryRegistry`] - in-process store used by tests and dry runs
//! - [`http::HttpRegistry`] - JSON client for the school backend
//! - [`classes::ClassRegistry`] - find-or-create and capacity bookkeeping
//! - [`student_id::StudentIdGenerator`] - collision-free `SCH-<year>-<nnnnn>` ids

pub mod classes;
pub mod http;
pub mod memory;
pub mod student_id;

pub use classes::ClassRegistry;
pub use http::HttpRegistry;
pub use memory::MemoryRegistry;
pub use student_id::StudentIdGenerator;

use async_trait::async_trait;

use crate::error::RegistryResult;
use crate::models::remote::{
    BranchId, CapacityUpdate, Class, GradeLevel, NewClass, NewRegistrationPayment, NewStudent,
    Student,
};
use crate::models::GradeLevelCode;

#[async_trait]
pub trait GradeLevelStore: Send + Sync {
    async fn list_grade_levels(&self, branch: &BranchId) -> RegistryResult<Vec<GradeLevel>>;

    /// Overwrite the level's capacity counters.
    async fn update_grade_level(&self, id: &str, update: CapacityUpdate) -> RegistryResult<()>;
}

#[async_trait]
pub trait ClassStore: Send + Sync {
    async fn list_classes(&self, branch: &BranchId) -> RegistryResult<Vec<Class>>;

    /// Create a class. Fails with `RegistryError::Conflict` when
    /// `(branch, name, academic year)` already exists.
    async fn create_class(&self, class: NewClass) -> RegistryResult<Class>;

    async fn update_class(&self, id: &str, update: CapacityUpdate) -> RegistryResult<()>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Every student of the branch, all pages.
    async fn list_students(&self, branch: &BranchId) -> RegistryResult<Vec<Student>>;

    async fn create_student(&self, student: NewStudent) -> RegistryResult<Student>;

    /// Atomically reserve `count` sequence numbers for `year`, returning the
    /// first one. `Ok(None)` means the backend has no sequence service.
    async fn reserve_student_ids(&self, year: i32, count: u32) -> RegistryResult<Option<u32>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment(&self, payment: NewRegistrationPayment) -> RegistryResult<()>;
}

/// Everything an import session needs from the backend.
pub trait Registry: GradeLevelStore + ClassStore + StudentStore + PaymentStore {}

impl<T> Registry for T where T: GradeLevelStore + ClassStore + StudentStore + PaymentStore {}

/// Find the registry grade level for `code`.
///
/// Exact code match first; then levels whose embedded number equals the
/// grade's number (`"Grade 5"`, `"G5"`); then named levels whose name or code
/// normalizes to the same tier (`"Pre KG"` for `pre_k`).
pub fn resolve_grade_level(levels: &[GradeLevel], code: GradeLevelCode) -> Option<&GradeLevel> {
    let wanted = code.code();
    if let Some(level) = levels
        .iter()
        .find(|l| l.code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(&wanted)))
    {
        return Some(level);
    }

    match code.number() {
        Some(n) => levels.iter().find(|l| {
            embedded_number(l.code.as_deref().unwrap_or_default()) == Some(n)
                || embedded_number(&l.name) == Some(n)
        }),
        None => levels.iter().find(|l| {
            GradeLevelCode::from_token(&l.name) == Some(code)
                || l.code.as_deref().and_then(GradeLevelCode::from_token) == Some(code)
        }),
    }
}

/// First run of digits in `text`, if it fits a grade number.
fn embedded_number(text: &str) -> Option<u8> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
