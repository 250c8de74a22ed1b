//! In-process registry.
//!
//! Backs `--dry-run` imports and the test suite. Enforces the same class
//! uniqueness constraint as the real backend and can be told to fail
//! specific writes.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::models::remote::{
    BranchId, CapacityUpdate, Class, GradeLevel, NewClass, NewRegistrationPayment, NewStudent,
    Student,
};
use crate::models::GradeLevelCode;

use super::student_id::parse_sequence;
use super::{ClassStore, GradeLevelStore, PaymentStore, StudentStore};

#[derive(Debug, Default)]
struct State {
    grade_levels: Vec<GradeLevel>,
    classes: Vec<Class>,
    students: Vec<Student>,
    created: Vec<NewStudent>,
    payments: Vec<NewRegistrationPayment>,
    /// Next free sequence number per year.
    sequences: HashMap<i32, u32>,
    failing_students: HashSet<String>,
    fail_payments: bool,
    /// Remaining `list_classes` calls that pretend no class exists.
    hidden_class_lists: usize,
}

/// Registry kept entirely in memory.
#[derive(Debug)]
pub struct MemoryRegistry {
    state: Mutex<State>,
    sequence_service: bool,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            sequence_service: true,
        }
    }

    /// Registry pre-populated with one grade level per tier for `branch`.
    pub fn with_default_grade_levels(branch: &BranchId) -> Self {
        let tiers = [GradeLevelCode::PreK, GradeLevelCode::Kg, GradeLevelCode::Prep]
            .into_iter()
            .chain((1..=12).map(GradeLevelCode::Grade));
        let levels = tiers
            .map(|code| GradeLevel {
                id: format!("gl-{}", code.code()),
                code: Some(code.code()),
                name: code.label(),
                branch_id: branch.clone(),
                max_capacity: 0,
                current_enrollment: 0,
            })
            .collect();
        Self::new().with_grade_levels(levels)
    }

    pub fn with_grade_levels(mut self, levels: Vec<GradeLevel>) -> Self {
        self.state.get_mut().grade_levels = levels;
        self
    }

    /// Behave like a backend without an atomic id sequence.
    pub fn without_sequence(mut self) -> Self {
        self.sequence_service = false;
        self
    }

    /// Reject student creates whose full name is `name`.
    pub fn fail_student(mut self, name: &str) -> Self {
        self.state.get_mut().failing_students.insert(name.to_string());
        self
    }

    /// Reject every registration-payment create.
    pub fn fail_payments(mut self) -> Self {
        self.state.get_mut().fail_payments = true;
        self
    }

    /// Make the next `calls` class listings come back empty, as if another
    /// import created the classes between our lookup and our create.
    pub fn hide_classes(mut self, calls: usize) -> Self {
        self.state.get_mut().hidden_class_lists = calls;
        self
    }

    pub async fn seed_class(&self, class: NewClass) -> RegistryResult<Class> {
        self.create_class(class).await
    }

    pub async fn seed_student(&self, student: Student) {
        self.state.lock().await.students.push(student);
    }

    pub async fn grade_levels(&self) -> Vec<GradeLevel> {
        self.state.lock().await.grade_levels.clone()
    }

    pub async fn classes(&self) -> Vec<Class> {
        self.state.lock().await.classes.clone()
    }

    pub async fn students(&self) -> Vec<Student> {
        self.state.lock().await.students.clone()
    }

    /// Full create payloads, in creation order.
    pub async fn created_students(&self) -> Vec<NewStudent> {
        self.state.lock().await.created.clone()
    }

    pub async fn payments(&self) -> Vec<NewRegistrationPayment> {
        self.state.lock().await.payments.clone()
    }
}

#[async_trait]
impl GradeLevelStore for MemoryRegistry {
    async fn list_grade_levels(&self, branch: &BranchId) -> RegistryResult<Vec<GradeLevel>> {
        let state = self.state.lock().await;
        Ok(state
            .grade_levels
            .iter()
            .filter(|l| &l.branch_id == branch)
            .cloned()
            .collect())
    }

    async fn update_grade_level(&self, id: &str, update: CapacityUpdate) -> RegistryResult<()> {
        let mut state = self.state.lock().await;
        let level = state
            .grade_levels
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| RegistryError::NotFound(format!("grade level {}", id)))?;
        level.max_capacity = update.max_capacity;
        level.current_enrollment = update.current_enrollment;
        Ok(())
    }
}

#[async_trait]
impl ClassStore for MemoryRegistry {
    async fn list_classes(&self, branch: &BranchId) -> RegistryResult<Vec<Class>> {
        let mut state = self.state.lock().await;
        if state.hidden_class_lists > 0 {
            state.hidden_class_lists -= 1;
            return Ok(Vec::new());
        }
        Ok(state
            .classes
            .iter()
            .filter(|c| &c.branch_id == branch)
            .cloned()
            .collect())
    }

    async fn create_class(&self, class: NewClass) -> RegistryResult<Class> {
        let mut state = self.state.lock().await;
        let exists = state.classes.iter().any(|c| {
            c.branch_id == class.branch_id
                && c.name == class.name
                && c.academic_year == class.academic_year
        });
        if exists {
            return Err(RegistryError::Conflict(format!(
                "class '{}' ({}) in branch {}",
                class.name, class.academic_year, class.branch_id
            )));
        }

        let created = Class {
            id: Uuid::new_v4().to_string(),
            name: class.name,
            grade_level_id: class.grade_level_id,
            branch_id: class.branch_id,
            academic_year: class.academic_year,
            max_capacity: class.max_capacity,
            current_enrollment: class.current_enrollment,
        };
        state.classes.push(created.clone());
        Ok(created)
    }

    async fn update_class(&self, id: &str, update: CapacityUpdate) -> RegistryResult<()> {
        let mut state = self.state.lock().await;
        let class = state
            .classes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RegistryError::NotFound(format!("class {}", id)))?;
        class.max_capacity = update.max_capacity;
        class.current_enrollment = update.current_enrollment;
        Ok(())
    }
}

#[async_trait]
impl StudentStore for MemoryRegistry {
    async fn list_students(&self, branch: &BranchId) -> RegistryResult<Vec<Student>> {
        let state = self.state.lock().await;
        Ok(state
            .students
            .iter()
            .filter(|s| s.branch_id.as_ref().map_or(true, |b| b == branch))
            .cloned()
            .collect())
    }

    async fn create_student(&self, student: NewStudent) -> RegistryResult<Student> {
        let mut state = self.state.lock().await;
        let full_name = student.full_name();
        if state.failing_students.contains(&full_name) {
            return Err(RegistryError::Rejected(format!(
                "student '{}' refused by registry",
                full_name
            )));
        }

        let record = &student.record;
        if state.students.iter().any(|s| s.student_id == record.student_id) {
            return Err(RegistryError::Conflict(format!(
                "student id {}",
                record.student_id
            )));
        }

        let created = Student {
            id: Uuid::new_v4().to_string(),
            student_id: record.student_id.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            class_id: Some(record.class_id.clone()),
            branch_id: Some(student.branch_id.clone()),
        };
        state.students.push(created.clone());
        state.created.push(student);
        Ok(created)
    }

    async fn reserve_student_ids(&self, year: i32, count: u32) -> RegistryResult<Option<u32>> {
        if !self.sequence_service {
            return Ok(None);
        }

        let mut state = self.state.lock().await;
        let highest = state
            .students
            .iter()
            .filter_map(|s| parse_sequence(&s.student_id, year))
            .max()
            .unwrap_or(0);
        let next = state.sequences.entry(year).or_insert(highest + 1);
        let first = *next;
        *next += count;
        Ok(Some(first))
    }
}

#[async_trait]
impl PaymentStore for MemoryRegistry {
    async fn create_payment(&self, payment: NewRegistrationPayment) -> RegistryResult<()> {
        let mut state = self.state.lock().await;
        if state.fail_payments {
            return Err(RegistryError::Rejected(
                "payment registry unavailable".to_string(),
            ));
        }
        state.payments.push(payment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_class(branch: &BranchId, name: &str) -> NewClass {
        NewClass {
            name: name.into(),
            grade_level_id: "gl-kg".into(),
            branch_id: branch.clone(),
            academic_year: 2024,
            max_capacity: 50,
            current_enrollment: 0,
        }
    }

    #[tokio::test]
    async fn test_default_grade_levels() {
        let branch = BranchId::new("b1");
        let registry = MemoryRegistry::with_default_grade_levels(&branch);
        let levels = registry.list_grade_levels(&branch).await.unwrap();
        assert_eq!(levels.len(), 15);
        assert!(levels.iter().any(|l| l.code.as_deref() == Some("grade_12")));
        assert!(registry
            .list_grade_levels(&BranchId::new("other"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_class_unique_constraint() {
        let branch = BranchId::new("b1");
        let registry = MemoryRegistry::new();
        registry.create_class(new_class(&branch, "KG - A")).await.unwrap();

        let err = registry
            .create_class(new_class(&branch, "KG - A"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));

        // Same name in another branch is a different class
        registry
            .create_class(new_class(&BranchId::new("b2"), "KG - A"))
            .await
            .unwrap();
        assert_eq!(registry.classes().await.len(), 2);
    }

    #[tokio::test]
    async fn test_hidden_class_listing() {
        let branch = BranchId::new("b1");
        let registry = MemoryRegistry::new().hide_classes(1);
        registry.create_class(new_class(&branch, "KG - A")).await.unwrap();

        assert!(registry.list_classes(&branch).await.unwrap().is_empty());
        assert_eq!(registry.list_classes(&branch).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_class() {
        let registry = MemoryRegistry::new();
        let update = CapacityUpdate {
            max_capacity: 25,
            current_enrollment: 0,
        };
        assert!(matches!(
            registry.update_class("missing", update).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sequence_service_toggle() {
        let registry = MemoryRegistry::new().without_sequence();
        assert_eq!(registry.reserve_student_ids(2024, 5).await.unwrap(), None);
    }
}
