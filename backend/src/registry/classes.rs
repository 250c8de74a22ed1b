//! Class find-or-create and capacity bookkeeping.

use std::collections::HashMap;

use crate::api::logs::{log_info_indent, log_success, log_warning_indent};
use crate::error::{RegistryError, RegistryResult};
use crate::models::remote::{BranchId, CapacityUpdate, Class, GradeLevel, NewClass};
use crate::models::GradeLevelCode;

use super::{resolve_grade_level, Registry};

/// Default capacity for a freshly created class.
pub const DEFAULT_CLASS_CAPACITY: u32 = 50;

/// Lowest capacity a class is corrected down to.
pub const CAPACITY_FLOOR: u32 = 25;

/// Class operations scoped to one branch and academic year.
pub struct ClassRegistry<'a, R: Registry + ?Sized> {
    registry: &'a R,
    branch: BranchId,
    academic_year: i32,
    default_capacity: u32,
    grade_levels: Option<Vec<GradeLevel>>,
}

impl<'a, R: Registry + ?Sized> ClassRegistry<'a, R> {
    pub fn new(registry: &'a R, branch: BranchId, academic_year: i32) -> Self {
        Self {
            registry,
            branch,
            academic_year,
            default_capacity: DEFAULT_CLASS_CAPACITY,
            grade_levels: None,
        }
    }

    pub fn with_default_capacity(mut self, capacity: u32) -> Self {
        self.default_capacity = capacity;
        self
    }

    async fn find(&self, name: &str) -> RegistryResult<Option<Class>> {
        let classes = self.registry.list_classes(&self.branch).await?;
        Ok(classes
            .into_iter()
            .find(|c| c.name == name && c.academic_year == self.academic_year))
    }

    async fn grade_level_id(&mut self, code: GradeLevelCode) -> RegistryResult<String> {
        if self.grade_levels.is_none() {
            self.grade_levels = Some(self.registry.list_grade_levels(&self.branch).await?);
        }
        let levels = self.grade_levels.as_deref().unwrap_or_default();
        resolve_grade_level(levels, code)
            .map(|l| l.id.clone())
            .ok_or_else(|| RegistryError::NotFound(format!("grade level {}", code)))
    }

    /// Return the class named `name` for this year, creating it if absent.
    ///
    /// A uniqueness conflict on create means a concurrent import won the
    /// race; the class is re-listed and reused.
    pub async fn find_or_create(&mut self, name: &str, grade: GradeLevelCode) -> RegistryResult<Class> {
        if let Some(class) = self.find(name).await? {
            log_info_indent(format!("Using existing class {} ({})", name, class.id), 1);
            return Ok(class);
        }

        let grade_level_id = self.grade_level_id(grade).await?;
        let new_class = NewClass {
            name: name.to_string(),
            grade_level_id,
            branch_id: self.branch.clone(),
            academic_year: self.academic_year,
            max_capacity: self.default_capacity,
            current_enrollment: 0,
        };

        match self.registry.create_class(new_class).await {
            Ok(class) => {
                log_success(format!("Created class {} ({})", name, class.id));
                Ok(class)
            }
            Err(RegistryError::Conflict(detail)) => {
                log_info_indent(format!("Class {} already exists, reusing it", name), 1);
                self.find(name)
                    .await?
                    .ok_or(RegistryError::Conflict(detail))
            }
            Err(e) => Err(e),
        }
    }

    /// Size the class for `incoming` new students: at least the floor, and
    /// room for everyone already enrolled plus the newcomers.
    pub async fn correct_capacity(
        &self,
        class: &Class,
        incoming: usize,
        floor: u32,
    ) -> RegistryResult<Class> {
        let needed = class.current_enrollment.saturating_add(incoming as u32);
        let update = CapacityUpdate {
            max_capacity: needed.max(floor),
            current_enrollment: class.current_enrollment,
        };
        self.registry.update_class(&class.id, update).await?;
        Ok(Class {
            max_capacity: update.max_capacity,
            ..class.clone()
        })
    }

    /// Add `created` students to the class's enrollment counter.
    pub async fn record_enrollment(&self, class: &Class, created: usize) -> RegistryResult<Class> {
        let current_enrollment = class.current_enrollment.saturating_add(created as u32);
        let update = CapacityUpdate {
            max_capacity: class.max_capacity.max(current_enrollment),
            current_enrollment,
        };
        self.registry.update_class(&class.id, update).await?;
        Ok(Class {
            max_capacity: update.max_capacity,
            current_enrollment,
            ..class.clone()
        })
    }

    /// Rewrite every grade level's counters as the sum over all of its
    /// classes in the branch. Returns how many levels changed.
    pub async fn recompute_grade_levels(&self) -> RegistryResult<usize> {
        let levels = self.registry.list_grade_levels(&self.branch).await?;
        let classes = self.registry.list_classes(&self.branch).await?;

        let mut totals: HashMap<&str, CapacityUpdate> = HashMap::new();
        for class in &classes {
            let total = totals
                .entry(class.grade_level_id.as_str())
                .or_insert(CapacityUpdate {
                    max_capacity: 0,
                    current_enrollment: 0,
                });
            total.max_capacity += class.max_capacity;
            total.current_enrollment += class.current_enrollment;
        }

        let mut changed = 0;
        for level in &levels {
            let update = totals.get(level.id.as_str()).copied().unwrap_or(CapacityUpdate {
                max_capacity: 0,
                current_enrollment: 0,
            });
            if update.max_capacity == level.max_capacity
                && update.current_enrollment == level.current_enrollment
            {
                continue;
            }
            match self.registry.update_grade_level(&level.id, update).await {
                Ok(()) => changed += 1,
                Err(e) => log_warning_indent(
                    format!("Could not update grade level {}: {}", level.name, e),
                    1,
                ),
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{GradeLevelStore, MemoryRegistry};

    fn setup() -> (BranchId, MemoryRegistry) {
        let branch = BranchId::new("b1");
        let registry = MemoryRegistry::with_default_grade_levels(&branch);
        (branch, registry)
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let (branch, registry) = setup();
        let mut classes = ClassRegistry::new(&registry, branch.clone(), 2024);

        let first = classes.find_or_create("KG - B", GradeLevelCode::Kg).await.unwrap();
        let second = classes.find_or_create("KG - B", GradeLevelCode::Kg).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.grade_level_id, "gl-kg");
        assert_eq!(first.max_capacity, DEFAULT_CLASS_CAPACITY);
        assert_eq!(registry.classes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_other_year_is_a_different_class() {
        let (branch, registry) = setup();
        let a = ClassRegistry::new(&registry, branch.clone(), 2023)
            .find_or_create("KG - B", GradeLevelCode::Kg)
            .await
            .unwrap();
        let b = ClassRegistry::new(&registry, branch, 2024)
            .find_or_create("KG - B", GradeLevelCode::Kg)
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_conflict_reuses_existing_class() {
        let (branch, registry) = setup();
        let existing = ClassRegistry::new(&registry, branch.clone(), 2024)
            .find_or_create("GRADE 5 - A", GradeLevelCode::Grade(5))
            .await
            .unwrap();

        // Next lookup misses, so the create hits the unique constraint
        let registry = registry.hide_classes(1);
        let mut classes = ClassRegistry::new(&registry, branch, 2024);
        let reused = classes
            .find_or_create("GRADE 5 - A", GradeLevelCode::Grade(5))
            .await
            .unwrap();
        assert_eq!(reused.id, existing.id);
        assert_eq!(registry.classes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_grade_level() {
        let branch = BranchId::new("b1");
        let registry = MemoryRegistry::new();
        let err = ClassRegistry::new(&registry, branch, 2024)
            .find_or_create("KG - A", GradeLevelCode::Kg)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_capacity_and_grade_level_totals() {
        let (branch, registry) = setup();
        let mut classes = ClassRegistry::new(&registry, branch.clone(), 2024);

        let a = classes.find_or_create("KG - A", GradeLevelCode::Kg).await.unwrap();
        let b = classes.find_or_create("KG - B", GradeLevelCode::Kg).await.unwrap();

        let a = classes.correct_capacity(&a, 3, CAPACITY_FLOOR).await.unwrap();
        let b = classes.correct_capacity(&b, 40, CAPACITY_FLOOR).await.unwrap();
        assert_eq!(a.max_capacity, 25);
        assert_eq!(b.max_capacity, 40);

        classes.record_enrollment(&a, 3).await.unwrap();
        classes.record_enrollment(&b, 39).await.unwrap();
        assert_eq!(classes.recompute_grade_levels().await.unwrap(), 1);

        let kg = registry
            .list_grade_levels(&branch)
            .await
            .unwrap()
            .into_iter()
            .find(|l| l.id == "gl-kg")
            .unwrap();
        assert_eq!(kg.max_capacity, 65);
        assert_eq!(kg.current_enrollment, 42);

        // Nothing drifted since
        assert_eq!(classes.recompute_grade_levels().await.unwrap(), 0);
    }
}
