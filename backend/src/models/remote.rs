//! Entities exchanged with the remote school registries.
//!
//! Field names follow the backend's camelCase JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ParsedStudentRecord;

/// Tenant (school branch) an import session writes into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub String);

impl BranchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeLevel {
    pub id: String,
    /// Registry code; older tenants only carry a display name.
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub branch_id: BranchId,
    #[serde(default)]
    pub max_capacity: u32,
    #[serde(default)]
    pub current_enrollment: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub grade_level_id: String,
    pub branch_id: BranchId,
    pub academic_year: i32,
    #[serde(default)]
    pub max_capacity: u32,
    #[serde(default)]
    pub current_enrollment: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    pub grade_level_id: String,
    pub branch_id: BranchId,
    pub academic_year: i32,
    pub max_capacity: u32,
    pub current_enrollment: u32,
}

/// Absolute capacity counters written back to a class or grade level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityUpdate {
    pub max_capacity: u32,
    pub current_enrollment: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub student_id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(flatten)]
    pub record: ParsedStudentRecord,
    pub branch_id: BranchId,
    pub academic_year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    RegistrationFee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistrationPayment {
    /// Registry id of the created student.
    pub student_id: String,
    pub branch_id: BranchId,
    pub amount: f64,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub academic_year: i32,
    pub paid_on: NaiveDate,
}

impl NewStudent {
    /// Display name rebuilt from the parsed parts.
    pub fn full_name(&self) -> String {
        let r = &self.record;
        let mut parts = vec![r.first_name.as_str()];
        for part in [&r.father_name, &r.grandfather_name] {
            if !part.is_empty() {
                parts.push(part);
            }
        }
        if !r.last_name.is_empty() && (r.last_name != r.first_name || parts.len() > 1) {
            parts.push(&r.last_name);
        }
        parts.join(" ")
    }
}
