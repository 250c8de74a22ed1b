use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::atomic::Ordering;

use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;

use super::*;
use crate::error::ImportError;
use crate::models::remote::{BranchId, NewClass, Student};
use crate::models::{Gender, GradeLevelCode, ImportSummary, StudentStatus};
use crate::registry::MemoryRegistry;

fn branch() -> BranchId {
    BranchId::new("main-campus")
}

fn options() -> ImportOptions {
    ImportOptions {
        academic_year: 2024,
        as_of: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
        throttle_ms: 0,
        ..ImportOptions::new(branch())
    }
}

fn registry() -> MemoryRegistry {
    MemoryRegistry::with_default_grade_levels(&branch())
}

const GRADE_5_A: &str = "GRADE 5 - A
Ahmed Mohammed Ali
Sara Adel Nabil
Omar Yusuf Mohammed
Khaled Omar Said
Fatima Ahmed Said
Youssef Hassan Ibrahim
Mariam Samy Adel
Mahmoud Ali Hassan
Nour Fathy Salem
Hussein Khalid Mustafa
";

async fn import_csv(csv: &str, filename: &str, registry: &MemoryRegistry) -> ImportSummary {
    import_bytes(csv.as_bytes(), filename, registry, &options(), &mut NoProgress)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_header_block_end_to_end() {
    let registry = registry();
    let csv = "PRE KG - A\nAhmed Mohammed Ali\nAisha Hassan Ibrahim\n";
    let summary = import_csv(csv, "roster.csv", &registry).await;

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failed_count, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.classes, vec!["PRE-KG - A"]);

    let classes = registry.classes().await;
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name, "PRE-KG - A");
    assert_eq!(classes[0].grade_level_id, "gl-pre_k");
    assert_eq!(classes[0].academic_year, 2024);

    let created = registry.created_students().await;
    assert_eq!(created.len(), 2);
    let ahmed = &created[0].record;
    assert_eq!(ahmed.first_name, "Ahmed");
    assert_eq!(ahmed.father_name, "Mohammed");
    assert_eq!(ahmed.grandfather_name, "Ali");
    assert_eq!(ahmed.gender, Gender::Male);
    assert_eq!(ahmed.grade_level, GradeLevelCode::PreK);
    assert_eq!(ahmed.class_id, classes[0].id);
    assert_eq!(ahmed.status, StudentStatus::Active);
    assert_eq!(ahmed.date_of_birth, NaiveDate::from_ymd_opt(2020, 9, 1).unwrap());
    assert_eq!(created[1].record.gender, Gender::Female);
    assert_eq!(created[1].branch_id, branch());
}

#[tokio::test]
async fn test_failed_student_does_not_stop_the_run() {
    let registry = registry().fail_student("Khaled Omar Said");
    let summary = import_csv(GRADE_5_A, "roster.csv", &registry).await;

    assert_eq!(summary.success_count, 9);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("Khaled Omar Said in GRADE 5 - A:"));
    assert_eq!(registry.students().await.len(), 9);

    // Students after the failure were still created
    let created = registry.created_students().await;
    assert_eq!(created.last().unwrap().full_name(), "Hussein Khalid Mustafa");
}

#[tokio::test]
async fn test_capacity_and_grade_level_totals() {
    let registry = registry().fail_student("Khaled Omar Said");
    import_csv(GRADE_5_A, "roster.csv", &registry).await;

    let class = &registry.classes().await[0];
    assert_eq!(class.current_enrollment, 9);
    assert_eq!(class.max_capacity, 25);
    assert!(class.max_capacity >= class.current_enrollment);

    let levels = registry.grade_levels().await;
    let grade_5 = levels.iter().find(|l| l.id == "gl-grade_5").unwrap();
    assert_eq!(grade_5.current_enrollment, 9);
    assert_eq!(grade_5.max_capacity, 25);
    let kg = levels.iter().find(|l| l.id == "gl-kg").unwrap();
    assert_eq!(kg.max_capacity, 0);
}

#[tokio::test]
async fn test_reimport_reuses_classes_and_ids_stay_unique() {
    let registry = registry();
    import_csv(GRADE_5_A, "roster.csv", &registry).await;
    let summary = import_csv(GRADE_5_A, "roster.csv", &registry).await;

    assert_eq!(summary.success_count, 10);
    let classes = registry.classes().await;
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].current_enrollment, 20);
    assert!(classes[0].max_capacity >= 20);

    let students = registry.students().await;
    assert_eq!(students.len(), 20);
    let ids: HashSet<&str> = students.iter().map(|s| s.student_id.as_str()).collect();
    assert_eq!(ids.len(), 20);
    for id in &ids {
        assert!(id.starts_with("SCH-2024-"));
        assert_eq!(id.len(), "SCH-2024-00001".len());
    }
    assert!(ids.contains("SCH-2024-00001"));
    assert!(ids.contains("SCH-2024-00020"));
}

#[tokio::test]
async fn test_filename_only_workbook() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Ahmed Mohammed Ali").unwrap();
    sheet.write_string(0, 1, "M").unwrap();
    sheet.write_string(1, 0, "Sara Adel Nabil").unwrap();
    sheet.write_string(1, 1, "F").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let registry = registry();
    let summary = import_bytes(&bytes, "5BB.xlsx", &registry, &options(), &mut NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.classes, vec!["GRADE 5 - B"]);
    let created = registry.created_students().await;
    assert_eq!(created[1].record.gender, Gender::Female);
    assert_eq!(created[1].record.grade_level, GradeLevelCode::Grade(5));
}

#[tokio::test]
async fn test_gender_from_first_name() {
    let registry = registry();
    import_csv(
        "GRADE 2 - A\nFatima Ahmed Said\nOmar Yusuf Mohammed\n",
        "roster.csv",
        &registry,
    )
    .await;

    let created = registry.created_students().await;
    assert_eq!(created[0].record.gender, Gender::Female);
    assert_eq!(created[1].record.gender, Gender::Male);
}

#[tokio::test]
async fn test_per_row_class_column() {
    let registry = registry();
    let csv = "Name,Gender,Class\nZainab,2,KG - C\nOmar Yusuf Mohammed,1,GRADE 1 - B\n";
    let summary = import_csv(csv, "roster.csv", &registry).await;

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.classes, vec!["KG - C", "GRADE 1 - B"]);
    let created = registry.created_students().await;
    assert_eq!(created[0].full_name(), "Zainab");
    assert_eq!(created[0].record.gender, Gender::Female);
}

#[tokio::test]
async fn test_concurrently_created_class_is_reused() {
    let registry = registry().hide_classes(1);
    registry
        .seed_class(NewClass {
            name: "GRADE 5 - A".into(),
            grade_level_id: "gl-grade_5".into(),
            branch_id: branch(),
            academic_year: 2024,
            max_capacity: 30,
            current_enrollment: 12,
        })
        .await
        .unwrap();

    let summary = import_csv(GRADE_5_A, "roster.csv", &registry).await;

    assert_eq!(summary.success_count, 10);
    let classes = registry.classes().await;
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].current_enrollment, 22);
    assert_eq!(classes[0].max_capacity, 25);
}

#[tokio::test]
async fn test_unknown_grade_level_fails_its_students() {
    let registry = MemoryRegistry::new();
    let summary = import_csv("KG - B\nNour Samy Adel\nHana Fathy Salem\n", "roster.csv", &registry).await;

    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.failed_count, 2);
    assert!(summary.errors[0].contains("class could not be resolved"));
    assert!(registry.classes().await.is_empty());
}

#[tokio::test]
async fn test_registration_fee_is_seeded() {
    let registry = registry();
    let options = ImportOptions {
        registration_fee: 150.0,
        ..options()
    };
    let csv = "KG - A\nNour Samy Adel\nHana Fathy Salem\n";
    import_bytes(csv.as_bytes(), "roster.csv", &registry, &options, &mut NoProgress)
        .await
        .unwrap();

    let payments = registry.payments().await;
    let students = registry.students().await;
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].amount, 150.0);
    assert_eq!(payments[0].student_id, students[0].id);
    assert_eq!(payments[0].academic_year, 2024);
}

#[tokio::test]
async fn test_payment_failure_keeps_the_student() {
    let registry = registry().fail_payments();
    let options = ImportOptions {
        registration_fee: 150.0,
        ..options()
    };
    let csv = "KG - A\nNour Samy Adel\nHana Fathy Salem\n";
    let summary = import_bytes(csv.as_bytes(), "roster.csv", &registry, &options, &mut NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.payment_failures, 2);
    assert!(summary.errors.is_empty());
    assert_eq!(registry.students().await.len(), 2);
    assert!(registry.payments().await.is_empty());
}

#[tokio::test]
async fn test_ids_continue_after_scanned_maximum() {
    let registry = registry().without_sequence();
    registry
        .seed_student(Student {
            id: "s-1".into(),
            student_id: "SCH-2024-00007".into(),
            first_name: "Layla".into(),
            last_name: "Hassan".into(),
            class_id: None,
            branch_id: Some(branch()),
        })
        .await;

    import_csv("KG - A\nNour Samy Adel\nHana Fathy Salem\n", "roster.csv", &registry).await;

    let created = registry.created_students().await;
    assert_eq!(created[0].record.student_id, "SCH-2024-00008");
    assert_eq!(created[1].record.student_id, "SCH-2024-00009");
}

/// Stops once `stop_at` students have been processed.
struct StopAfter {
    stop_at: usize,
}

impl ProgressSink for StopAfter {
    fn report(&mut self, current: usize, _total: usize, status: &str) -> ControlFlow<()> {
        if !status.starts_with("Scanning") && current >= self.stop_at {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[tokio::test]
async fn test_cancel_during_student_creation() {
    let registry = registry();
    let summary = import_bytes(
        GRADE_5_A.as_bytes(),
        "roster.csv",
        &registry,
        &options(),
        &mut StopAfter { stop_at: 3 },
    )
    .await
    .unwrap();

    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.errors, vec!["import cancelled after 3 of 10 students"]);
    assert_eq!(registry.students().await.len(), 3);
    assert_eq!(registry.classes().await[0].current_enrollment, 3);
}

#[tokio::test]
async fn test_cancel_before_any_write() {
    let registry = registry();
    let mut progress = Cancellable::new(NoProgress);
    progress.flag().store(true, Ordering::Relaxed);

    let err = import_bytes(GRADE_5_A.as_bytes(), "roster.csv", &registry, &options(), &mut progress)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::Cancelled));
    assert!(registry.classes().await.is_empty());
}

#[tokio::test]
async fn test_no_class_signal_is_fatal() {
    let registry = registry();
    let err = import_bytes(
        b"Ahmed Mohammed Ali\nSara Adel Nabil\n",
        "roster.csv",
        &registry,
        &options(),
        &mut NoProgress,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ImportError::NoClassesFound { .. }));
    assert!(registry.students().await.is_empty());
}

#[tokio::test]
async fn test_progress_reaches_total() {
    let registry = registry();
    let mut last = (0, 0);
    let mut observe = |current: usize, total: usize, _: &str| last = (current, total);
    import_bytes(GRADE_5_A.as_bytes(), "roster.csv", &registry, &options(), &mut observe)
        .await
        .unwrap();

    assert_eq!(last, (10, 10));
}
