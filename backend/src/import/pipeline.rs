//! High-level import API: roster file in, enrolled students out.
//!
//! Combines every step: reading the sheet, class discovery (phase 1),
//! class/grade-level materialization and per-student creation (phase 2).
//!
//! # Example
//!
//! ```rust,ignore
//! use enroll::import::{import_file, ImportOptions, LogProgress};
//! use enroll::models::remote::BranchId;
//! use enroll::registry::MemoryRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let branch = BranchId::new("main-campus");
//!     let registry = MemoryRegistry::with_default_grade_levels(&branch);
//!     let summary = import_file(
//!         "5A.xlsx",
//!         &registry,
//!         &ImportOptions::new(branch),
//!         &mut LogProgress,
//!     ).await?;
//!
//!     println!("{} enrolled, {} failed", summary.success_count, summary.failed_count);
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;

use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::ImportError;
use crate::models::remote::{
    BranchId, Class, NewRegistrationPayment, NewStudent, PaymentKind, PaymentStatus,
};
use crate::models::{
    ClassGroup, ClassSignal, Gender, GradeLevelCode, ImportSummary, ParsedStudentRecord,
    StudentRow, StudentStatus,
};
use crate::normalize::{
    infer_gender, normalize_birth_date, parse_name, DateSource, GenderSource, NameParts,
};
use crate::parser::{self, CellValue, LogicalField, ParseResult, RawRow, SourceFormat};
use crate::registry::classes::{CAPACITY_FLOOR, DEFAULT_CLASS_CAPACITY};
use crate::registry::{ClassRegistry, Registry, StudentIdGenerator};

use super::grouper::{discover_classes, Discovery};
use super::progress::ProgressSink;

/// Per-run settings of an import session.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Tenant every record is written into.
    pub branch: BranchId,

    pub academic_year: i32,

    /// Reference date for the birth-date fallback.
    pub as_of: NaiveDate,

    /// Pause after this many students (0 disables the pause).
    pub throttle_every: usize,

    pub throttle_ms: u64,

    /// Registration fee seeded per created student; 0 skips seeding.
    pub registration_fee: f64,

    /// Capacity of newly created classes.
    pub default_capacity: u32,

    /// Lowest capacity a class is corrected to.
    pub capacity_floor: u32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        let today = Local::now().date_naive();
        Self {
            branch: BranchId::new("default"),
            academic_year: today.year(),
            as_of: today,
            throttle_every: 10,
            throttle_ms: 100,
            registration_fee: 0.0,
            default_capacity: DEFAULT_CLASS_CAPACITY,
            capacity_floor: CAPACITY_FLOOR,
        }
    }
}

impl ImportOptions {
    pub fn new(branch: BranchId) -> Self {
        Self {
            branch,
            ..Self::default()
        }
    }
}

// =============================================================================
// Student drafts (shared by preview and import)
// =============================================================================

/// Normalized fields of one roster student, before any id is assigned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    pub row_number: usize,
    pub full_name: String,
    pub name: NameParts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    pub gender: Gender,
    pub gender_source: GenderSource,
    pub date_of_birth: NaiveDate,
    pub date_source: DateSource,
}

/// Normalize a student row. `None` when the name has no usable token.
pub fn draft_student(student: &StudentRow, grade: GradeLevelCode, as_of: NaiveDate) -> Option<StudentDraft> {
    let name = parse_name(&student.full_name)?;
    let explicit = student.gender_hint.as_deref().map(CellValue::from_text);
    let (gender, gender_source) = infer_gender(explicit.as_ref(), &name.first_name);
    let (date_of_birth, date_source) =
        normalize_birth_date(student.row.get(LogicalField::DateOfBirth), grade, as_of);
    let mother_name = student
        .row
        .get_text(LogicalField::MotherName)
        .filter(|m| !m.trim().is_empty());

    Some(StudentDraft {
        row_number: student.row_number,
        full_name: student.full_name.clone(),
        name,
        mother_name,
        gender,
        gender_source,
        date_of_birth,
        date_source,
    })
}

// =============================================================================
// Preview
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPreview {
    pub class_name: String,
    pub grade_level: GradeLevelCode,
    pub students: Vec<StudentDraft>,
    /// Rows whose name could not be split.
    pub unparsed: Vec<String>,
}

/// Phase 1 plus per-student normalization; touches no registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub filename: String,
    pub filename_signal: Option<ClassSignal>,
    pub classes: Vec<ClassPreview>,
    pub header_rows: usize,
    pub skipped_rows: usize,
}

impl ImportPreview {
    pub fn student_count(&self) -> usize {
        self.classes.iter().map(|c| c.students.len()).sum()
    }
}

/// Dry-run class discovery and normalization.
pub fn preview<P>(
    rows: &[RawRow],
    filename: &str,
    as_of: NaiveDate,
    progress: &mut P,
) -> Result<ImportPreview, ImportError>
where
    P: ProgressSink + ?Sized,
{
    let discovery = discover_classes(rows, filename, progress)?;

    let classes = discovery
        .groups
        .into_iter()
        .map(|group| {
            let mut students = Vec::new();
            let mut unparsed = Vec::new();
            for student in &group.students {
                match draft_student(student, group.grade_level, as_of) {
                    Some(draft) => students.push(draft),
                    None => unparsed.push(student.full_name.clone()),
                }
            }
            ClassPreview {
                class_name: group.class_name,
                grade_level: group.grade_level,
                students,
                unparsed,
            }
        })
        .collect();

    Ok(ImportPreview {
        filename: filename.to_string(),
        filename_signal: discovery.filename_signal,
        classes,
        header_rows: discovery.header_rows,
        skipped_rows: discovery.skipped_rows,
    })
}

// =============================================================================
// Import entry points
// =============================================================================

/// Import a roster file from disk.
pub async fn import_file<R, P>(
    path: impl AsRef<Path>,
    registry: &R,
    options: &ImportOptions,
    progress: &mut P,
) -> Result<ImportSummary, ImportError>
where
    R: Registry + ?Sized,
    P: ProgressSink + ?Sized,
{
    let path = path.as_ref();
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parser::read_file(path)?;
    log_parse_result(&parsed);

    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    import_rows(&parsed.rows, filename, registry, options, progress).await
}

/// Import an uploaded roster; `filename` selects the decoder and may carry
/// the class.
pub async fn import_bytes<R, P>(
    bytes: &[u8],
    filename: &str,
    registry: &R,
    options: &ImportOptions,
    progress: &mut P,
) -> Result<ImportSummary, ImportError>
where
    R: Registry + ?Sized,
    P: ProgressSink + ?Sized,
{
    log_info(format!("📖 Reading {}...", filename));
    let parsed = parser::read_bytes(bytes, filename)?;
    log_parse_result(&parsed);
    import_rows(&parsed.rows, filename, registry, options, progress).await
}

/// Import already-decoded rows.
pub async fn import_rows<R, P>(
    rows: &[RawRow],
    filename: &str,
    registry: &R,
    options: &ImportOptions,
    progress: &mut P,
) -> Result<ImportSummary, ImportError>
where
    R: Registry + ?Sized,
    P: ProgressSink + ?Sized,
{
    log_info("🔎 Discovering classes...");
    let discovery = discover_classes(rows, filename, progress)?;
    log_discovery(&discovery);

    let summary = materialize(discovery.groups, registry, options, progress).await?;

    log_success(format!(
        "Import finished: {} enrolled, {} failed",
        summary.success_count, summary.failed_count
    ));
    if summary.payment_failures > 0 {
        log_warning(format!(
            "{} registration payments could not be recorded",
            summary.payment_failures
        ));
    }
    Ok(summary)
}

fn log_parse_result(parsed: &ParseResult) {
    match parsed.format {
        SourceFormat::Csv => {
            if let Some(encoding) = &parsed.encoding {
                log_success(format!("Detected encoding: {}", encoding));
            }
            if let Some(delimiter) = parsed.delimiter {
                log_success(format!("Detected separator: '{}'", format_delimiter(delimiter)));
            }
        }
        SourceFormat::Workbook => log_success("Read first worksheet"),
    }
    log_success(format!(
        "Read {} rows ({})",
        parsed.rows.len(),
        if parsed.has_header_row {
            "with header row"
        } else {
            "no header row"
        }
    ));
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

fn log_discovery(discovery: &Discovery) {
    for group in &discovery.groups {
        log_info_indent(
            format!("{}: {} students", group.class_name, group.students.len()),
            1,
        );
    }
    if discovery.skipped_rows > 0 {
        log_info(format!("{} rows skipped (no class or no name)", discovery.skipped_rows));
    }
}

// =============================================================================
// Phase 2
// =============================================================================

/// Outcome of one student create.
enum Created {
    Complete,
    PaymentFailed,
}

/// Create classes, correct capacities, then create students group by group.
async fn materialize<R, P>(
    groups: Vec<ClassGroup>,
    registry: &R,
    options: &ImportOptions,
    progress: &mut P,
) -> Result<ImportSummary, ImportError>
where
    R: Registry + ?Sized,
    P: ProgressSink + ?Sized,
{
    let total: usize = groups.iter().map(|g| g.students.len()).sum();
    let mut summary = ImportSummary {
        classes: groups.iter().map(|g| g.class_name.clone()).collect(),
        ..Default::default()
    };

    // Ids are reserved before any write so a registry outage aborts cleanly
    let mut ids = StudentIdGenerator::reserve(
        registry,
        &options.branch,
        options.academic_year,
        total as u32,
    )
    .await?;

    let mut classes = ClassRegistry::new(registry, options.branch.clone(), options.academic_year)
        .with_default_capacity(options.default_capacity);

    log_info("🏫 Materializing classes...");
    let mut resolved: Vec<Result<Class, String>> = Vec::with_capacity(groups.len());
    for group in &groups {
        match classes.find_or_create(&group.class_name, group.grade_level).await {
            Ok(class) => {
                let class = match classes
                    .correct_capacity(&class, group.students.len(), options.capacity_floor)
                    .await
                {
                    Ok(updated) => {
                        log_info_indent(
                            format!("{} capacity set to {}", group.class_name, updated.max_capacity),
                            1,
                        );
                        updated
                    }
                    Err(e) => {
                        log_warning(format!("Capacity of {} not corrected: {}", group.class_name, e));
                        class
                    }
                };
                resolved.push(Ok(class));
            }
            Err(e) => {
                log_error(format!("Class {} could not be resolved: {}", group.class_name, e));
                resolved.push(Err(e.to_string()));
            }
        }
    }
    recompute(&classes).await;

    log_info(format!("👩‍🎓 Creating {} students...", total));
    let mut created_per_class = vec![0usize; groups.len()];
    let mut processed = 0;

    'groups: for (gi, group) in groups.iter().enumerate() {
        for student in &group.students {
            let outcome = match &resolved[gi] {
                Ok(class) => create_student(registry, student, group, class, &mut ids, options).await,
                Err(e) => Err(format!("class could not be resolved: {}", e)),
            };

            match outcome {
                Ok(created) => {
                    summary.success_count += 1;
                    created_per_class[gi] += 1;
                    if matches!(created, Created::PaymentFailed) {
                        summary.payment_failures += 1;
                    }
                }
                Err(message) => {
                    let entry = format!("{} in {}: {}", student.full_name, group.class_name, message);
                    log_error(&entry);
                    summary.errors.push(entry);
                    summary.failed_count += 1;
                }
            }
            processed += 1;

            if options.throttle_every > 0
                && processed % options.throttle_every == 0
                && processed < total
            {
                tokio::time::sleep(Duration::from_millis(options.throttle_ms)).await;
            }

            let status = format!("{} ({})", student.full_name, group.class_name);
            if progress.report(processed, total, &status).is_break() && processed < total {
                let entry = format!("import cancelled after {} of {} students", processed, total);
                log_warning(&entry);
                summary.errors.push(entry);
                break 'groups;
            }
        }
    }

    for (gi, created) in created_per_class.into_iter().enumerate() {
        if created == 0 {
            continue;
        }
        if let Ok(class) = &resolved[gi] {
            if let Err(e) = classes.record_enrollment(class, created).await {
                log_warning(format!("Enrollment of {} not updated: {}", class.name, e));
            }
        }
    }
    recompute(&classes).await;

    Ok(summary)
}

async fn recompute<R: Registry + ?Sized>(classes: &ClassRegistry<'_, R>) {
    match classes.recompute_grade_levels().await {
        Ok(0) => log_info_indent("Grade-level totals already consistent", 1),
        Ok(n) => log_info_indent(format!("Recomputed {} grade-level totals", n), 1),
        Err(e) => log_warning(format!("Grade-level totals not recomputed: {}", e)),
    }
}

async fn create_student<R: Registry + ?Sized>(
    registry: &R,
    student: &StudentRow,
    group: &ClassGroup,
    class: &Class,
    ids: &mut StudentIdGenerator,
    options: &ImportOptions,
) -> Result<Created, String> {
    let draft = draft_student(student, group.grade_level, options.as_of)
        .ok_or_else(|| "name could not be parsed".to_string())?;
    let student_id = ids.next_id().map_err(|e| e.to_string())?;

    let NameParts {
        first_name,
        father_name,
        grandfather_name,
        last_name,
    } = draft.name;
    let record = ParsedStudentRecord {
        first_name,
        last_name,
        father_name,
        grandfather_name,
        mother_name: draft.mother_name,
        date_of_birth: draft.date_of_birth,
        gender: draft.gender,
        grade_level: group.grade_level,
        class_id: class.id.clone(),
        student_id,
        status: StudentStatus::Active,
    };

    let created = registry
        .create_student(NewStudent {
            record,
            branch_id: options.branch.clone(),
            academic_year: options.academic_year,
        })
        .await
        .map_err(|e| e.to_string())?;

    if options.registration_fee <= 0.0 {
        return Ok(Created::Complete);
    }

    let payment = NewRegistrationPayment {
        student_id: created.id.clone(),
        branch_id: options.branch.clone(),
        amount: options.registration_fee,
        kind: PaymentKind::RegistrationFee,
        status: PaymentStatus::Paid,
        academic_year: options.academic_year,
        paid_on: options.as_of,
    };
    match registry.create_payment(payment).await {
        Ok(()) => Ok(Created::Complete),
        Err(e) => {
            log_warning(format!(
                "Registration fee for {} ({}) not recorded: {}",
                student.full_name, created.student_id, e
            ));
            Ok(Created::PaymentFailed)
        }
    }
}
