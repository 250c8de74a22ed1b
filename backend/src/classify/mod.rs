//! Class-signal classifier.
//!
//! Extracts a `(className, gradeLevel)` inference from either the uploaded
//! file's name or a header-like cell. Strategies are tried in a fixed
//! priority order, most decorated first and loosest last; the first match
//! wins. The class name is always rebuilt canonically
//! (`"<GRADE LABEL> - <SECTION>"`) so different phrasings of the same class
//! collapse onto one key.
//!
//! ```text
//! "Grade : _PRE KG - A___" ─┐
//! "PRE-KG / A"             ─┼──▶ ClassSignal { "PRE-KG - A", pre_k, 'A' }
//! "Homeroom PRE KG sec A"  ─┘
//! ```

pub mod strategies;

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ClassSignal, GradeLevelCode, SignalStrategy};

/// Cells longer than this are prose, not class headers.
pub const MAX_HEADER_LEN: usize = 80;

/// A named, independently testable inference rule.
pub struct Strategy {
    pub name: &'static str,
    pub kind: SignalStrategy,
    pub apply: fn(&str) -> Option<(GradeLevelCode, char)>,
}

/// Header strategies in priority order.
pub static HEADER_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "decorated header",
        kind: SignalStrategy::DecoratedHeader,
        apply: strategies::decorated_header,
    },
    Strategy {
        name: "named grade",
        kind: SignalStrategy::NamedGrade,
        apply: strategies::named_grade,
    },
    Strategy {
        name: "numbered grade",
        kind: SignalStrategy::NumberedGrade,
        apply: strategies::numbered_grade,
    },
    Strategy {
        name: "loose named grade",
        kind: SignalStrategy::LooseNamedGrade,
        apply: strategies::loose_named_grade,
    },
    Strategy {
        name: "loose numbered grade",
        kind: SignalStrategy::LooseNumberedGrade,
        apply: strategies::loose_numbered_grade,
    },
];

/// Filename strategies in priority order.
pub static FILENAME_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "filename double section",
        kind: SignalStrategy::FilenameDoubleSection,
        apply: strategies::filename_double_section,
    },
    Strategy {
        name: "filename section",
        kind: SignalStrategy::FilenameSection,
        apply: strategies::filename_section,
    },
];

/// Number of header strategies that require the whole cell to match.
const STRICT_HEADER_STRATEGIES: usize = 3;

static COPY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\(\d+\)|-\s*COPY|COPY)$").expect("copy suffix pattern"));

/// Upper-case, turn underscores into spaces and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn run(
    strategies: &[Strategy],
    raw: &str,
    normalized: &str,
) -> Option<ClassSignal> {
    strategies.iter().find_map(|s| {
        (s.apply)(normalized).map(|(grade_level, section)| ClassSignal {
            raw_text: raw.to_string(),
            matched_strategy: s.kind,
            grade_level,
            section,
        })
    })
}

/// Infer a class from a header-like cell.
///
/// Returns `None` when no strategy matches; callers then treat the text as a
/// possible student name.
pub fn from_header_text(text: &str) -> Option<ClassSignal> {
    let normalized = normalize_text(text);
    if normalized.is_empty() || normalized.chars().count() > MAX_HEADER_LEN {
        return None;
    }
    run(HEADER_STRATEGIES, text, &normalized)
}

/// Infer a class from an uploaded file's name (`"5AA.xlsx"`, `"5A.csv"`).
///
/// Compact patterns are tried first; a stem spelled like a header
/// (`"KG - B.xlsx"`) falls back to the strict header strategies.
pub fn from_filename(filename: &str) -> Option<ClassSignal> {
    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str())?;

    let normalized = normalize_text(stem);
    let normalized = COPY_SUFFIX.replace(&normalized, "").trim().to_string();
    if normalized.is_empty() {
        return None;
    }

    run(FILENAME_STRATEGIES, filename, &normalized)
        .or_else(|| run(&HEADER_STRATEGIES[..STRICT_HEADER_STRATEGIES], filename, &normalized))
}

/// Name of a strategy kind, for logs and previews.
pub fn strategy_name(kind: SignalStrategy) -> &'static str {
    HEADER_STRATEGIES
        .iter()
        .chain(FILENAME_STRATEGIES)
        .find(|s| s.kind == kind)
        .map(|s| s.name)
        .unwrap_or("unknown")
}
