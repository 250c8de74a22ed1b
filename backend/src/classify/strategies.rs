//! Individual class-signal strategies.
//!
//! Each strategy is a pure function from normalized (upper-cased,
//! underscore-free, single-spaced) text to an optional `(grade, section)`.
//! Ordering lives in [`super::HEADER_STRATEGIES`] and
//! [`super::FILENAME_STRATEGIES`].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::models::GradeLevelCode;

/// Grade tokens spelled out in words. `PRE[ -]*KG?` also covers `PRE-K`.
const NAMED_GRADE: &str = r"PRE[\s-]*KG?|KG|PREP";

/// Separator between a named grade and its section: a dash/slash or a space.
const NAMED_SEP: &str = r"(?:\s*[-/]\s*|\s+)";

static DECORATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:GRADE|CLASS|LEVEL|STAGE)\s*[:=]\s*(?:({NAMED_GRADE}){NAMED_SEP}|(\d{{1,2}})\s*[-/]?\s*)([A-Z])([A-Z])?[\s.:-]*$"
    ))
    .expect("decorated header pattern")
});

static NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^({NAMED_GRADE}){NAMED_SEP}([A-Z])([A-Z])?[\s.:-]*$"))
        .expect("named grade pattern")
});

static NUMBERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:GRADE|CLASS|GR\.?)\s*(\d{1,2})\s*[-/]?\s*([A-Z])([A-Z])?[\s.:-]*$")
        .expect("numbered grade pattern")
});

static LOOSE_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b({NAMED_GRADE})\b[^A-Z0-9]*(?:(?:SECTION|SEC|CLASS)\b[^A-Z0-9]*)?\b([A-Z])\b"
    ))
    .expect("loose named grade pattern")
});

static LOOSE_NUMBERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:GRADE|CLASS|GR)\b[^A-Z0-9]*(\d{1,2})[^A-Z0-9]*(?:(?:SECTION|SEC)\b[^A-Z0-9]*)?([A-Z])\b",
    )
    .expect("loose numbered grade pattern")
});

static FILENAME_COMPACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:GRADE|CLASS|G)?\s*(\d{1,2})\s*[-\s]?\s*([A-Z])([A-Z])?$")
        .expect("filename pattern")
});

/// Resolve a section from one letter or a doubled letter (`AA` -> `A`).
fn section(first: Option<regex::Match<'_>>, second: Option<regex::Match<'_>>) -> Option<char> {
    let first = first?.as_str().chars().next()?;
    match second.and_then(|m| m.as_str().chars().next()) {
        None => Some(first),
        Some(second) if second == first => Some(first),
        Some(_) => None,
    }
}

fn grade_from(caps: &Captures<'_>, idx: usize) -> Option<GradeLevelCode> {
    caps.get(idx).and_then(|m| GradeLevelCode::from_token(m.as_str()))
}

/// `"GRADE : PRE KG - A"`, `"CLASS: 5 - B"`, `"GRADE = 3C"`.
pub fn decorated_header(text: &str) -> Option<(GradeLevelCode, char)> {
    let caps = DECORATED.captures(text)?;
    let grade = grade_from(&caps, 1).or_else(|| grade_from(&caps, 2))?;
    Some((grade, section(caps.get(3), caps.get(4))?))
}

/// `"KG - B"`, `"KG B"`, `"PRE KG / A"`, `"PREP-C"`.
pub fn named_grade(text: &str) -> Option<(GradeLevelCode, char)> {
    let caps = NAMED.captures(text)?;
    Some((grade_from(&caps, 1)?, section(caps.get(2), caps.get(3))?))
}

/// `"GRADE 5 - A"`, `"CLASS 5 A"`, `"GRADE 10B"`.
pub fn numbered_grade(text: &str) -> Option<(GradeLevelCode, char)> {
    let caps = NUMBERED.captures(text)?;
    Some((grade_from(&caps, 1)?, section(caps.get(2), caps.get(3))?))
}

/// Named grade anywhere in the text followed by a standalone section letter.
pub fn loose_named_grade(text: &str) -> Option<(GradeLevelCode, char)> {
    let caps = LOOSE_NAMED.captures(text)?;
    Some((grade_from(&caps, 1)?, section(caps.get(2), None)?))
}

/// `GRADE`/`CLASS` + number anywhere in the text, then a section letter.
pub fn loose_numbered_grade(text: &str) -> Option<(GradeLevelCode, char)> {
    let caps = LOOSE_NUMBERED.captures(text)?;
    Some((grade_from(&caps, 1)?, section(caps.get(2), None)?))
}

/// `"5AA"`, `"GRADE 5BB"`: doubled section letters only.
pub fn filename_double_section(stem: &str) -> Option<(GradeLevelCode, char)> {
    let caps = FILENAME_COMPACT.captures(stem)?;
    caps.get(3)?;
    Some((grade_from(&caps, 1)?, section(caps.get(2), caps.get(3))?))
}

/// `"5A"`, `"G5-B"`: single section letter.
pub fn filename_section(stem: &str) -> Option<(GradeLevelCode, char)> {
    let caps = FILENAME_COMPACT.captures(stem)?;
    if caps.get(3).is_some() {
        return None;
    }
    Some((grade_from(&caps, 1)?, section(caps.get(2), None)?))
}
