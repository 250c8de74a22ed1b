//! Birth-date normalization.

use chrono::{DateTime, Duration, Months, NaiveDate};
use serde::Serialize;

use crate::models::GradeLevelCode;
use crate::parser::CellValue;

/// Text layouts accepted for dates, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d",
];

/// Day zero of spreadsheet serial dates (accounts for the 1900 leap-year bug).
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Serial of 9999-12-31, the last date spreadsheets can represent.
const MAX_SERIAL: f64 = 2_958_465.0;

/// Where a normalized date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Serial,
    Text,
    GradeFallback,
}

/// Convert a spreadsheet serial (days since 1899-12-30) to a date.
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..MAX_SERIAL + 1.0).contains(&serial) {
        return None;
    }
    let seconds = (serial * 86_400.0).round() as i64;
    serial_epoch()
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::try_seconds(seconds)?)
        .map(|dt| dt.date())
}

/// Parse a date written as text; bare numbers are treated as serials.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(serial) = text.parse::<f64>() {
        return from_serial(serial);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Approximate birth date for a grade: `as_of` minus the grade's typical age.
pub fn fallback_birth_date(grade: GradeLevelCode, as_of: NaiveDate) -> NaiveDate {
    as_of
        .checked_sub_months(Months::new(grade.default_age() * 12))
        .unwrap_or(as_of)
}

/// Normalize a birth-date cell, falling back to the grade's typical age.
pub fn normalize_birth_date(
    value: Option<&CellValue>,
    grade: GradeLevelCode,
    as_of: NaiveDate,
) -> (NaiveDate, DateSource) {
    let parsed = match value {
        Some(CellValue::Number(n)) => from_serial(*n).map(|d| (d, DateSource::Serial)),
        Some(CellValue::Text(s)) => parse_date_text(s).map(|d| {
            let source = if s.trim().parse::<f64>().is_ok() {
                DateSource::Serial
            } else {
                DateSource::Text
            };
            (d, source)
        }),
        _ => None,
    };

    parsed.unwrap_or_else(|| (fallback_birth_date(grade, as_of), DateSource::GradeFallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(from_serial(45000.0), Some(ymd(2023, 3, 15)));
        assert_eq!(from_serial(1.0), Some(ymd(1899, 12, 31)));
        assert_eq!(from_serial(0.0), None);
        assert_eq!(from_serial(f64::NAN), None);
        assert_eq!(from_serial(MAX_SERIAL), Some(ymd(9999, 12, 31)));
        assert_eq!(from_serial(123_456_789_012.0), None);
        assert_eq!(from_serial(f64::MAX), None);
        assert_eq!(parse_date_text("123456789012"), None);
    }

    #[test]
    fn test_text_formats() {
        assert_eq!(parse_date_text("2015-03-01"), Some(ymd(2015, 3, 1)));
        assert_eq!(parse_date_text("25/12/2016"), Some(ymd(2016, 12, 25)));
        assert_eq!(parse_date_text("12/25/2016"), Some(ymd(2016, 12, 25)));
        assert_eq!(parse_date_text("01.02.2014"), Some(ymd(2014, 2, 1)));
        assert_eq!(parse_date_text("2014-02-01T00:00:00Z"), Some(ymd(2014, 2, 1)));
        assert_eq!(parse_date_text("45000"), Some(ymd(2023, 3, 15)));
        assert_eq!(parse_date_text("unknown"), None);
    }

    #[test]
    fn test_grade_fallback() {
        let as_of = ymd(2024, 9, 1);
        let (date, source) = normalize_birth_date(None, GradeLevelCode::Grade(5), as_of);
        assert_eq!(date, ymd(2013, 9, 1));
        assert_eq!(source, DateSource::GradeFallback);

        let bad = CellValue::Text("n/a".into());
        let (date, _) = normalize_birth_date(Some(&bad), GradeLevelCode::PreK, as_of);
        assert_eq!(date, ymd(2020, 9, 1));

        // A national id typed into the birth-date column
        let id = CellValue::Text("123456789012".into());
        let (date, source) = normalize_birth_date(Some(&id), GradeLevelCode::Kg, as_of);
        assert_eq!(date, ymd(2019, 9, 1));
        assert_eq!(source, DateSource::GradeFallback);

        let id = CellValue::Number(29_810_512_345_678.0);
        let (_, source) = normalize_birth_date(Some(&id), GradeLevelCode::Kg, as_of);
        assert_eq!(source, DateSource::GradeFallback);
    }

    #[test]
    fn test_numeric_cell_is_serial() {
        let as_of = ymd(2024, 9, 1);
        let (date, source) =
            normalize_birth_date(Some(&CellValue::Number(42000.0)), GradeLevelCode::Kg, as_of);
        assert_eq!(date, ymd(2014, 12, 28));
        assert_eq!(source, DateSource::Serial);
    }
}
