//! Best-effort gender inference.
//!
//! Order: explicit cell, given-name dictionaries, suffix heuristic, default
//! Male. The dictionaries only cover common Arabic/Latin-transliterated given
//! names; results are approximate and meant to be reviewed.

use serde::Serialize;

use crate::models::Gender;
use crate::parser::CellValue;

const FEMALE_NAMES: &[&str] = &[
    "fatima", "fatma", "aisha", "aysha", "maryam", "mariam", "mariem", "zainab", "zeinab",
    "khadija", "sara", "sarah", "nour", "noor", "hana", "hanaa", "huda", "hoda", "layla", "leila",
    "laila", "salma", "amina", "aya", "yasmin", "yasmine", "jana", "malak", "rana", "reem",
    "rania", "dina", "mona", "nada", "heba", "asma", "shahd", "rahma", "farah", "lina", "lama",
    "jumana", "ruqaya", "ruqayya", "hafsa", "sumaya", "sumayya", "iman", "eman", "habiba",
    "basmala", "mayar", "jannat", "rawan", "razan", "dalia", "nadia", "samira", "amira",
    "yara", "lujain", "tasneem", "nourhan", "menna", "mennatallah", "shaimaa", "esraa",
    "israa", "alaa", "doaa", "marwa", "nesma", "safiya", "zahra", "hind", "ghada", "suad",
    "wafaa", "abeer", "asmaa", "sana", "fatimah", "aaliyah", "maya", "emma", "olivia", "sophia",
];

const MALE_NAMES: &[&str] = &[
    "ahmed", "ahmad", "mohammed", "mohamed", "muhammad", "mohammad", "omar", "umar", "ali",
    "hassan", "hasan", "hussein", "husain", "yusuf", "youssef", "yousef", "ibrahim", "khalid",
    "khaled", "abdullah", "abdallah", "abdelrahman", "abdulrahman", "mahmoud", "mustafa",
    "moustafa", "said", "saeed", "hamza", "karim", "kareem", "tariq", "tarek", "ziad", "yahya",
    "adam", "amir", "bilal", "hamid", "anas", "taha", "osama", "usama", "huzaifa", "zakariya",
    "zakaria", "musa", "moussa", "isa", "eissa", "idris", "ismail", "yassin", "yassine",
    "suleiman", "sulaiman", "othman", "uthman", "nabil", "adel", "samir", "samy", "sami",
    "fathi", "fathy", "salem", "salim", "jamal", "kamal", "waleed", "walid", "faris", "fares",
    "malik", "rayan", "ayman", "ammar", "hisham", "mazen", "marwan", "nasser", "qasim",
    "elias", "ilyas", "luca", "joshua", "noah", "mirza", "abdulaziz", "salman", "rahman",
    "abdurrahman", "abderrahman", "amiran",
];

/// Dictionary entries shorter than this only match exactly.
const MIN_SUBSTRING_LEN: usize = 4;

/// Which rule decided the gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderSource {
    Explicit,
    Dictionary,
    Suffix,
    Default,
}

/// Interpret an explicit gender cell (`m/male/boy/1`, `f/female/girl/2`).
pub fn parse_gender_value(value: &CellValue) -> Option<Gender> {
    match value {
        CellValue::Number(n) if *n == 1.0 => Some(Gender::Male),
        CellValue::Number(n) if *n == 2.0 => Some(Gender::Female),
        CellValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "m" | "male" | "boy" | "1" => Some(Gender::Male),
            "f" | "female" | "girl" | "2" => Some(Gender::Female),
            _ => None,
        },
        _ => None,
    }
}

/// Word-valued gender tokens only (no `1`/`2`), used when scanning unlabeled cells.
pub fn parse_gender_word(text: &str) -> Option<Gender> {
    match text.trim().to_lowercase().as_str() {
        "m" | "male" | "boy" => Some(Gender::Male),
        "f" | "female" | "girl" => Some(Gender::Female),
        _ => None,
    }
}

fn dictionary_lookup(first: &str) -> Option<Gender> {
    if FEMALE_NAMES.contains(&first) {
        return Some(Gender::Female);
    }
    if MALE_NAMES.contains(&first) {
        return Some(Gender::Male);
    }

    // Longest entry wins so "salmane" reads as "salman", not "salma"
    let longest = |names: &[&str]| {
        names
            .iter()
            .filter(|n| n.len() >= MIN_SUBSTRING_LEN && first.contains(*n))
            .map(|n| n.len())
            .max()
    };
    match (longest(FEMALE_NAMES), longest(MALE_NAMES)) {
        (Some(f), Some(m)) if m >= f => Some(Gender::Male),
        (Some(_), _) => Some(Gender::Female),
        (None, Some(_)) => Some(Gender::Male),
        (None, None) => None,
    }
}

/// Infer gender for a student, reporting which rule decided.
pub fn infer_gender(explicit: Option<&CellValue>, first_name: &str) -> (Gender, GenderSource) {
    if let Some(gender) = explicit.and_then(parse_gender_value) {
        return (gender, GenderSource::Explicit);
    }

    let first = first_name.trim().to_lowercase();
    if first.is_empty() {
        return (Gender::Male, GenderSource::Default);
    }

    if let Some(gender) = dictionary_lookup(&first) {
        return (gender, GenderSource::Dictionary);
    }

    if first.ends_with('a') || first.ends_with("ah") || first.ends_with("ia") {
        return (Gender::Female, GenderSource::Suffix);
    }

    (Gender::Male, GenderSource::Default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_explicit_wins() {
        assert_eq!(infer_gender(Some(&text("F")), "Omar").0, Gender::Female);
        assert_eq!(infer_gender(Some(&text(" boy ")), "Fatima").0, Gender::Male);
        assert_eq!(infer_gender(Some(&CellValue::Number(2.0)), "Omar").0, Gender::Female);
        assert_eq!(
            infer_gender(Some(&text("girl")), "Omar").1,
            GenderSource::Explicit
        );
    }

    #[test]
    fn test_unrecognized_explicit_falls_through() {
        let (gender, source) = infer_gender(Some(&text("n/a")), "Fatima");
        assert_eq!(gender, Gender::Female);
        assert_eq!(source, GenderSource::Dictionary);
    }

    #[test]
    fn test_dictionary() {
        assert_eq!(infer_gender(None, "Fatima").0, Gender::Female);
        assert_eq!(infer_gender(None, "Omar").0, Gender::Male);
        assert_eq!(infer_gender(None, "Hamza").0, Gender::Male);
        assert_eq!(infer_gender(None, "Abdullah").0, Gender::Male);
        // Substring: "fatimaa" contains "fatima"
        assert_eq!(infer_gender(None, "Fatimaa"), (Gender::Female, GenderSource::Dictionary));
    }

    #[test]
    fn test_male_names_containing_female_entries() {
        for name in ["Salman", "Rahman", "Abdurrahman", "Amiran", "Salmane", "Abdelrahmane"] {
            assert_eq!(
                infer_gender(None, name),
                (Gender::Male, GenderSource::Dictionary),
                "{}",
                name
            );
        }
        assert_eq!(infer_gender(None, "Salma").0, Gender::Female);
        assert_eq!(infer_gender(None, "Rahmaa"), (Gender::Female, GenderSource::Dictionary));
    }

    #[test]
    fn test_short_entries_need_exact_match() {
        // "ali" is male but too short to match inside "Khalil"
        assert_eq!(infer_gender(None, "Khalil"), (Gender::Male, GenderSource::Default));
    }

    #[test]
    fn test_suffix_heuristic() {
        assert_eq!(infer_gender(None, "Lubna"), (Gender::Female, GenderSource::Suffix));
        assert_eq!(infer_gender(None, "Fadiah"), (Gender::Female, GenderSource::Suffix));
    }

    #[test]
    fn test_default_male() {
        assert_eq!(infer_gender(None, "Zyx"), (Gender::Male, GenderSource::Default));
        assert_eq!(infer_gender(None, ""), (Gender::Male, GenderSource::Default));
    }

    #[test]
    fn test_gender_word_ignores_digits() {
        assert_eq!(parse_gender_word("Female"), Some(Gender::Female));
        assert_eq!(parse_gender_word("1"), None);
    }
}
