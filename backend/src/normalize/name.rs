//! Whitespace-token name splitting.

use serde::Serialize;

/// Name parts of a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameParts {
    pub first_name: String,
    pub father_name: String,
    pub grandfather_name: String,
    pub last_name: String,
}

/// Split a free-text full name.
///
/// First token is the first name, then father's and grandfather's names;
/// the remainder is the last name. A lone token is both first and last name.
/// Returns `None` for blank input.
pub fn parse_name(full_name: &str) -> Option<NameParts> {
    let tokens: Vec<&str> = full_name.split_whitespace().collect();

    match tokens.as_slice() {
        [] => None,
        [only] => Some(NameParts {
            first_name: only.to_string(),
            father_name: String::new(),
            grandfather_name: String::new(),
            last_name: only.to_string(),
        }),
        [first, rest @ ..] => Some(NameParts {
            first_name: first.to_string(),
            father_name: rest.first().map(|s| s.to_string()).unwrap_or_default(),
            grandfather_name: rest.get(1).map(|s| s.to_string()).unwrap_or_default(),
            last_name: rest.get(2..).map(|r| r.join(" ")).unwrap_or_default(),
        }),
    }
}
