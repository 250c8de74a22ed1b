//! Per-student field normalization: names, gender and birth dates.

pub mod date;
pub mod gender;
pub mod name;

pub use date::{normalize_birth_date, DateSource};
pub use gender::{infer_gender, parse_gender_value, parse_gender_word, GenderSource};
pub use name::{parse_name, NameParts};
