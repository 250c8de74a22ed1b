//! Environment configuration.
//!
//! Read once at startup after `dotenvy` has loaded `.env`. CLI flags
//! override individual values.
//!
//! | Variable                  | Meaning                                  | Default        |
//! |---------------------------|------------------------------------------|----------------|
//! | `ENROLL_API_URL`          | School backend base URL                  | none           |
//! | `ENROLL_API_TOKEN`        | Bearer token for the backend             | none           |
//! | `ENROLL_BRANCH_ID`        | Branch every import writes into          | `default`      |
//! | `ENROLL_ACADEMIC_YEAR`    | Academic year of created records         | current year   |
//! | `ENROLL_REGISTRATION_FEE` | Fee seeded per student (0 = no seeding)  | `0`            |
//! | `ENROLL_THROTTLE_EVERY`   | Pause after this many students           | `10`           |
//! | `ENROLL_THROTTLE_MS`      | Pause length in milliseconds             | `100`          |

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::import::ImportOptions;
use crate::models::remote::BranchId;
use crate::registry::HttpRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct EnrollConfig {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub branch_id: BranchId,
    pub academic_year: Option<i32>,
    pub registration_fee: f64,
    pub throttle_every: usize,
    pub throttle_ms: u64,
}

impl Default for EnrollConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            branch_id: BranchId::new("default"),
            academic_year: None,
            registration_fee: 0.0,
            throttle_every: 10,
            throttle_ms: 100,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

impl EnrollConfig {
    /// Load from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let registration_fee: f64 =
            parse_var(&lookup, "ENROLL_REGISTRATION_FEE")?.unwrap_or(defaults.registration_fee);
        if !registration_fee.is_finite() || registration_fee < 0.0 {
            return Err(ConfigError::Invalid {
                var: "ENROLL_REGISTRATION_FEE",
                value: registration_fee.to_string(),
            });
        }

        Ok(Self {
            api_url: lookup("ENROLL_API_URL"),
            api_token: lookup("ENROLL_API_TOKEN"),
            branch_id: lookup("ENROLL_BRANCH_ID")
                .map(BranchId::new)
                .unwrap_or(defaults.branch_id),
            academic_year: parse_var(&lookup, "ENROLL_ACADEMIC_YEAR")?,
            registration_fee,
            throttle_every: parse_var(&lookup, "ENROLL_THROTTLE_EVERY")?
                .unwrap_or(defaults.throttle_every),
            throttle_ms: parse_var(&lookup, "ENROLL_THROTTLE_MS")?.unwrap_or(defaults.throttle_ms),
        })
    }

    /// Import settings for one session.
    pub fn import_options(&self) -> ImportOptions {
        let mut options = ImportOptions::new(self.branch_id.clone());
        if let Some(year) = self.academic_year {
            options.academic_year = year;
        }
        options.registration_fee = self.registration_fee;
        options.throttle_every = self.throttle_every;
        options.throttle_ms = self.throttle_ms;
        options
    }

    /// Client for the configured backend.
    pub fn http_registry(&self) -> Result<HttpRegistry, ConfigError> {
        let url = self
            .api_url
            .as_deref()
            .ok_or(ConfigError::Missing("ENROLL_API_URL"))?;
        Ok(HttpRegistry::new(url, self.api_token.clone()))
    }
}
