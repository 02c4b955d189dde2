//! Row canonicalization.
//!
//! Turns a [`RawRecord`] into a [`NormalizedRecord`]:
//!
//! 1. trim + lowercase every categorical string
//! 2. cohort label → leading 4-digit year
//! 3. admission type / URM status → booleans
//! 4. spelling corrections on the start major
//!
//! # Guarantees
//!
//! - **Idempotent**: `normalize(normalize(x).to_raw()) == normalize(x)`
//! - **Fail-fast**: the first bad row rejects the whole batch

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::DepartmentConfig;
use crate::error::{NormalizeError, NormalizeResult, PipelineError, PipelineResult};
use crate::models::{NormalizedRecord, RawRecord};

static COHORT_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{4})").expect("valid cohort regex"));

/// Canonical admission-type tokens.
const FRESHMAN: &str = "freshman";
const TRANSFER: &str = "transfer";

/// Canonical URM tokens.
const URM: &str = "urm";
const NON_URM: &str = "non-urm";

/// Trim and lowercase a categorical value.
pub fn clean(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parse the cohort year out of a year-prefixed label (`"2014-15"` → 2014).
pub fn parse_cohort_year(label: &str) -> NormalizeResult<i32> {
    let trimmed = label.trim();
    COHORT_YEAR
        .captures(trimmed)
        .and_then(|caps| caps[1].parse::<i32>().ok())
        .ok_or_else(|| NormalizeError::MalformedCohortLabel {
            label: label.to_string(),
        })
}

/// `true` for first-time freshman admits, `false` for transfers.
pub fn parse_admission_type(value: &str) -> NormalizeResult<bool> {
    match clean(value).as_str() {
        FRESHMAN => Ok(true),
        TRANSFER => Ok(false),
        _ => Err(NormalizeError::UnrecognizedCategory {
            field: "admission type",
            value: value.to_string(),
        }),
    }
}

/// URM status. Missing or blank values are unknown (`None`), not errors.
pub fn parse_urm(value: Option<&str>) -> NormalizeResult<Option<bool>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match clean(value).as_str() {
        "" => Ok(None),
        URM => Ok(Some(true)),
        NON_URM => Ok(Some(false)),
        _ => Err(NormalizeError::UnrecognizedCategory {
            field: "URM status",
            value: value.to_string(),
        }),
    }
}

/// Cleans raw rows against an injected department configuration.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    config: &'a DepartmentConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a DepartmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &'a DepartmentConfig {
        self.config
    }

    /// Department of a single cleaned major; unmapped majors give `"other"`.
    pub fn department_of(&self, major: &str) -> &'a str {
        self.config.department_of(major)
    }

    /// Canonicalize one row.
    pub fn normalize_record(&self, raw: &RawRecord) -> NormalizeResult<NormalizedRecord> {
        let cohort_year = parse_cohort_year(&raw.cohort)?;
        let is_freshman = parse_admission_type(&raw.admission_type)?;
        let is_urm = parse_urm(raw.urm.as_deref())?;

        let start_major = clean(&raw.start_major);
        let start_major = self.config.correct(&start_major).to_string();
        let end_major = raw
            .end_major
            .as_deref()
            .map(clean)
            .filter(|major| !major.is_empty());

        Ok(NormalizedRecord {
            cohort_year,
            start_major,
            end_major,
            is_urm,
            is_freshman,
            headcount: raw.headcount,
        })
    }

    /// Canonicalize a batch. The first failing row aborts with its CSV line,
    /// or its 1-based index for rows not read from a file.
    pub fn normalize(&self, raws: &[RawRecord]) -> PipelineResult<Vec<NormalizedRecord>> {
        raws.iter()
            .enumerate()
            .map(|(idx, raw)| {
                self.normalize_record(raw).map_err(|source| PipelineError::Normalize {
                    row: raw.line.map(|line| line as usize).unwrap_or(idx + 1),
                    source,
                })
            })
            .collect()
    }
}
