//! Domain models for the retention pipeline.
//!
//! Rows flow through the pipeline in this order:
//!
//! - [`RawRecord`] - One input row as read from the CSV (strings + headcount)
//! - [`NormalizedRecord`] - Canonical fields (year, lowercase majors, booleans)
//! - [`ExpandedRecord`] - One (single start major, single end major) pair
//! - [`OutcomeRow`] / [`CohortDeptTotal`] - Grouped sums
//! - [`ResultRow`] - Outcome share of a cohort/department total
//!
//! Every row carries a `headcount`: a row stands for a group of students
//! sharing the exact same combination of fields, not a single student.

use serde::{Deserialize, Serialize};

// =============================================================================
// Sentinel departments
// =============================================================================

/// End major/department of students who earned no degree.
pub const NO_DEGREE: &str = "no degree";

/// Start major/department of students admitted without a declared major.
pub const UNDECLARED: &str = "undeclared";

/// Department of every major missing from the lookup table.
pub const OTHER: &str = "other";

// =============================================================================
// Input rows
// =============================================================================

/// A raw input row, before any cleaning.
///
/// Empty CSV cells for the nullable fields arrive as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Year-prefixed cohort label, e.g. `"2014-15 Fall"`.
    pub cohort: String,
    pub start_major: String,
    /// `None` when no degree was earned.
    pub end_major: Option<String>,
    /// `None` when URM status was not reported.
    pub urm: Option<String>,
    pub admission_type: String,
    pub headcount: u64,
    /// Line in the source CSV, when the row was read from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

/// A row with canonical fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub cohort_year: i32,
    /// Trimmed, lowercased, spelling-corrected. May still hold several majors.
    pub start_major: String,
    /// Trimmed, lowercased. May still hold several majors.
    pub end_major: Option<String>,
    /// `None` = unknown.
    pub is_urm: Option<bool>,
    /// `true` = first-time freshman admit, `false` = transfer admit.
    pub is_freshman: bool,
    pub headcount: u64,
}

impl NormalizedRecord {
    /// Render back into the raw vocabulary.
    ///
    /// Normalizing the result yields `self` again.
    pub fn to_raw(&self) -> RawRecord {
        RawRecord {
            cohort: self.cohort_year.to_string(),
            start_major: self.start_major.clone(),
            end_major: self.end_major.clone(),
            urm: self.is_urm.map(|urm| if urm { "urm" } else { "non-urm" }.to_string()),
            admission_type: if self.is_freshman { "freshman" } else { "transfer" }.to_string(),
            headcount: self.headcount,
            line: None,
        }
    }
}

/// One (start major, end major) pair of a possibly multi-major row.
///
/// Carries the headcount of the row it was expanded from, unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedRecord {
    pub cohort_year: i32,
    pub start_major: String,
    /// [`NO_DEGREE`] when no degree was earned.
    pub end_major: String,
    pub start_department: String,
    pub end_department: String,
    /// Departments of every end major of the source row, sorted and deduplicated.
    #[serde(default)]
    pub earned_departments: Vec<String>,
    pub is_urm: Option<bool>,
    pub is_freshman: bool,
    pub headcount: u64,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Outcome of a student group relative to its start department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Degree in the start department (or division, under the division rule).
    Retained,
    /// Degree somewhere else.
    OtherDegree,
    /// No degree.
    NoDegree,
}

impl Outcome {
    /// All outcomes, in stacking order.
    pub const ALL: [Outcome; 3] = [Outcome::Retained, Outcome::OtherDegree, Outcome::NoDegree];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Retained => "retained",
            Outcome::OtherDegree => "other_degree",
            Outcome::NoDegree => "no_degree",
        }
    }

    /// Parse the snake_case name used in output tables.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "retained" => Some(Outcome::Retained),
            "other_degree" | "other degree" => Some(Outcome::OtherDegree),
            "no_degree" | "no degree" => Some(Outcome::NoDegree),
            _ => None,
        }
    }

    /// Position in [`Outcome::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Outcome::Retained => 0,
            Outcome::OtherDegree => 1,
            Outcome::NoDegree => 2,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Aggregated rows
// =============================================================================

/// Headcount of one outcome within a cohort/department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRow {
    pub cohort_year: i32,
    pub start_department: String,
    pub outcome: Outcome,
    pub headcount: u64,
}

/// Total headcount of a cohort/department over all outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortDeptTotal {
    pub cohort_year: i32,
    pub start_department: String,
    pub total_headcount: u64,
}

/// Share of one outcome within a cohort/department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub cohort_year: i32,
    pub start_department: String,
    pub outcome: Outcome,
    pub headcount: u64,
    pub total_headcount: u64,
    /// `0.0` when `total_headcount` is zero.
    pub percentage: f64,
}

impl ResultRow {
    /// False when the percentage is the zero-denominator sentinel.
    pub fn has_data(&self) -> bool {
        self.total_headcount > 0
    }
}

/// `100 * part / total`, or `0.0` for an empty total.
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
