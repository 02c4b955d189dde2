//! Outcome classification of expanded rows.
//!
//! Precedence, first match wins:
//!
//! 1. end department is "no degree" → [`Outcome::NoDegree`]
//! 2. end department counts as staying → [`Outcome::Retained`]
//! 3. otherwise → [`Outcome::OtherDegree`]
//!
//! A double major is judged on the whole row it came from: an `aos/math`
//! admit who earned `aos/math` stayed in both departments, so the cross
//! pairs aos×math and math×aos are retained too.
//!
//! What "staying" means depends on the [`OutcomeRule`]: the same department
//! for admitted majors, or any department of the division for undeclared
//! admits (who have no department to stay in).

use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::DepartmentConfig;
use crate::models::{ExpandedRecord, Outcome, NO_DEGREE};

/// How step 2 of the precedence decides retention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeRule {
    /// Retained when the end department equals the start department.
    #[default]
    Department,
    /// Retained when the end department belongs to the division.
    Division {
        label: String,
        departments: BTreeSet<String>,
    },
}

impl OutcomeRule {
    /// Division rule over every department of the lookup table.
    pub fn division(config: &DepartmentConfig) -> Self {
        OutcomeRule::Division {
            label: config.division_label.clone(),
            departments: config.division_departments(),
        }
    }

    pub fn classify(&self, start_department: &str, end_department: &str) -> Outcome {
        self.classify_earned(start_department, end_department, &[])
    }

    /// Classify one pair given every department the source row earned a degree in.
    pub fn classify_earned(&self, start_department: &str, end_department: &str, earned: &[String]) -> Outcome {
        if end_department == NO_DEGREE {
            return Outcome::NoDegree;
        }
        let stayed = match self {
            OutcomeRule::Department => {
                end_department == start_department || earned.iter().any(|d| d == start_department)
            }
            OutcomeRule::Division { departments, .. } => departments.contains(end_department),
        };
        if stayed {
            Outcome::Retained
        } else {
            Outcome::OtherDegree
        }
    }

    pub fn classify_record(&self, record: &ExpandedRecord) -> Outcome {
        self.classify_earned(&record.start_department, &record.end_department, &record.earned_departments)
    }

    /// Display label of an outcome under this rule.
    pub fn label(&self, outcome: Outcome) -> String {
        match (self, outcome) {
            (_, Outcome::NoDegree) => "No Degree".to_string(),
            (OutcomeRule::Department, Outcome::Retained) => "Stayed in Department".to_string(),
            (OutcomeRule::Department, Outcome::OtherDegree) => "Other Department".to_string(),
            (OutcomeRule::Division { label, .. }, Outcome::Retained) => format!("Stayed in {}", label),
            (OutcomeRule::Division { .. }, Outcome::OtherDegree) => "Other Degree".to_string(),
        }
    }
}
