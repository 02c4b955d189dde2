//! Presentation views over a snapshot.
//!
//! Each view is one call to the shared aggregation with a subgroup filter
//! and an outcome rule, reshaped for a chart:
//!
//! | View                        | Rule       | Shape                          |
//! |-----------------------------|------------|--------------------------------|
//! | [`department_timeline`]     | department | stacked shares per cohort      |
//! | [`department_comparison`]   | department | retention rate per department  |
//! | [`undeclared_timeline`]     | division   | stacked shares per cohort      |
//!
//! Summaries and comparisons cover the configured comparison window only.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::config::CohortWindow;
use crate::error::{ViewError, ViewResult};
use crate::models::{percentage, Outcome, UNDECLARED};
use crate::transform::{OutcomeRule, RecordFilter, ResultTable, Snapshot};

// =============================================================================
// Subgroup selectors
// =============================================================================

/// URM subgroup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum UrmStatus {
    #[default]
    All,
    Urm,
    NonUrm,
}

impl UrmStatus {
    pub fn as_filter(self) -> Option<bool> {
        match self {
            UrmStatus::All => None,
            UrmStatus::Urm => Some(true),
            UrmStatus::NonUrm => Some(false),
        }
    }

    /// Title-case name, `None` for [`UrmStatus::All`].
    pub fn display(self) -> Option<&'static str> {
        match self {
            UrmStatus::All => None,
            UrmStatus::Urm => Some("URM"),
            UrmStatus::NonUrm => Some("Non-URM"),
        }
    }
}

impl FromStr for UrmStatus {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(UrmStatus::All),
            "urm" => Ok(UrmStatus::Urm),
            "non-urm" | "non_urm" | "nonurm" => Ok(UrmStatus::NonUrm),
            _ => Err(ViewError::InvalidSelector {
                field: "urm",
                value: s.to_string(),
            }),
        }
    }
}

/// Admission subgroup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StudentType {
    #[default]
    All,
    Freshman,
    Transfer,
}

impl StudentType {
    pub fn as_filter(self) -> Option<bool> {
        match self {
            StudentType::All => None,
            StudentType::Freshman => Some(true),
            StudentType::Transfer => Some(false),
        }
    }

    pub fn display(self) -> Option<&'static str> {
        match self {
            StudentType::All => None,
            StudentType::Freshman => Some("Freshman"),
            StudentType::Transfer => Some("Transfer"),
        }
    }
}

impl FromStr for StudentType {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(StudentType::All),
            "freshman" => Ok(StudentType::Freshman),
            "transfer" => Ok(StudentType::Transfer),
            _ => Err(ViewError::InvalidSelector {
                field: "student_type",
                value: s.to_string(),
            }),
        }
    }
}

/// URM and admission selection applied to every view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subgroup {
    pub urm: UrmStatus,
    pub student_type: StudentType,
}

impl Subgroup {
    pub fn new(urm: UrmStatus, student_type: StudentType) -> Self {
        Self { urm, student_type }
    }

    pub fn filter(&self) -> RecordFilter {
        RecordFilter::new()
            .with_urm(self.urm.as_filter())
            .with_freshman(self.student_type.as_filter())
    }

    /// `" (URM) (Freshman)"`-style title suffix; empty for everyone.
    pub fn title_suffix(&self) -> String {
        [self.urm.display(), self.student_type.display()]
            .into_iter()
            .flatten()
            .map(|part| format!(" ({})", part))
            .collect()
    }
}

// =============================================================================
// View shapes
// =============================================================================

/// One outcome at one cohort.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeShare {
    pub outcome: Outcome,
    pub label: String,
    pub headcount: u64,
    pub percentage: f64,
}

/// All three outcomes of one cohort, in stacking order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub cohort_year: i32,
    pub total_headcount: u64,
    /// False when the cohort has no students; shares are then all zero.
    pub has_data: bool,
    pub shares: Vec<OutcomeShare>,
}

/// Retention over the comparison window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub window: CohortWindow,
    pub total_students: u64,
    pub retained: u64,
    pub retention_rate: f64,
}

/// Stacked-area chart data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub title: String,
    pub department: String,
    pub subgroup: Subgroup,
    /// Outcome labels in stacking order.
    pub labels: Vec<String>,
    /// Cohorts after this one have not had time to graduate.
    pub last_graduated_cohort: i32,
    pub points: Vec<TimelinePoint>,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonEntry {
    pub department: String,
    pub retention_rate: f64,
    pub total_students: u64,
}

/// Bar chart data, ascending by retention rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub title: String,
    pub subgroup: Subgroup,
    pub window: CohortWindow,
    pub entries: Vec<ComparisonEntry>,
}

// =============================================================================
// Views
// =============================================================================

/// Start departments present in the data, sorted, without "undeclared".
pub fn departments(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .records
        .iter()
        .map(|r| r.start_department.as_str())
        .filter(|d| *d != UNDECLARED)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Outcome shares per cohort for one start department.
pub fn department_timeline(snapshot: &Snapshot, department: &str, subgroup: Subgroup) -> ViewResult<Timeline> {
    let department = department.trim().to_lowercase();
    if !departments(snapshot).contains(&department) {
        return Err(ViewError::UnknownDepartment(department));
    }

    let rule = OutcomeRule::Department;
    let title = format!(
        "Student Outcomes for {} Department{}",
        title_case(&department),
        subgroup.title_suffix()
    );
    Ok(timeline(snapshot, &department, &rule, subgroup, title))
}

/// Outcome shares per cohort for undeclared admits, retained meaning any
/// department of the division.
pub fn undeclared_timeline(snapshot: &Snapshot, subgroup: Subgroup) -> Timeline {
    let rule = snapshot.division_rule();
    let title = format!("Undeclared Student Outcomes{}", subgroup.title_suffix());
    timeline(snapshot, UNDECLARED, &rule, subgroup, title)
}

/// Window-wide retention rate of every start department.
pub fn department_comparison(snapshot: &Snapshot, subgroup: Subgroup) -> Comparison {
    let window = snapshot.config.comparison_window;
    let filter = subgroup.filter().with_cohorts(window);
    let table = snapshot.results(&OutcomeRule::Department, &filter);

    let mut totals: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for row in table.for_outcome(Outcome::Retained) {
        if row.start_department == UNDECLARED {
            continue;
        }
        let entry = totals.entry(row.start_department.as_str()).or_insert((0, 0));
        entry.0 += row.headcount;
        entry.1 += row.total_headcount;
    }

    let mut entries: Vec<ComparisonEntry> = totals
        .into_iter()
        .map(|(department, (retained, total))| ComparisonEntry {
            department: department.to_string(),
            retention_rate: percentage(retained, total),
            total_students: total,
        })
        .collect();
    entries.sort_by(|a, b| {
        a.retention_rate
            .total_cmp(&b.retention_rate)
            .then_with(|| a.department.cmp(&b.department))
    });

    Comparison {
        title: format!(
            "Average Department Retention Rates ({}-{} Cohorts){}",
            window.first,
            window.last,
            subgroup.title_suffix()
        ),
        subgroup,
        window,
        entries,
    }
}

fn timeline(snapshot: &Snapshot, department: &str, rule: &OutcomeRule, subgroup: Subgroup, title: String) -> Timeline {
    let filter = subgroup.filter().with_department(department);
    let table = snapshot.results(rule, &filter);
    let labels: Vec<String> = Outcome::ALL.iter().map(|o| rule.label(*o)).collect();

    let points = table
        .cohorts()
        .into_iter()
        .map(|cohort_year| {
            let shares: Vec<OutcomeShare> = Outcome::ALL
                .iter()
                .filter_map(|outcome| table.get(cohort_year, department, *outcome))
                .map(|row| OutcomeShare {
                    outcome: row.outcome,
                    label: labels[row.outcome.index()].clone(),
                    headcount: row.headcount,
                    percentage: row.percentage,
                })
                .collect();
            let total_headcount = table
                .get(cohort_year, department, Outcome::Retained)
                .map(|row| row.total_headcount)
                .unwrap_or(0);
            TimelinePoint {
                cohort_year,
                total_headcount,
                has_data: total_headcount > 0,
                shares,
            }
        })
        .collect();

    Timeline {
        title,
        department: department.to_string(),
        subgroup,
        labels,
        last_graduated_cohort: snapshot.config.last_graduated_cohort,
        points,
        summary: summarize(&table, snapshot.config.comparison_window),
    }
}

fn summarize(table: &ResultTable, window: CohortWindow) -> Summary {
    let (retained, total_students) = table
        .for_outcome(Outcome::Retained)
        .filter(|row| window.contains(row.cohort_year))
        .fold((0, 0), |(retained, total), row| (retained + row.headcount, total + row.total_headcount));

    Summary {
        window,
        total_students,
        retained,
        retention_rate: percentage(retained, total_students),
    }
}

/// Capitalize the first letter of every word.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DepartmentConfig;
    use crate::transform::load_bytes;
    use std::sync::Arc;

    const CSV: &str = "\
cohort,start_major,end_major,urm,fresh,headcount
2012,Physics,Physics,URM,Freshman,6
2012,Physics,Chemistry,Non-URM,Freshman,2
2012,Physics,,Non-URM,Transfer,2
2013,Physics,Physics,Non-URM,Freshman,4
2022,Physics,,Non-URM,Freshman,9
2012,Mathematics,Mathematics,Non-URM,Freshman,1
2012,Mathematics,Physics,Non-URM,Freshman,3
2012,Chemistry,Chemistry,URM,Transfer,5
2012,Undeclared-Physical Science,Statistics and Data Science,Non-URM,Freshman,3
2012,Undeclared,History,,Freshman,1
2013,Undeclared,,Non-URM,Freshman,4
2012,History,History,Non-URM,Freshman,7
";

    fn snapshot() -> Snapshot {
        load_bytes(CSV.as_bytes(), Arc::new(DepartmentConfig::builtin())).unwrap()
    }

    #[test]
    fn test_departments_sorted_without_undeclared() {
        assert_eq!(
            departments(&snapshot()),
            vec!["chemistry and biochemistry", "math", "other", "physics and astronomy"]
        );
    }

    #[test]
    fn test_department_timeline() {
        let timeline = department_timeline(&snapshot(), "Physics and Astronomy", Subgroup::default()).unwrap();

        assert_eq!(timeline.title, "Student Outcomes for Physics And Astronomy Department");
        assert_eq!(timeline.labels, vec!["Stayed in Department", "Other Department", "No Degree"]);
        assert_eq!(timeline.last_graduated_cohort, 2020);

        let years: Vec<i32> = timeline.points.iter().map(|p| p.cohort_year).collect();
        assert_eq!(years, vec![2012, 2013, 2022]);

        let first = &timeline.points[0];
        assert_eq!(first.total_headcount, 10);
        assert_eq!(first.shares.len(), 3);
        assert_eq!(first.shares[0].headcount, 6);
        assert!((first.shares[0].percentage - 60.0).abs() < 1e-9);
        assert!((first.shares[1].percentage - 20.0).abs() < 1e-9);
        assert!((first.shares[2].percentage - 20.0).abs() < 1e-9);

        // 2022 lies outside the comparison window.
        assert_eq!(timeline.summary.total_students, 14);
        assert_eq!(timeline.summary.retained, 10);
        assert!((timeline.summary.retention_rate - 100.0 * 10.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_timeline_subgroup_title_and_filter() {
        let subgroup = Subgroup::new(UrmStatus::NonUrm, StudentType::Freshman);
        let timeline = department_timeline(&snapshot(), "physics and astronomy", subgroup).unwrap();

        assert_eq!(
            timeline.title,
            "Student Outcomes for Physics And Astronomy Department (Non-URM) (Freshman)"
        );
        assert_eq!(timeline.points[0].total_headcount, 2);
        assert_eq!(timeline.points[0].shares[1].headcount, 2);
    }

    #[test]
    fn test_unknown_department() {
        let err = department_timeline(&snapshot(), "geography", Subgroup::default()).unwrap_err();
        assert_eq!(err, ViewError::UnknownDepartment("geography".into()));
        assert!(department_timeline(&snapshot(), UNDECLARED, Subgroup::default()).is_err());
    }

    #[test]
    fn test_comparison_sorted_ascending() {
        let comparison = department_comparison(&snapshot(), Subgroup::default());

        assert_eq!(comparison.title, "Average Department Retention Rates (2010-2020 Cohorts)");
        let names: Vec<&str> = comparison.entries.iter().map(|e| e.department.as_str()).collect();
        assert_eq!(names, vec!["math", "physics and astronomy", "chemistry and biochemistry", "other"]);

        let math = &comparison.entries[0];
        assert_eq!(math.total_students, 4);
        assert!((math.retention_rate - 25.0).abs() < 1e-9);

        let physics = &comparison.entries[1];
        assert_eq!(physics.total_students, 14);

        assert!(comparison.entries.windows(2).all(|w| w[0].retention_rate <= w[1].retention_rate));
    }

    #[test]
    fn test_comparison_urm_subgroup() {
        let comparison = department_comparison(&snapshot(), Subgroup::new(UrmStatus::Urm, StudentType::All));
        assert!(comparison.title.ends_with("(URM)"));
        let names: Vec<&str> = comparison.entries.iter().map(|e| e.department.as_str()).collect();
        assert_eq!(names, vec!["chemistry and biochemistry", "physics and astronomy"]);
    }

    #[test]
    fn test_undeclared_timeline_uses_division() {
        let timeline = undeclared_timeline(&snapshot(), Subgroup::default());

        assert_eq!(timeline.title, "Undeclared Student Outcomes");
        assert_eq!(timeline.labels[0], "Stayed in Physical Sciences");
        assert_eq!(timeline.labels[1], "Other Degree");

        let first = &timeline.points[0];
        assert_eq!(first.cohort_year, 2012);
        assert_eq!(first.total_headcount, 4);
        assert_eq!(first.shares[0].headcount, 3);
        assert_eq!(first.shares[1].headcount, 1);

        let second = &timeline.points[1];
        assert_eq!(second.shares[2].headcount, 4);
        assert!((second.shares[2].percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_urm_subgroup_ignores_unknown_status() {
        let timeline = undeclared_timeline(&snapshot(), Subgroup::new(UrmStatus::NonUrm, StudentType::All));
        assert_eq!(timeline.points[0].total_headcount, 3);
    }

    #[test]
    fn test_selectors_parse() {
        assert_eq!("Non-URM".parse::<UrmStatus>().unwrap(), UrmStatus::NonUrm);
        assert_eq!("".parse::<UrmStatus>().unwrap(), UrmStatus::All);
        assert_eq!("TRANSFER".parse::<StudentType>().unwrap(), StudentType::Transfer);
        assert!(matches!(
            "maybe".parse::<UrmStatus>(),
            Err(ViewError::InvalidSelector { field: "urm", .. })
        ));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("physics and astronomy"), "Physics And Astronomy");
        assert_eq!(title_case("aos"), "Aos");
        assert_eq!(title_case("non-urm"), "Non-Urm");
    }
}
