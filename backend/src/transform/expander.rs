//! Double-major expansion.
//!
//! A row whose start or end major joins several majors with the separator
//! fans out into the Cartesian product of its major lists:
//!
//! ```text
//! start "aos/math", end "aos/math", headcount 5
//!   → aos×aos, aos×math, math×aos, math×math   (each headcount 5)
//! ```
//!
//! A value that is itself a lookup key (`mathematics/economics`) names one
//! major and is never split.
//!
//! Every expanded row keeps the unsplit row's headcount, so a double major counts
//! fully toward the retention figures of both departments.

use std::collections::{BTreeMap, BTreeSet};

use super::normalizer::Normalizer;
use crate::models::{ExpandedRecord, NormalizedRecord, NO_DEGREE};

/// Expanded rows plus the majors that fell back to "other".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandedTable {
    pub records: Vec<ExpandedRecord>,
    /// Unmapped major → summed headcount of the expanded rows naming it.
    pub unmapped_majors: BTreeMap<String, u64>,
}

impl ExpandedTable {
    pub fn total_headcount(&self) -> u64 {
        self.records.iter().map(|r| r.headcount).sum()
    }
}

/// Split a (possibly multi-) major on `separator`, trimming each part.
///
/// Empty parts are dropped; a value with no non-empty part is kept whole.
pub fn split_majors(value: &str, separator: &str) -> Vec<String> {
    let parts: Vec<String> = value
        .split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect();

    if parts.is_empty() {
        vec![value.trim().to_string()]
    } else {
        parts
    }
}

/// Majors named by one cleaned value: the value itself when it is a lookup
/// key, else its separator-split parts.
fn majors_of(value: &str, normalizer: &Normalizer<'_>) -> Vec<String> {
    let config = normalizer.config();
    if config.majors.contains_key(value) {
        vec![value.to_string()]
    } else {
        split_majors(value, &config.separator)
    }
}

/// Expand one row into `starts × ends` single-major rows.
pub fn expand_record(record: &NormalizedRecord, normalizer: &Normalizer<'_>) -> Vec<ExpandedRecord> {
    let starts = majors_of(&record.start_major, normalizer);
    let ends = match &record.end_major {
        Some(end) => majors_of(end, normalizer),
        None => vec![NO_DEGREE.to_string()],
    };
    let earned_departments: Vec<String> = ends
        .iter()
        .map(|end| normalizer.department_of(end).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut expanded = Vec::with_capacity(starts.len() * ends.len());
    for start in &starts {
        let start_department = normalizer.department_of(start);
        for end in &ends {
            expanded.push(ExpandedRecord {
                cohort_year: record.cohort_year,
                start_major: start.clone(),
                end_major: end.clone(),
                start_department: start_department.to_string(),
                end_department: normalizer.department_of(end).to_string(),
                earned_departments: earned_departments.clone(),
                is_urm: record.is_urm,
                is_freshman: record.is_freshman,
                headcount: record.headcount,
            });
        }
    }
    expanded
}

/// Expand every row and tally unmapped majors.
pub fn expand(records: &[NormalizedRecord], normalizer: &Normalizer<'_>) -> ExpandedTable {
    let config = normalizer.config();
    let mut table = ExpandedTable::default();

    for record in records {
        for row in expand_record(record, normalizer) {
            for major in [&row.start_major, &row.end_major] {
                if !config.is_mapped(major) {
                    *table.unmapped_majors.entry(major.clone()).or_insert(0) += row.headcount;
                }
            }
            table.records.push(row);
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DepartmentConfig;
    use crate::models::OTHER;

    fn record(start: &str, end: Option<&str>, headcount: u64) -> NormalizedRecord {
        NormalizedRecord {
            cohort_year: 2014,
            start_major: start.into(),
            end_major: end.map(String::from),
            is_urm: Some(true),
            is_freshman: true,
            headcount,
        }
    }

    fn synthetic() -> DepartmentConfig {
        DepartmentConfig::from_majors([("a", "dept a"), ("b", "dept b"), ("c", "dept c"), ("aos", "aos"), ("math", "math")])
            .unwrap()
    }

    #[test]
    fn test_split_majors() {
        assert_eq!(split_majors("a/b", "/"), vec!["a", "b"]);
        assert_eq!(split_majors("design / media arts", "/"), vec!["design", "media arts"]);
        assert_eq!(split_majors("physics", "/"), vec!["physics"]);
        assert_eq!(split_majors("a//b/", "/"), vec!["a", "b"]);
        assert_eq!(split_majors("/", "/"), vec!["/"]);
    }

    #[test]
    fn test_fan_out_start_only() {
        let config = synthetic();
        let normalizer = Normalizer::new(&config);
        let rows = expand_record(&record("a/b", Some("c"), 7), &normalizer);

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.headcount == 7 && r.end_major == "c"));
        let starts: Vec<&str> = rows.iter().map(|r| r.start_major.as_str()).collect();
        assert_eq!(starts, vec!["a", "b"]);
        assert_eq!(rows[0].start_department, "dept a");
        assert_eq!(rows[1].start_department, "dept b");
    }

    #[test]
    fn test_fan_out_cartesian() {
        let config = synthetic();
        let normalizer = Normalizer::new(&config);
        let rows = expand_record(&record("aos/math", Some("aos/math"), 5), &normalizer);

        assert_eq!(rows.len(), 4);
        let pairs: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.start_major.as_str(), r.end_major.as_str()))
            .collect();
        assert_eq!(pairs, vec![("aos", "aos"), ("aos", "math"), ("math", "aos"), ("math", "math")]);
        assert!(rows.iter().all(|r| r.headcount == 5));
    }

    #[test]
    fn test_fan_out_size_is_product() {
        let config = synthetic();
        let normalizer = Normalizer::new(&config);
        let rows = expand_record(&record("a/b/c", Some("a/b"), 1), &normalizer);
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_no_degree_is_single_sentinel() {
        let config = synthetic();
        let normalizer = Normalizer::new(&config);
        let rows = expand_record(&record("a/b", None, 3), &normalizer);

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.end_major == NO_DEGREE && r.end_department == NO_DEGREE));
    }

    #[test]
    fn test_non_major_fields_copied() {
        let config = synthetic();
        let normalizer = Normalizer::new(&config);
        let mut input = record("a/b", Some("c"), 2);
        input.is_urm = None;
        input.is_freshman = false;
        input.cohort_year = 2011;

        for row in expand_record(&input, &normalizer) {
            assert_eq!(row.cohort_year, 2011);
            assert_eq!(row.is_urm, None);
            assert!(!row.is_freshman);
        }
    }

    #[test]
    fn test_unmapped_majors_tallied() {
        let config = synthetic();
        let normalizer = Normalizer::new(&config);
        let table = expand(
            &[record("a", Some("history"), 4), record("zoology", Some("history"), 1)],
            &normalizer,
        );

        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].end_department, OTHER);
        assert_eq!(table.records[1].start_department, OTHER);
        assert_eq!(table.unmapped_majors.get("history"), Some(&5));
        assert_eq!(table.unmapped_majors.get("zoology"), Some(&1));
        assert_eq!(table.total_headcount(), 5);
    }

    #[test]
    fn test_whole_value_lookup_key_not_split() {
        let config = DepartmentConfig::builtin();
        let normalizer = Normalizer::new(&config);
        let rows = expand_record(
            &record("mathematics/economics", Some("mathematics/economics"), 5),
            &normalizer,
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_department, "math");
        assert_eq!(rows[0].end_department, "math");

        let rows = expand_record(&record("aos/math", Some("aos/math"), 5), &normalizer);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_department, "aos");
    }

    #[test]
    fn test_builtin_double_major_splits_into_known_departments() {
        let config = DepartmentConfig::builtin();
        let normalizer = Normalizer::new(&config);
        let both = "atmospheric and oceanic sciences/mathematics";
        let rows = expand_record(&record(both, Some(both), 5), &normalizer);

        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.start_department != OTHER && r.end_department != OTHER));
        assert!(rows.iter().all(|r| r.earned_departments == vec!["aos", "math"]));
    }
}
