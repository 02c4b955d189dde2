//! Group expanded rows into per-outcome shares of each cohort/department.
//!
//! # Architecture
//!
//! ```text
//! Expanded rows                        →  Result rows
//! ┌──────────────────────────────┐       ┌──────────────────────────────────┐
//! │ 2014 physics → physics   10  │       │ 2014 physics retained      66.7% │
//! │ 2014 physics → no degree  5  │  →    │ 2014 physics other_degree   0.0% │
//! └──────────────────────────────┘       │ 2014 physics no_degree     33.3% │
//!                                        └──────────────────────────────────┘
//! ```
//!
//! Sums by (cohort, start department, outcome) and by (cohort, start
//! department) are computed separately and joined. Every cohort/department
//! key emits all three outcomes; a missing outcome is a zero row. A zero
//! total yields the `0.0` sentinel percentage instead of a division.
//!
//! All views go through [`aggregate_where`]; filtering happens on expanded
//! rows before any grouping.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::classifier::OutcomeRule;
use crate::models::{percentage, CohortDeptTotal, ExpandedRecord, Outcome, OutcomeRow, ResultRow};

/// Sum headcount by (cohort, start department, outcome).
pub fn group_outcomes<'r, I>(records: I, rule: &OutcomeRule) -> Vec<OutcomeRow>
where
    I: IntoIterator<Item = &'r ExpandedRecord>,
{
    let mut sums: BTreeMap<(i32, String, Outcome), u64> = BTreeMap::new();
    for record in records {
        let outcome = rule.classify_record(record);
        *sums
            .entry((record.cohort_year, record.start_department.clone(), outcome))
            .or_insert(0) += record.headcount;
    }

    sums.into_iter()
        .map(|((cohort_year, start_department, outcome), headcount)| OutcomeRow {
            cohort_year,
            start_department,
            outcome,
            headcount,
        })
        .collect()
}

/// Sum headcount by (cohort, start department).
pub fn cohort_totals<'r, I>(records: I) -> Vec<CohortDeptTotal>
where
    I: IntoIterator<Item = &'r ExpandedRecord>,
{
    let mut sums: BTreeMap<(i32, String), u64> = BTreeMap::new();
    for record in records {
        *sums
            .entry((record.cohort_year, record.start_department.clone()))
            .or_insert(0) += record.headcount;
    }

    sums.into_iter()
        .map(|((cohort_year, start_department), total_headcount)| CohortDeptTotal {
            cohort_year,
            start_department,
            total_headcount,
        })
        .collect()
}

/// Join outcome sums with their totals, one row per outcome per key.
pub fn join_percentages(outcomes: &[OutcomeRow], totals: &[CohortDeptTotal]) -> Vec<ResultRow> {
    let by_key: HashMap<(i32, &str, Outcome), u64> = outcomes
        .iter()
        .map(|row| ((row.cohort_year, row.start_department.as_str(), row.outcome), row.headcount))
        .collect();

    let mut rows = Vec::with_capacity(totals.len() * Outcome::ALL.len());
    for total in totals {
        for outcome in Outcome::ALL {
            let headcount = by_key
                .get(&(total.cohort_year, total.start_department.as_str(), outcome))
                .copied()
                .unwrap_or(0);
            rows.push(ResultRow {
                cohort_year: total.cohort_year,
                start_department: total.start_department.clone(),
                outcome,
                headcount,
                total_headcount: total.total_headcount,
                percentage: percentage(headcount, total.total_headcount),
            });
        }
    }
    rows
}

/// Aggregate every row.
pub fn aggregate(records: &[ExpandedRecord], rule: &OutcomeRule) -> ResultTable {
    aggregate_where(records, rule, |_| true)
}

/// Aggregate the rows matching `predicate`.
pub fn aggregate_where<F>(records: &[ExpandedRecord], rule: &OutcomeRule, predicate: F) -> ResultTable
where
    F: Fn(&ExpandedRecord) -> bool,
{
    let selected: Vec<&ExpandedRecord> = records.iter().filter(|r| predicate(*r)).collect();
    let outcomes = group_outcomes(selected.iter().copied(), rule);
    let totals = cohort_totals(selected.iter().copied());
    ResultTable {
        rows: join_percentages(&outcomes, &totals),
    }
}

/// Result rows ordered by cohort, department, then outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter()
    }

    pub fn get(&self, cohort_year: i32, department: &str, outcome: Outcome) -> Option<&ResultRow> {
        self.rows.iter().find(|r| {
            r.cohort_year == cohort_year && r.start_department == department && r.outcome == outcome
        })
    }

    pub fn for_department<'a>(&'a self, department: &'a str) -> impl Iterator<Item = &'a ResultRow> + 'a {
        self.rows.iter().filter(move |r| r.start_department == department)
    }

    pub fn for_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter().filter(move |r| r.outcome == outcome)
    }

    /// Distinct cohort years, ascending.
    pub fn cohorts(&self) -> Vec<i32> {
        self.rows
            .iter()
            .map(|r| r.cohort_year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct start departments, sorted.
    pub fn departments(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.start_department.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DepartmentConfig;
    use crate::models::{NormalizedRecord, RawRecord, NO_DEGREE};
    use crate::transform::expander::expand;
    use crate::transform::filter::RecordFilter;
    use crate::transform::normalizer::Normalizer;

    fn expanded(start_dept: &str, end_dept: &str, year: i32, headcount: u64) -> ExpandedRecord {
        ExpandedRecord {
            cohort_year: year,
            start_major: start_dept.into(),
            end_major: end_dept.into(),
            start_department: start_dept.into(),
            end_department: end_dept.into(),
            earned_departments: vec![end_dept.into()],
            is_urm: Some(false),
            is_freshman: true,
            headcount,
        }
    }

    fn raw(start: &str, end: Option<&str>, headcount: u64) -> RawRecord {
        RawRecord {
            cohort: "2014-15".into(),
            start_major: start.into(),
            end_major: end.map(String::from),
            urm: Some("Non-URM".into()),
            admission_type: "Freshman".into(),
            headcount,
            line: None,
        }
    }

    fn closure_holds(table: &ResultTable) {
        let mut sums: BTreeMap<(i32, String), f64> = BTreeMap::new();
        for row in table.iter().filter(|r| r.has_data()) {
            *sums.entry((row.cohort_year, row.start_department.clone())).or_insert(0.0) += row.percentage;
        }
        for (key, sum) in sums {
            assert!((sum - 100.0).abs() < 1e-6, "{:?} sums to {}", key, sum);
        }
    }

    #[test]
    fn test_physics_scenario() {
        let config = DepartmentConfig::builtin();
        let normalizer = Normalizer::new(&config);
        let rows = vec![raw("Physics", Some("Physics"), 10), raw("Physics", None, 5)];

        let normalized: Vec<NormalizedRecord> = normalizer.normalize(&rows).unwrap();
        let table = expand(&normalized, &normalizer);
        let results = aggregate(&table.records, &OutcomeRule::Department);

        let dept = "physics and astronomy";
        assert_eq!(results.len(), 3);

        let retained = results.get(2014, dept, Outcome::Retained).unwrap();
        assert_eq!(retained.headcount, 10);
        assert_eq!(retained.total_headcount, 15);
        assert!((retained.percentage - 66.666_666_7).abs() < 1e-6);

        let no_degree = results.get(2014, dept, Outcome::NoDegree).unwrap();
        assert_eq!(no_degree.headcount, 5);
        assert!((no_degree.percentage - 33.333_333_3).abs() < 1e-6);

        let other = results.get(2014, dept, Outcome::OtherDegree).unwrap();
        assert_eq!(other.headcount, 0);
        assert_eq!(other.percentage, 0.0);

        closure_holds(&results);
    }

    #[test]
    fn test_double_major_counts_toward_both_departments() {
        let config = DepartmentConfig::from_majors([("aos", "aos"), ("math", "math")]).unwrap();
        let normalizer = Normalizer::new(&config);
        let normalized = normalizer.normalize(&[raw("aos/math", Some("aos/math"), 5)]).unwrap();
        let table = expand(&normalized, &normalizer);
        assert_eq!(table.records.len(), 4);

        assert!(table
            .records
            .iter()
            .all(|r| OutcomeRule::Department.classify_record(r) == Outcome::Retained));

        let results = aggregate(&table.records, &OutcomeRule::Department);
        for dept in ["aos", "math"] {
            let retained = results.get(2014, dept, Outcome::Retained).unwrap();
            assert_eq!(retained.headcount, 10);
            assert_eq!(retained.total_headcount, 10);
            assert_eq!(retained.percentage, 100.0);
            let other = results.get(2014, dept, Outcome::OtherDegree).unwrap();
            assert_eq!(other.headcount, 0);
        }
        closure_holds(&results);
    }

    #[test]
    fn test_slash_named_single_major_stays_one_department() {
        let config = DepartmentConfig::builtin();
        let normalizer = Normalizer::new(&config);
        let normalized = normalizer
            .normalize(&[raw("Mathematics/Economics", Some("Mathematics/Economics"), 5)])
            .unwrap();
        let table = expand(&normalized, &normalizer);
        let results = aggregate(&table.records, &OutcomeRule::Department);

        assert_eq!(results.departments(), vec!["math"]);
        let retained = results.get(2014, "math", Outcome::Retained).unwrap();
        assert_eq!(retained.headcount, 5);
        assert_eq!(retained.percentage, 100.0);
    }

    #[test]
    fn test_closure_over_many_groups() {
        let records = vec![
            expanded("math", "math", 2012, 3),
            expanded("math", "epss", 2012, 4),
            expanded("math", NO_DEGREE, 2012, 2),
            expanded("epss", "epss", 2012, 7),
            expanded("epss", NO_DEGREE, 2013, 1),
            expanded("math", "math", 2013, 9),
            expanded("aos", "math", 2013, 6),
        ];
        let results = aggregate(&records, &OutcomeRule::Department);

        assert_eq!(results.len(), 5 * 3);
        assert_eq!(results.cohorts(), vec![2012, 2013]);
        assert_eq!(results.departments(), vec!["aos", "epss", "math"]);
        closure_holds(&results);
    }

    #[test]
    fn test_zero_total_uses_sentinel() {
        let records = vec![expanded("math", "math", 2015, 0), expanded("math", NO_DEGREE, 2015, 0)];
        let results = aggregate(&records, &OutcomeRule::Department);

        assert_eq!(results.len(), 3);
        for row in results.iter() {
            assert_eq!(row.percentage, 0.0);
            assert!(!row.has_data());
        }
    }

    #[test]
    fn test_aggregate_where_filters_before_grouping() {
        let mut transfer = expanded("math", NO_DEGREE, 2012, 8);
        transfer.is_freshman = false;
        let records = vec![expanded("math", "math", 2012, 2), transfer];

        let filter = RecordFilter::new().with_freshman(Some(true));
        let results = aggregate_where(&records, &OutcomeRule::Department, |r| filter.matches(r));

        let retained = results.get(2012, "math", Outcome::Retained).unwrap();
        assert_eq!(retained.total_headcount, 2);
        assert_eq!(retained.percentage, 100.0);
    }

    #[test]
    fn test_empty_selection_is_empty_table() {
        let records = vec![expanded("math", "math", 2012, 2)];
        let results = aggregate_where(&records, &OutcomeRule::Department, |_| false);
        assert!(results.is_empty());
    }

    #[test]
    fn test_group_and_totals_separately() {
        let records = vec![
            expanded("math", "math", 2012, 2),
            expanded("math", "math", 2012, 3),
            expanded("math", "epss", 2012, 1),
        ];
        let outcomes = group_outcomes(&records, &OutcomeRule::Department);
        let totals = cohort_totals(&records);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].outcome, Outcome::Retained);
        assert_eq!(outcomes[0].headcount, 5);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].total_headcount, 6);
    }

    #[test]
    fn test_order_independent() {
        let mut records = vec![
            expanded("math", "math", 2012, 2),
            expanded("epss", NO_DEGREE, 2011, 3),
            expanded("math", "epss", 2012, 1),
        ];
        let forward = aggregate(&records, &OutcomeRule::Department);
        records.reverse();
        let backward = aggregate(&records, &OutcomeRule::Department);
        assert_eq!(forward, backward);
    }
}
