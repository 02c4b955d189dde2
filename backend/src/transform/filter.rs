//! Row predicates applied ahead of aggregation.

use serde::{Deserialize, Serialize};

use crate::config::CohortWindow;
use crate::models::ExpandedRecord;

/// Equality predicates over expanded rows. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// `Some(true)` keeps URM rows only. Rows with unknown status never match.
    pub urm: Option<bool>,
    /// `Some(true)` keeps freshman admits, `Some(false)` transfers.
    pub freshman: Option<bool>,
    /// Start department.
    pub department: Option<String>,
    /// Cohort years to keep.
    pub cohorts: Option<CohortWindow>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urm(mut self, urm: Option<bool>) -> Self {
        self.urm = urm;
        self
    }

    pub fn with_freshman(mut self, freshman: Option<bool>) -> Self {
        self.freshman = freshman;
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_cohorts(mut self, window: CohortWindow) -> Self {
        self.cohorts = Some(window);
        self
    }

    pub fn matches(&self, record: &ExpandedRecord) -> bool {
        if let Some(urm) = self.urm {
            if record.is_urm != Some(urm) {
                return false;
            }
        }
        if let Some(freshman) = self.freshman {
            if record.is_freshman != freshman {
                return false;
            }
        }
        if let Some(ref department) = self.department {
            if &record.start_department != department {
                return false;
            }
        }
        if let Some(window) = self.cohorts {
            if !window.contains(record.cohort_year) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(urm: Option<bool>, freshman: bool, dept: &str, year: i32) -> ExpandedRecord {
        ExpandedRecord {
            cohort_year: year,
            start_major: "x".into(),
            end_major: "y".into(),
            start_department: dept.into(),
            end_department: "y".into(),
            earned_departments: vec!["y".into()],
            is_urm: urm,
            is_freshman: freshman,
            headcount: 1,
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = RecordFilter::new();
        assert!(filter.matches(&row(None, false, "math", 1999)));
    }

    #[test]
    fn test_urm_filter_excludes_unknown() {
        let urm = RecordFilter::new().with_urm(Some(true));
        let non_urm = RecordFilter::new().with_urm(Some(false));
        let unknown = row(None, true, "math", 2014);

        assert!(!urm.matches(&unknown));
        assert!(!non_urm.matches(&unknown));
        assert!(urm.matches(&row(Some(true), true, "math", 2014)));
    }

    #[test]
    fn test_combined_filter() {
        let filter = RecordFilter::new()
            .with_freshman(Some(false))
            .with_department("math")
            .with_cohorts(CohortWindow::new(2010, 2020));

        assert!(filter.matches(&row(Some(true), false, "math", 2015)));
        assert!(!filter.matches(&row(Some(true), true, "math", 2015)));
        assert!(!filter.matches(&row(Some(true), false, "epss", 2015)));
        assert!(!filter.matches(&row(Some(true), false, "math", 2021)));
    }
}
