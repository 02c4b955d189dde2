//! REST API request and response types.
//!
//! Views serialize as-is; these types only add the request selectors and
//! the upload / error envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{PipelineError, ServerError, ViewError};
use crate::transform::{OutcomeRule, ResultTable, Snapshot, SnapshotInfo};
use crate::views::{StudentType, Subgroup, UrmStatus};

/// `?urm=all|urm|non-urm&student_type=all|freshman|transfer`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ViewQuery {
    pub urm: Option<String>,
    pub student_type: Option<String>,
}

impl ViewQuery {
    pub fn subgroup(&self) -> Result<Subgroup, ViewError> {
        let urm = match self.urm.as_deref() {
            Some(value) => value.parse::<UrmStatus>()?,
            None => UrmStatus::All,
        };
        let student_type = match self.student_type.as_deref() {
            Some(value) => value.parse::<StudentType>()?,
            None => StudentType::All,
        };
        Ok(Subgroup::new(urm, student_type))
    }
}

/// `GET /api/results` selectors: a subgroup plus an optional department and rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResultsQuery {
    pub urm: Option<String>,
    pub student_type: Option<String>,
    pub department: Option<String>,
    /// `department` (default) or `division`.
    pub rule: Option<String>,
}

impl ResultsQuery {
    pub fn subgroup(&self) -> Result<Subgroup, ViewError> {
        ViewQuery {
            urm: self.urm.clone(),
            student_type: self.student_type.clone(),
        }
        .subgroup()
    }

    pub fn rule(&self, snapshot: &Snapshot) -> Result<OutcomeRule, ViewError> {
        match self.rule.as_deref().map(|r| r.trim().to_lowercase()) {
            None => Ok(OutcomeRule::Department),
            Some(rule) if rule.is_empty() || rule == "department" => Ok(OutcomeRule::Department),
            Some(rule) if rule == "division" => Ok(snapshot.division_rule()),
            Some(rule) => Err(ViewError::InvalidSelector { field: "rule", value: rule }),
        }
    }
}

/// Response sent after a CSV upload replaced the dataset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Run id of the new snapshot
    pub job_id: String,
    /// "ready", or "warning" when some majors fell back to "other"
    pub status: String,
    pub file_name: Option<String>,
    pub departments: Vec<String>,
    pub metadata: SnapshotInfo,
}

impl UploadResponse {
    pub fn new(snapshot: &Snapshot, file_name: Option<String>) -> Self {
        let status = if snapshot.stats.unmapped_majors.is_empty() {
            "ready"
        } else {
            "warning"
        };
        Self {
            job_id: snapshot.run_id.clone(),
            status: status.to_string(),
            file_name,
            departments: crate::views::departments(snapshot),
            metadata: snapshot.info(),
        }
    }
}

/// Raw result rows of one aggregation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub run_id: String,
    pub rule: OutcomeRule,
    pub subgroup: Subgroup,
    pub department: Option<String>,
    pub rows: ResultTable,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NoDataset => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Pipeline(err) => match err {
                PipelineError::View(ViewError::UnknownDepartment(_)) => StatusCode::NOT_FOUND,
                PipelineError::View(ViewError::InvalidSelector { .. }) => StatusCode::BAD_REQUEST,
                PipelineError::Csv(_) | PipelineError::Normalize { .. } | PipelineError::EmptyInput => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PipelineError::Config(_) | PipelineError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(error_response(&self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CsvError;

    #[test]
    fn test_view_query_defaults_to_everyone() {
        let subgroup = ViewQuery::default().subgroup().unwrap();
        assert_eq!(subgroup, Subgroup::default());
    }

    #[test]
    fn test_view_query_parses_selectors() {
        let query = ViewQuery {
            urm: Some("non-urm".into()),
            student_type: Some("Transfer".into()),
        };
        let subgroup = query.subgroup().unwrap();
        assert_eq!(subgroup.urm, UrmStatus::NonUrm);
        assert_eq!(subgroup.student_type, StudentType::Transfer);
    }

    #[test]
    fn test_view_query_rejects_unknown_selector() {
        let query = ViewQuery {
            urm: None,
            student_type: Some("graduate".into()),
        };
        assert!(matches!(
            query.subgroup(),
            Err(ViewError::InvalidSelector { field: "student_type", .. })
        ));
    }

    #[test]
    fn test_status_codes() {
        let unknown: ServerError = PipelineError::View(ViewError::UnknownDepartment("x".into())).into();
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

        let csv: ServerError = PipelineError::Csv(CsvError::EmptyFile).into();
        assert_eq!(csv.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(ServerError::NoDataset.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ServerError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("No file provided");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No file provided");
    }
}
