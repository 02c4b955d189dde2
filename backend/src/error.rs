//! Error types for the retention pipeline.
//!
//! - [`CsvError`] - CSV ingestion errors
//! - [`NormalizeError`] - Row canonicalization errors (fatal for the batch)
//! - [`ConfigError`] - Department configuration errors
//! - [`ViewError`] - Errors building a presentation view
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP API errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors during CSV ingestion.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid CSV format.
    #[error("Invalid CSV format: {0}")]
    ParseError(String),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// A required logical column has no matching header.
    #[error("Missing column for '{field}' (accepted headers: {accepted})")]
    MissingColumn { field: &'static str, accepted: String },

    /// Headcount is not a non-negative integer.
    #[error("Line {line}: invalid headcount '{value}'")]
    InvalidHeadcount { line: u64, value: String },
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        CsvError::ParseError(err.to_string())
    }
}

// =============================================================================
// Normalization Errors
// =============================================================================

/// Errors while canonicalizing a single row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    /// The cohort label does not start with a 4-digit year.
    #[error("Malformed cohort label '{label}': expected a leading 4-digit year")]
    MalformedCohortLabel { label: String },

    /// A categorical field holds a value outside its vocabulary.
    #[error("Unrecognized {field} value '{value}'")]
    UnrecognizedCategory { field: &'static str, value: String },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors loading or checking a department configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error.
    #[error("Config IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Config JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Schema validation failed.
    #[error("Config does not match schema: {}", .errors.join("; "))]
    SchemaError { errors: Vec<String> },

    /// Structurally valid but semantically inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// View Errors
// =============================================================================

/// Errors building a presentation view.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewError {
    /// The requested start department does not occur in the data.
    #[error("Unknown department: {0}")]
    UnknownDepartment(String),

    /// A subgroup selector could not be parsed.
    #[error("Invalid {field} selector '{value}'")]
    InvalidSelector { field: &'static str, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Every variant aborts the whole run; no partial tables are produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV ingestion error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// A row failed normalization. `row` is the CSV line (header = 1), or the
    /// 1-based record index for rows not read from a file.
    #[error("Row {row}: {source}")]
    Normalize {
        row: usize,
        #[source]
        source: NormalizeError,
    },

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// View error.
    #[error("View error: {0}")]
    View(#[from] ViewError),

    /// No records to aggregate.
    #[error("No records to aggregate")]
    EmptyInput,

    /// IO error outside CSV reading (output files, cache keys).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No dataset has been loaded yet.
    #[error("No dataset loaded")]
    NoDataset,

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ViewError> for ServerError {
    fn from(err: ViewError) -> Self {
        ServerError::Pipeline(PipelineError::View(err))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for normalization of a single row.
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for view construction.
pub type ViewResult<T> = Result<T, ViewError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> PipelineError
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // ConfigError -> PipelineError
        let config_err = ConfigError::Invalid("separator must not be empty".into());
        let pipeline_err: PipelineError = config_err.into();
        assert!(pipeline_err.to_string().contains("separator"));
    }

    #[test]
    fn test_normalize_error_carries_row() {
        let err = PipelineError::Normalize {
            row: 7,
            source: NormalizeError::MalformedCohortLabel { label: "F14".into() },
        };
        let msg = err.to_string();
        assert!(msg.contains("Row 7"));
        assert!(msg.contains("F14"));
    }

    #[test]
    fn test_category_error_format() {
        let err = NormalizeError::UnrecognizedCategory {
            field: "admission type",
            value: "readmit".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("admission type"));
        assert!(msg.contains("readmit"));
    }

    #[test]
    fn test_schema_error_joins_messages() {
        let err = ConfigError::SchemaError {
            errors: vec!["a is required".into(), "b is not a string".into()],
        };
        assert_eq!(
            err.to_string(),
            "Config does not match schema: a is required; b is not a string"
        );
    }
}
