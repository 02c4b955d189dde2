//! # Retention - department retention of entering student cohorts
//!
//! Reads institutional enrollment exports (one row per group of students
//! sharing a cohort, start major, end major, URM status and admission type)
//! and reports, per cohort and start department, the share of students who
//! stayed, moved to another department, or left without a degree.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│ Normalizer  │────▶│  Expander   │────▶│  Grouper    │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (lookup cfg)│     │(double maj.)│     │ (% shares)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retention::{load_csv, views, DepartmentConfig, Subgroup};
//! use std::{path::Path, sync::Arc};
//!
//! let snapshot = load_csv(Path::new("cohorts.csv"), Arc::new(DepartmentConfig::builtin()))?;
//! let comparison = views::department_comparison(&snapshot, Subgroup::default());
//! for entry in comparison.entries {
//!     println!("{:40} {:5.1}%", entry.department, entry.retention_rate);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Row types and outcomes
//! - [`config`] - Major → department lookup
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Normalization, expansion, classification, aggregation
//! - [`views`] - Chart-ready timelines and comparisons
//! - [`validation`] - Config schema validation
//! - [`cache`] - Snapshot caching
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;
pub mod validation;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Presentation
pub mod views;

// Caching
pub mod cache;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, CsvError, NormalizeError, PipelineError, PipelineResult, ServerError, ViewError,
};

// =============================================================================
// Re-exports - Models & config
// =============================================================================

pub use config::{CohortWindow, DepartmentConfig};
pub use models::{
    CohortDeptTotal, ExpandedRecord, NormalizedRecord, Outcome, OutcomeRow, RawRecord, ResultRow, NO_DEGREE,
    OTHER, UNDECLARED,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto, parse_str,
    ParseResult,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    aggregate, aggregate_where, build_snapshot, expand, load_bytes, load_csv, CsvInfo, NormalizeStats,
    Normalizer, OutcomeRule, RecordFilter, ResultTable, Snapshot, SnapshotInfo,
};

// =============================================================================
// Re-exports - Views & cache
// =============================================================================

pub use cache::{SnapshotCache, SourceKey};
pub use views::{Comparison, StudentType, Subgroup, Timeline, UrmStatus};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
