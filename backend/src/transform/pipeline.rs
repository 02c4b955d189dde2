//! High-level pipeline API: CSV to an aggregation-ready snapshot.
//!
//! Combines parsing, normalization and expansion. The resulting
//! [`Snapshot`] is immutable; every view aggregates from it.
//!
//! # Example
//!
//! ```rust,ignore
//! use retention::config::DepartmentConfig;
//! use retention::transform::{load_csv, OutcomeRule, RecordFilter};
//! use std::{path::Path, sync::Arc};
//!
//! let config = Arc::new(DepartmentConfig::builtin());
//! let snapshot = load_csv(Path::new("cohorts.csv"), config)?;
//! let table = snapshot.results(&OutcomeRule::Department, &RecordFilter::new());
//! println!("{} result rows", table.len());
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::classifier::OutcomeRule;
use super::expander::expand;
use super::filter::RecordFilter;
use super::grouper::{aggregate_where, ResultTable};
use super::normalizer::Normalizer;
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::config::DepartmentConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::ExpandedRecord;
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};

/// How many unmapped majors are listed in the log.
const UNMAPPED_LOG_LIMIT: usize = 5;

/// CSV file information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Counts gathered while normalizing and expanding.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeStats {
    pub raw_rows: usize,
    pub expanded_rows: usize,
    /// Headcount before expansion.
    pub raw_headcount: u64,
    /// Headcount after expansion; larger than `raw_headcount` when double majors exist.
    pub expanded_headcount: u64,
    /// Majors that fell back to "other", with their expanded headcount.
    pub unmapped_majors: BTreeMap<String, u64>,
}

/// An expanded table plus its provenance.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub run_id: String,
    pub loaded_at: String,
    pub config: Arc<DepartmentConfig>,
    pub csv_info: CsvInfo,
    pub stats: NormalizeStats,
    pub records: Vec<ExpandedRecord>,
}

/// Serializable summary of a [`Snapshot`], without its rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub run_id: String,
    pub loaded_at: String,
    pub config_name: String,
    pub csv_info: CsvInfo,
    pub stats: NormalizeStats,
}

impl Snapshot {
    /// Aggregate the rows matching `filter` under `rule`.
    pub fn results(&self, rule: &OutcomeRule, filter: &RecordFilter) -> ResultTable {
        aggregate_where(&self.records, rule, |record| filter.matches(record))
    }

    /// Division rule of this snapshot's configuration.
    pub fn division_rule(&self) -> OutcomeRule {
        OutcomeRule::division(&self.config)
    }

    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            run_id: self.run_id.clone(),
            loaded_at: self.loaded_at.clone(),
            config_name: self.config.name.clone(),
            csv_info: self.csv_info.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Load a CSV file into a snapshot.
pub fn load_csv(path: &Path, config: Arc<DepartmentConfig>) -> PipelineResult<Snapshot> {
    log_info(format!("Reading CSV file: {}", path.display()));
    let parse_result = parse_csv_file_auto(path)?;
    build_snapshot(parse_result, config)
}

/// Load CSV bytes into a snapshot.
///
/// Same as `load_csv` but accepts raw bytes instead of a file path.
pub fn load_bytes(bytes: &[u8], config: Arc<DepartmentConfig>) -> PipelineResult<Snapshot> {
    log_info(format!("Reading {} uploaded bytes...", bytes.len()));
    let parse_result = parse_bytes_auto(bytes)?;
    build_snapshot(parse_result, config)
}

/// Normalize and expand already-parsed CSV data.
pub fn build_snapshot(parse_result: ParseResult, config: Arc<DepartmentConfig>) -> PipelineResult<Snapshot> {
    log_success(format!("Detected encoding: {}", parse_result.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parse_result.delimiter)));
    log_success(format!("Read {} rows", parse_result.records.len()));

    if parse_result.records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let csv_info = CsvInfo {
        encoding: parse_result.encoding.clone(),
        delimiter: parse_result.delimiter,
        headers: parse_result.headers.clone(),
        row_count: parse_result.records.len(),
    };

    log_info(format!("CSV has {} columns:", csv_info.headers.len()));
    for (i, col) in csv_info.headers.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }

    log_info(format!("Normalizing with config \"{}\"...", config.name));
    let normalizer = Normalizer::new(&config);
    let normalized = normalizer.normalize(&parse_result.records)?;

    log_info("Expanding double majors...");
    let table = expand(&normalized, &normalizer);

    let stats = NormalizeStats {
        raw_rows: normalized.len(),
        expanded_rows: table.records.len(),
        raw_headcount: normalized.iter().map(|r| r.headcount).sum(),
        expanded_headcount: table.total_headcount(),
        unmapped_majors: table.unmapped_majors,
    };
    log_success(format!(
        "{} rows expanded to {} pairs ({} students, {} after double counting)",
        stats.raw_rows, stats.expanded_rows, stats.raw_headcount, stats.expanded_headcount
    ));
    report_unmapped(&stats.unmapped_majors);

    Ok(Snapshot {
        run_id: Uuid::new_v4().to_string(),
        loaded_at: chrono::Utc::now().to_rfc3339(),
        config,
        csv_info,
        stats,
        records: table.records,
    })
}

fn report_unmapped(unmapped: &BTreeMap<String, u64>) {
    if unmapped.is_empty() {
        log_success("All majors mapped to a department");
        return;
    }

    log_warning(format!("{} majors not in the lookup table, counted as \"other\"", unmapped.len()));
    let mut by_headcount: Vec<(&String, &u64)> = unmapped.iter().collect();
    by_headcount.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (major, headcount) in by_headcount.iter().take(UNMAPPED_LOG_LIMIT) {
        log_warning(format!("• {} ({} students)", major, headcount));
    }
    if by_headcount.len() > UNMAPPED_LOG_LIMIT {
        log_warning(format!("... +{}", by_headcount.len() - UNMAPPED_LOG_LIMIT));
    }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
