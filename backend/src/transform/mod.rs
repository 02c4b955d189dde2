//! Transformation module.
//!
//! Rows pass through these stages in order:
//! - Normalizer: raw rows to canonical rows
//! - Expander: double majors to single-major pairs
//! - Classifier: pair to outcome
//! - Filter / Grouper: predicate, then per-outcome shares
//! - Pipeline: ties the stages together into a cached snapshot

pub mod classifier;
pub mod expander;
pub mod filter;
pub mod grouper;
pub mod normalizer;
pub mod pipeline;

pub use classifier::OutcomeRule;
pub use expander::{expand, expand_record, split_majors, ExpandedTable};
pub use filter::RecordFilter;
pub use grouper::{aggregate, aggregate_where, cohort_totals, group_outcomes, join_percentages, ResultTable};
pub use normalizer::Normalizer;
pub use pipeline::*;
