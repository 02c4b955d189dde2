//! Department lookup configuration.
//!
//! The major → department table and the spelling corrections are data, not
//! code: a [`DepartmentConfig`] is loaded once (built-in default, a JSON file,
//! or the `RETENTION_CONFIG` environment variable) and handed to the
//! [`Normalizer`](crate::transform::Normalizer).
//!
//! The built-in default covers one division's majors. Majors from other
//! divisions fall into the [`OTHER`] department.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{NO_DEGREE, OTHER, UNDECLARED};
use crate::validation::validate_department_config;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "RETENTION_CONFIG";

const BUILTIN_CONFIG: &str = include_str!("../../config/physical-sciences.json");

/// Inclusive cohort-year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortWindow {
    pub first: i32,
    pub last: i32,
}

impl CohortWindow {
    pub fn new(first: i32, last: i32) -> Self {
        Self { first, last }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.first..=self.last).contains(&year)
    }
}

/// Major → department lookup plus the knobs the views need.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepartmentConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Canonical major name → department name.
    pub majors: BTreeMap<String, String>,

    /// Historical spelling → canonical major, applied to start majors.
    #[serde(default)]
    pub corrections: BTreeMap<String, String>,

    /// Joins the majors of a double/triple major.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Human name of the division, used by the undeclared view.
    #[serde(default = "default_division_label")]
    pub division_label: String,

    /// Cohorts the comparison and summary figures average over.
    #[serde(default = "default_window")]
    pub comparison_window: CohortWindow,

    /// Latest cohort that has had time to graduate.
    #[serde(default = "default_last_graduated")]
    pub last_graduated_cohort: i32,
}

fn default_name() -> String {
    "custom".to_string()
}

fn default_separator() -> String {
    "/".to_string()
}

fn default_division_label() -> String {
    "Division".to_string()
}

fn default_window() -> CohortWindow {
    CohortWindow::new(2010, 2020)
}

fn default_last_graduated() -> i32 {
    2020
}

impl DepartmentConfig {
    /// The embedded default table.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_CONFIG).expect("Invalid embedded department config")
    }

    /// Build a config from a bare lookup table, everything else defaulted.
    pub fn from_majors<I, K, V>(majors: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let config = Self {
            name: default_name(),
            majors: majors.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            corrections: BTreeMap::new(),
            separator: default_separator(),
            division_label: default_division_label(),
            comparison_window: default_window(),
            last_graduated_cohort: default_last_graduated(),
        };
        config.canonicalize().check()
    }

    /// Add spelling corrections.
    pub fn with_corrections<I, K, V>(mut self, corrections: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.corrections
            .extend(corrections.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.canonicalize().check()
    }

    /// Parse, schema-validate and check a JSON config.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        validate_department_config(&value).map_err(|errors| ConfigError::SchemaError { errors })?;
        let config: DepartmentConfig = serde_json::from_value(value)?;
        config.canonicalize().check()
    }

    /// Load a JSON config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Explicit path, else `RETENTION_CONFIG`, else the built-in table.
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(env_path) if !env_path.is_empty() => Self::load(&PathBuf::from(env_path)),
            _ => Ok(Self::builtin()),
        }
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Department of a single, already-cleaned major.
    ///
    /// The sentinels map to themselves; anything absent maps to [`OTHER`].
    pub fn department_of<'a>(&'a self, major: &str) -> &'a str {
        match major {
            NO_DEGREE => NO_DEGREE,
            UNDECLARED => UNDECLARED,
            _ => self.majors.get(major).map(String::as_str).unwrap_or(OTHER),
        }
    }

    /// True when `major` is in the lookup table or is a sentinel.
    pub fn is_mapped(&self, major: &str) -> bool {
        major == NO_DEGREE || major == UNDECLARED || self.majors.contains_key(major)
    }

    /// Corrected spelling of a start major (identity when there is none).
    pub fn correct<'a>(&'a self, major: &'a str) -> &'a str {
        self.corrections.get(major).map(String::as_str).unwrap_or(major)
    }

    /// Every department named in the lookup table.
    pub fn division_departments(&self) -> BTreeSet<String> {
        self.majors.values().cloned().collect()
    }

    /// Lowercase and trim every key and value so lookups match cleaned input.
    fn canonicalize(mut self) -> Self {
        let clean = |s: &String| s.trim().to_lowercase();
        self.majors = self.majors.iter().map(|(k, v)| (clean(k), clean(v))).collect();
        self.corrections = self
            .corrections
            .iter()
            .map(|(k, v)| (clean(k), clean(v)))
            .collect();
        self
    }

    fn check(self) -> ConfigResult<Self> {
        if self.separator.is_empty() {
            return Err(ConfigError::Invalid("separator must not be empty".into()));
        }
        if self.comparison_window.first > self.comparison_window.last {
            return Err(ConfigError::Invalid(format!(
                "comparison window {}..{} is empty",
                self.comparison_window.first, self.comparison_window.last
            )));
        }
        for sentinel in [NO_DEGREE, UNDECLARED, OTHER] {
            if self.majors.values().any(|d| d == sentinel) {
                return Err(ConfigError::Invalid(format!(
                    "department name '{}' is reserved",
                    sentinel
                )));
            }
        }
        // A correction whose target is itself corrected would not be idempotent.
        if let Some((from, to)) = self
            .corrections
            .iter()
            .find(|(_, to)| self.corrections.contains_key(to.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "correction '{}' -> '{}' chains into another correction",
                from, to
            )));
        }
        Ok(self)
    }
}

impl Default for DepartmentConfig {
    fn default() -> Self {
        Self::builtin()
    }
}
