//! JSON Schema validation for department configurations.
//!
//! The schema is embedded at compile time from
//! `schemas/department-config.json` and checked with JSON Schema Draft 7
//! before a configuration is deserialized, so a bad file reports every
//! offending field at once instead of the first serde error.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use retention::validate_department_config;
//!
//! let config = json!({ "majors": { "physics": "physics and astronomy" } });
//! assert!(validate_department_config(&config).is_ok());
//! ```

use serde_json::Value;

const DEPARTMENT_CONFIG_SCHEMA: &str = include_str!("../../schemas/department-config.json");

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Boolean shorthand for [`validate`].
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

fn department_config_schema() -> Value {
    serde_json::from_str(DEPARTMENT_CONFIG_SCHEMA).expect("Invalid embedded schema")
}

/// Validate against the department configuration schema.
pub fn validate_department_config(data: &Value) -> Result<(), Vec<String>> {
    validate(&department_config_schema(), data)
}

/// Quick check against the department configuration schema.
pub fn is_valid_department_config(data: &Value) -> bool {
    is_valid(&department_config_schema(), data)
}
