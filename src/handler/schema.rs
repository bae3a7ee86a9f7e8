//! Input schema checks for query handlers.
//!
//! Parameters arrive as untyped JSON. They are decoded into the handler's
//! input type and then run through its `validator` rules; either failure
//! yields a `VALIDATION_ERROR` naming the offending field paths.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::{bus::DataAccessError, core::error::ErrorCode};

/// Decodes and validates raw parameters into `T`.
pub fn validate_params<T>(params: Value) -> Result<T, DataAccessError>
where
    T: DeserializeOwned + Validate,
{
    let input: T = serde_json::from_value(params).map_err(|e| {
        DataAccessError::new(ErrorCode::ValidationError, "Invalid query parameters")
            .with_details(json!({ "fields": [], "reason": e.to_string() }))
    })?;

    input.validate().map_err(|errors| {
        let violations = violations(&errors);
        let fields: Vec<String> = violations.iter().map(|(path, _)| path.clone()).collect();
        let rules: Vec<Value> = violations
            .into_iter()
            .map(|(path, code)| json!({ "field": path, "rule": code }))
            .collect();

        DataAccessError::new(
            ErrorCode::ValidationError,
            format!("Invalid query parameters: {}", fields.join(", ")),
        )
        .with_details(json!({ "fields": fields, "violations": rules }))
    })?;

    Ok(input)
}

/// Flattens nested validation errors into `(field path, rule code)` pairs,
/// sorted by path. Nested structs use `a.b`, list items use `items[2].name`.
pub fn violations(errors: &ValidationErrors) -> Vec<(String, String)> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort();
    out.dedup();
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push((path.clone(), error.code.to_string()));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}
