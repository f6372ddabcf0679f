//! Template context handling.
//!
//! A context is a string-keyed mapping of template variables. Several layers
//! are merged for every render: the process-wide default context, the
//! template's base context, and the caller's context, later layers winning.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// String-keyed template variable mapping
pub type Context = Map<String, Value>;

/// Merges context layers in order; a key in a later layer overrides the
/// same key in an earlier one.
pub fn merge_contexts(layers: &[&Context]) -> Context {
    let mut merged = Context::new();
    for layer in layers {
        for (key, value) in layer.iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Converts any serializable value into a context.
///
/// Fails with a validation error when the value does not serialize to a
/// JSON object.
pub fn to_context<T: Serialize + ?Sized>(value: &T) -> AppResult<Context> {
    let value = serde_json::to_value(value).map_err(|e| AppError::Validation {
        field: "context".to_string(),
        reason: format!("Context could not be serialized: {}", e),
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Validation {
            field: "context".to_string(),
            reason: format!("Context must be a mapping, got {}", json_type_name(&other)),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
