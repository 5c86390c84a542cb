//! Schema validation helpers.
//!
//! Validates a configuration `serde_json::Value` against a [`Schema`] and
//! reports problems as [`Diagnostic`]s carrying the offending attribute path.
//!
//! # Example
//!
//! ```
//! use vmcloud_provider::schema::{Schema, Attribute};
//! use vmcloud_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("tier", Attribute::optional_int64());
//!
//! let diagnostics = validate(&schema, &json!({"name": "prod", "tier": 21}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "prod", "tier": "large"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("tier".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Block, Diagnostic, DiagnosticSeverity, Schema};
use serde_json::Value;
use std::collections::HashMap;

/// Validate a JSON configuration value against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes must not be set in configuration
/// - Attributes not declared by the schema are rejected
/// - Attribute types must match the schema
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        // An absent configuration is treated as empty.
        Value::Null => {
            for (name, attr) in sorted(&block.attributes) {
                validate_attribute(attr, None, name, diagnostics);
            }
            return;
        }
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return;
        }
    };

    for (name, attr) in sorted(&block.attributes) {
        validate_attribute(attr, obj.get(name), name, diagnostics);
    }

    let mut unknown: Vec<&String> = obj
        .keys()
        .filter(|key| !block.attributes.contains_key(key.as_str()))
        .collect();
    unknown.sort();
    for key in unknown {
        diagnostics.push(
            Diagnostic::error(format!("Unsupported argument '{}'", key))
                .with_detail("An argument with this name is not expected here")
                .with_attribute(key.as_str()),
        );
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        }
        Some(_) if attr.flags.is_computed_only() => {
            diagnostics.push(
                Diagnostic::error(format!("Invalid configuration for '{}'", path))
                    .with_detail("This attribute is computed by the provider and cannot be set")
                    .with_attribute(path),
            );
        }
        Some(v) => {
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
        }
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        }
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        }
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        }
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        }
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        }
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        }
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
            let attr_path = format!("{}.{}", path, name);
            validate_attribute_type(attr_type, value, &attr_path, diagnostics);
        }
    }
}

// Deterministic diagnostic order regardless of HashMap iteration.
fn sorted(attributes: &HashMap<String, Attribute>) -> Vec<(&str, &Attribute)> {
    let mut attrs: Vec<_> = attributes
        .iter()
        .map(|(name, attr)| (name.as_str(), attr))
        .collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    attrs
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.is_i64() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        }
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}
