//! Attribute set validation against a [`Schema`].
//!
//! Validation runs before any remote call. Besides per-attribute type checks
//! it enforces the cross-attribute constraints declared on the schema, so a
//! lookup that names both `id` and `name`, or a type filter without a name,
//! is rejected without touching the API.
//!
//! # Example
//!
//! ```
//! use remote_resource_provider::schema::{Attribute, Schema};
//! use remote_resource_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("id", Attribute::optional_computed_string().with_exactly_one_of(["id", "name"]))
//!     .with_attribute("name", Attribute::optional_computed_string().with_exactly_one_of(["id", "name"]));
//!
//! assert!(validate(&schema, &json!({"name": "prod"})).is_empty());
//! assert_eq!(validate(&schema, &json!({"id": "1", "name": "prod"})).len(), 1);
//! ```

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

use crate::attributes::type_name;
use crate::error::{ProviderError, Result};
use crate::lookup::discriminators_match;
use crate::schema::{
    Attribute, AttributeType, Block, Diagnostic, DiagnosticSeverity, NestedBlock, Schema,
};

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the remote entity sets these)
/// - Attribute types and allowed values must match the schema
/// - `exactly_one_of`, `conflicts_with` and `required_with` hold
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate and convert error diagnostics into [`ProviderError::Validation`].
pub fn validate_result(schema: &Schema, value: &Value) -> Result<()> {
    let errors: Vec<_> = validate(schema, value)
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation(errors))
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    validate_constraints(&block.attributes, obj, path, diagnostics);

    for (name, nested) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_read_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if let (false, Some(s)) = (attr.allowed_values.is_empty(), v.as_str()) {
                if !attr.allowed_values.iter().any(|allowed| discriminators_match(allowed, s)) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(format!(
                                "Expected one of [{}], got \"{}\"",
                                attr.allowed_values.join(", "),
                                s
                            ))
                            .with_attribute(path),
                    );
                }
            }
        },
    }
}

fn validate_constraints(
    attributes: &HashMap<String, Attribute>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let is_set = |name: &str| obj.get(name).is_some_and(|v| !v.is_null());

    // Each member of an exactly_one_of group repeats the group; check it once.
    let groups: BTreeSet<BTreeSet<&str>> = attributes
        .values()
        .filter(|attr| !attr.exactly_one_of.is_empty())
        .map(|attr| attr.exactly_one_of.iter().map(String::as_str).collect())
        .collect();

    for group in groups {
        let set: Vec<&str> = group.iter().copied().filter(|name| is_set(name)).collect();
        let listed = group.iter().copied().collect::<Vec<_>>().join(", ");
        if set.len() != 1 {
            let summary = if set.is_empty() {
                format!("Exactly one of [{}] must be set", listed)
            } else {
                format!("Only one of [{}] may be set, got [{}]", listed, set.join(", "))
            };
            let mut diag = Diagnostic::error(summary);
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
        }
    }

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &attributes[name];
        if !is_set(name) {
            continue;
        }
        let attr_path = join_path(path, name);

        for other in &attr.conflicts_with {
            // Report each conflicting pair once.
            if is_set(other) && (other > name || !declares_conflict(attributes, other, name)) {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Attribute '{}' conflicts with '{}'",
                        attr_path,
                        join_path(path, other)
                    ))
                    .with_attribute(attr_path.clone()),
                );
            }
        }

        for other in &attr.required_with {
            if !is_set(other) {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Attribute '{}' requires '{}' to be set",
                        attr_path,
                        join_path(path, other)
                    ))
                    .with_attribute(attr_path.clone()),
                );
            }
        }
    }
}

fn declares_conflict(attributes: &HashMap<String, Attribute>, name: &str, other: &str) -> bool {
    attributes
        .get(name)
        .is_some_and(|attr| attr.conflicts_with.iter().any(|c| c == other))
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
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
        AttributeType::Dynamic => {},
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(Value::Array(items)) => {
            let len = items.len() as u32;
            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        // A single block may be written as a bare object.
        Some(v @ Value::Object(_)) if nested.max_items == 1 => {
            validate_block(&nested.block, v, path, diagnostics);
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.as_i64().is_some()
                || n.as_f64()
                    .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!("Expected {}, got {}", expected, type_name(got))),
        attribute: Some(path.to_string()),
    }
}
