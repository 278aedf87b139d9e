//! Type and presence checks for declared values.
//!
//! Validates a declared `serde_json::Value` against a [`Schema`] before any
//! domain rule or remote call runs. Problems come back as attribute-scoped
//! diagnostics so the engine can point at the offending field.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_terraxcel::schema::{Attribute, Schema};
//! use hemmer_provider_terraxcel::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("file_name", Attribute::required_string())
//!     .with_attribute("id", Attribute::computed_string());
//!
//! assert!(validate(&schema, &json!({"file_name": "budget"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"file_name": 7}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("file_name".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Check `value` against `schema`.
///
/// Required attributes must be present and non-null, optional ones may be
/// absent or null, and computed-only attributes are skipped. Present values
/// must match the declared type. An empty result means the value is valid.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return diagnostics,
        other => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(other))),
            );
            return diagnostics;
        },
    };

    // Sorted so diagnostics come back in a stable order.
    let mut names: Vec<&String> = schema.block.attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &schema.block.attributes[name];
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }
    diagnostics
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("Declare a value for this attribute")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
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
        AttributeType::List(element_type) => match value.as_array() {
            Some(arr) => {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "list", value)),
        },
        AttributeType::Object(attrs) => match value.as_object() {
            Some(obj) => validate_object_type(attrs, obj, path, diagnostics),
            None => diagnostics.push(type_error(path, "object", value)),
        },
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Object members carry no flags, so presence is not enforced.
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            let attr_path = format!("{}.{}", path, name);
            validate_attribute_type(attr_type, value, &attr_path, diagnostics);
        }
    }
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
        Value::Number(n) if n.is_i64() => true,
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
            .unwrap_or(false),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        ))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeFlags;
    use serde_json::json;

    fn sheet_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("workbook_id", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "pos",
                Attribute::new(
                    AttributeType::Int64,
                    AttributeFlags {
                        optional: true,
                        computed: true,
                        ..Default::default()
                    },
                ),
            )
    }

    #[test]
    fn test_validate_required_string() {
        let schema = sheet_schema();

        assert!(validate(&schema, &json!({"workbook_id": "wb-1", "name": "Data"})).is_empty());

        let diagnostics = validate(&schema, &json!({"workbook_id": "wb-1"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"workbook_id": "wb-1", "name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"workbook_id": "wb-1", "name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_optional_computed_is_type_checked() {
        let schema = sheet_schema();

        let ok = json!({"workbook_id": "wb-1", "name": "Data", "pos": 2});
        assert!(validate(&schema, &ok).is_empty());

        let ok = json!({"workbook_id": "wb-1", "name": "Data", "pos": 2.0});
        assert!(validate(&schema, &ok).is_empty());

        let bad = json!({"workbook_id": "wb-1", "name": "Data", "pos": 2.5});
        let diagnostics = validate(&schema, &bad);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("pos".to_string()));
    }

    #[test]
    fn test_computed_only_attribute_skipped() {
        let schema = sheet_schema();
        let input = json!({"workbook_id": "wb-1", "name": "Data", "id": 123});
        assert!(validate(&schema, &input).is_empty());
    }

    #[test]
    fn test_validate_bool() {
        let schema = Schema::v0().with_attribute("legacy_cell_placeholder", Attribute::optional_bool());

        assert!(validate(&schema, &json!({"legacy_cell_placeholder": true})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"legacy_cell_placeholder": "true"}));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected bool, got string"));
    }

    #[test]
    fn test_validate_list_of_objects() {
        let schema = Schema::v0().with_attribute(
            "extensions",
            Attribute::new(
                AttributeType::list(AttributeType::object([(
                    "extension",
                    AttributeType::String,
                )])),
                AttributeFlags::required(),
            ),
        );
        assert!(validate(&schema, &json!({"extensions": [{"extension": "xlsx"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({"extensions": [{"extension": 1}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("extensions.0.extension".to_string())
        );

        let diagnostics = validate(&schema, &json!({"extensions": "xlsx"}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_diagnostics_are_sorted_by_attribute() {
        let diagnostics = validate(&sheet_schema(), &json!({}));
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(attrs, vec!["name", "workbook_id"]);
    }

    #[test]
    fn test_null_and_non_object_roots() {
        let schema = sheet_schema();
        assert!(validate(&schema, &Value::Null).is_empty());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
