//! Declared-state schemas.
//!
//! Schemas describe the shape of the provider block, each resource and each
//! data source. The engine uses them to decide which attributes the user
//! sets, which ones the provider computes, and which ones force a
//! replacement when they change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value type of an attribute, serialized in the form the engine expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// Text.
    String,
    /// Signed integer.
    Int64,
    /// `true` or `false`.
    Bool,
    /// Homogeneous list.
    List(Box<AttributeType>),
    /// Object with named, typed fields.
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    /// List of `element_type`.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create an object type from `(name, type)` pairs.
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeType)>,
        K: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }
}

/// Who sets an attribute and how it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be declared.
    pub required: bool,
    /// May be declared.
    pub optional: bool,
    /// Filled in by the provider. Combined with `optional`, a declared value is a hint.
    pub computed: bool,
    /// Redacted in plan output.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Declared by the user, always.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Declared by the user, sometimes.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Set by the provider only.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Whether only the provider may set this attribute.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// One attribute of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change to this attribute is planned as a replacement.
    #[serde(default)]
    pub force_new: bool,
    /// Value assumed when the attribute is not declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
        }
    }

    /// Shorthand constructors.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Plan changes to this attribute as replacements.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Redact the value in plan output.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// The set of attributes making up a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Versioned schema of a resource, data source or the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when the stored state layout changes.
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::default(),
        }
    }

    /// Shorthand for `Schema::new(0)`.
    pub fn v0() -> Self {
        Self::new(0)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Set the description shown in generated documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// Names of attributes changing which forces a replacement.
    pub fn force_new_attributes(&self) -> impl Iterator<Item = &str> {
        self.block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.force_new)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Everything the provider declares to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The provider block.
    #[serde(default)]
    pub provider: Schema,
    /// Keyed by resource type name.
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    /// Keyed by data source type name.
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation failed.
    Error,
    /// The operation went ahead.
    Warning,
}

/// A message returned to the engine alongside a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// One-line title.
    pub summary: String,
    /// Underlying error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attribute the message is about, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic blocks the operation.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Whether any diagnostic in the slice is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_type_constructors() {
        let list = AttributeType::list(AttributeType::String);
        assert!(matches!(list, AttributeType::List(_)));

        let object = AttributeType::object([("extension", AttributeType::String)]);
        match object {
            AttributeType::Object(attrs) => {
                assert_eq!(attrs.get("extension"), Some(&AttributeType::String))
            },
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_attribute_flags() {
        let required = AttributeFlags::required();
        assert!(required.required);
        assert!(!required.computed);

        let computed = AttributeFlags::computed();
        assert!(computed.is_computed_only());
        assert!(!AttributeFlags::optional().is_computed_only());
    }

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::required_string()
            .with_description("Owning workbook")
            .with_force_new();

        assert_eq!(attr.attr_type, AttributeType::String);
        assert!(attr.flags.required);
        assert_eq!(attr.description, Some("Owning workbook".to_string()));
        assert!(attr.force_new);

        let token = Attribute::optional_string().sensitive();
        assert!(token.flags.sensitive);
    }

    #[test]
    fn test_force_new_attributes() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("workbook_id", Attribute::required_string().with_force_new());

        let force_new: Vec<&str> = schema.force_new_attributes().collect();
        assert_eq!(force_new, vec!["workbook_id"]);
    }

    #[test]
    fn test_provider_schema() {
        let provider_schema = ProviderSchema::new()
            .with_provider_config(
                Schema::v0().with_attribute("token", Attribute::optional_string().sensitive()),
            )
            .with_resource(
                "terraxcel_workbook",
                Schema::v0().with_attribute("id", Attribute::computed_string()),
            )
            .with_data_source("terraxcel_extensions", Schema::v0());

        assert!(provider_schema
            .provider
            .block
            .attributes
            .contains_key("token"));
        assert!(provider_schema.resources.contains_key("terraxcel_workbook"));
        assert!(provider_schema
            .data_sources
            .contains_key("terraxcel_extensions"));
    }

    #[test]
    fn test_schema_serializes_type_name() {
        let attr = Attribute::computed_int64();
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json["type"], "int64");
        assert_eq!(json["computed"], true);
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid column")
            .with_detail("column must be uppercase")
            .with_attribute("column");

        assert!(err.is_error());
        assert_eq!(err.summary, "Invalid column");
        assert_eq!(err.detail, Some("column must be uppercase".to_string()));
        assert_eq!(err.attribute, Some("column".to_string()));

        assert!(!has_errors(&[Diagnostic::warning("heads up")]));
        assert!(has_errors(&[Diagnostic::warning("heads up"), err]));
    }
}
