//! Plain Rust forms of the protocol messages the provider produces.
//!
//! State travels as JSON bytes on the wire; these types hold it as
//! [`serde_json::Value`] and convert at the gRPC boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attribute as it differs between prior and planned state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub path: String,
    /// `None` when the attribute is being set for the first time.
    pub before: Option<Value>,
    /// `None` when the attribute goes away.
    pub after: Option<Value>,
}

impl AttributeChange {
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Attribute gains a value.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Attribute loses its value.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Attribute value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

fn encode_value(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

fn decode_value(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

impl From<crate::generated::AttributeChange> for AttributeChange {
    fn from(proto: crate::generated::AttributeChange) -> Self {
        Self {
            before: decode_value(&proto.before),
            after: decode_value(&proto.after),
            path: proto.path,
        }
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: encode_value(change.before),
            after: encode_value(change.after),
        }
    }
}

/// What applying a resource would do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State expected after apply, with unknown computed values as null.
    /// Null for a destroy.
    pub planned_state: Value,
    pub changes: Vec<AttributeChange>,
    /// Delete and re-create instead of updating in place.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Nothing to do; `state` is kept as is.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying this plan does anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty() || self.requires_replace
    }
}

/// State adopted from an existing remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub resource_type: String,
    pub state: Value,
}

impl ImportedResource {
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

impl TryFrom<ImportedResource> for crate::generated::ImportedResource {
    type Error = serde_json::Error;

    fn try_from(imported: ImportedResource) -> Result<Self, Self::Error> {
        Ok(Self {
            state: serde_json::to_vec(&imported.state)?,
            resource_type: imported.resource_type,
        })
    }
}

/// Answer to `GetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names, sorted.
    pub resources: Vec<String>,
    /// Data source type names, sorted.
    pub data_sources: Vec<String>,
    pub capabilities: ServerCapabilities,
}

/// Optional protocol features the provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// `Plan` accepts a null proposed state.
    pub plan_destroy: bool,
}

impl From<ServerCapabilities> for crate::generated::ServerCapabilities {
    fn from(caps: ServerCapabilities) -> Self {
        Self {
            plan_destroy: caps.plan_destroy,
        }
    }
}

/// Protocol version announced in the handshake line.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("file_name", json!("budget"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("budget")));

        let removed = AttributeChange::removed("name", json!("Summary"));
        assert_eq!(removed.before, Some(json!("Summary")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("value", json!("41"), json!("42"));
        assert_eq!(modified.before, Some(json!("41")));
        assert_eq!(modified.after, Some(json!("42")));
    }

    #[test]
    fn test_attribute_change_conversion() {
        let change = AttributeChange::modified("column", json!("A"), json!("B"));

        let proto: crate::generated::AttributeChange = change.clone().into();
        assert_eq!(proto.path, "column");
        assert_eq!(proto.before, br#""A""#.to_vec());

        let back: AttributeChange = proto.into();
        assert_eq!(back, change);
    }

    #[test]
    fn test_added_change_has_empty_before_bytes() {
        let proto: crate::generated::AttributeChange =
            AttributeChange::added("extension", json!("xlsx")).into();
        assert!(proto.before.is_empty());
        assert!(!proto.after.is_empty());
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "wb-1"}));
        assert!(no_change.changes.is_empty());
        assert!(!no_change.has_changes());

        let replace = PlanResult::with_changes(
            json!({"workbook_id": "wb-2"}),
            vec![AttributeChange::modified(
                "workbook_id",
                json!("wb-1"),
                json!("wb-2"),
            )],
            true,
        );
        assert!(replace.has_changes());
        assert!(replace.requires_replace);
    }

    #[test]
    fn test_imported_resource_to_proto() {
        let imported = ImportedResource::new("terraxcel_sheet", json!({"id": "sh-1"}));
        let proto = crate::generated::ImportedResource::try_from(imported).unwrap();
        assert_eq!(proto.resource_type, "terraxcel_sheet");

        let state: Value = serde_json::from_slice(&proto.state).unwrap();
        assert_eq!(state["id"], "sh-1");
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(PROTOCOL_VERSION, 1);
        assert_eq!(HANDSHAKE_PREFIX, "HEMMER_PROVIDER");
    }
}
