//! Resource adapters and the extensions data source.
//!
//! Each adapter translates between a declared-state record (plain JSON as
//! the engine sends it) and calls on the [`SpreadsheetApi`](crate::client::SpreadsheetApi).
//! Adapters keep nothing between calls besides the shared client handle.
//!
//! All three resources follow the same contract:
//!
//! - create and update stamp `last_updated`, read never does;
//! - update writes once and then re-reads once, trusting only the re-read;
//! - server-owned fields (`id`, `pos`, `row`) always come from the API,
//!   parent references always come from the prior state.

pub mod cell;
pub mod extensions;
pub mod sheet;
pub mod workbook;

pub use self::cell::{CellResource, CellState};
pub use self::extensions::ExtensionsDataSource;
pub use self::sheet::{SheetResource, SheetState};
pub use self::workbook::{WorkbookResource, WorkbookState};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation;

/// Type name of the workbook resource.
pub const WORKBOOK: &str = "terraxcel_workbook";
/// Type name of the sheet resource.
pub const SHEET: &str = "terraxcel_sheet";
/// Type name of the cell resource.
pub const CELL: &str = "terraxcel_cell";
/// Type name of the extensions data source.
pub const EXTENSIONS: &str = "terraxcel_extensions";

/// Layout of `last_updated`, e.g. `Monday, 02-Jan-06 15:04:05 UTC`.
pub const LAST_UPDATED_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S UTC";

const LAST_UPDATED: &str = "last_updated";

/// Format a `last_updated` stamp.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(LAST_UPDATED_FORMAT).to_string()
}

pub(crate) fn now() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn parse_state<T: DeserializeOwned>(kind: &str, state: Value) -> Result<T, ProviderError> {
    serde_json::from_value(state)
        .map_err(|e| ProviderError::InvalidRequest(format!("malformed {} state: {}", kind, e)))
}

pub(crate) fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// The remote ID recorded in a state, required by every call but create.
pub(crate) fn require_id<'a>(kind: &str, id: &'a Option<String>) -> Result<&'a str, ProviderError> {
    match id.as_deref() {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ProviderError::InvalidRequest(format!(
            "{} state has no id",
            kind
        ))),
    }
}

/// Reject a change to a parent reference outside of a replacement.
pub(crate) fn ensure_unchanged(
    field: &str,
    prior: &str,
    planned: &str,
) -> Result<(), ProviderError> {
    if prior != planned {
        return Err(ProviderError::Validation(format!(
            "{} cannot change from '{}' to '{}'; the resource must be replaced",
            field, prior, planned
        )));
    }
    Ok(())
}

/// Split an import ID of the form `a/b/c` into exactly `N` non-empty parts.
pub(crate) fn split_import_id<'a, const N: usize>(
    id: &'a str,
    format: &str,
) -> Result<[&'a str; N], ProviderError> {
    let parts: Vec<&str> = id.split('/').collect();
    if parts.len() != N || parts.iter().any(|p| p.is_empty()) {
        return Err(ProviderError::InvalidRequest(format!(
            "import id '{}' must look like {}",
            id, format
        )));
    }
    let mut out: [&'a str; N] = [""; N];
    out.copy_from_slice(&parts);
    Ok(out)
}

/// Schema checks followed by domain rules.
///
/// `rules` only runs when the schema checks pass, so it may assume every
/// required attribute is present with the right type.
pub(crate) fn validate_declared<F>(schema: &Schema, config: &Value, rules: F) -> Vec<Diagnostic>
where
    F: FnOnce(&Value) -> Vec<Diagnostic>,
{
    let diagnostics = validation::validate(schema, config);
    if !diagnostics.is_empty() || config.is_null() {
        return diagnostics;
    }
    rules(config)
}

/// Run a construction rule, recording a failure against `attribute`.
pub(crate) fn check(
    diagnostics: &mut Vec<Diagnostic>,
    attribute: &str,
    result: Result<(), ProviderError>,
) {
    if let Err(e) = result {
        diagnostics.push(
            Diagnostic::error("Invalid resource configuration")
                .with_detail(e.message())
                .with_attribute(attribute),
        );
    }
}

pub(crate) fn str_field<'a>(config: &'a Value, name: &str) -> &'a str {
    config.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn object(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn present(map: &Map<String, Value>, name: &str) -> Option<Value> {
    map.get(name).filter(|v| !v.is_null()).cloned()
}

/// Plan a resource from its schema.
///
/// Attributes flagged `computed` belong to the service and are never
/// diffed. The rest are compared between prior and proposed state; a
/// change to a `force_new` attribute turns the plan into a replacement.
pub(crate) fn plan_from_schema(
    schema: &Schema,
    prior: Option<Value>,
    proposed: Value,
) -> PlanResult {
    let mut names: Vec<&String> = schema.block.attributes.keys().collect();
    names.sort();

    let prior = match prior {
        Some(prior) if !prior.is_null() => Some(object(&prior)),
        _ => None,
    };

    if proposed.is_null() {
        let changes = match &prior {
            Some(prior) => names
                .iter()
                .filter_map(|name| present(prior, name).map(|v| AttributeChange::removed(*name, v)))
                .collect(),
            None => Vec::new(),
        };
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let proposed = object(&proposed);
    let mut planned = proposed.clone();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for name in &names {
        let attr = &schema.block.attributes[*name];
        if attr.flags.computed {
            continue;
        }
        let before = prior.as_ref().and_then(|p| present(p, name));
        let after = present(&proposed, name);
        let change = match (before, after) {
            (None, Some(after)) => AttributeChange::added(*name, after),
            (Some(before), None) => AttributeChange::removed(*name, before),
            (Some(before), Some(after)) if before != after => {
                AttributeChange::modified(*name, before, after)
            },
            _ => continue,
        };
        if prior.is_some() && attr.force_new {
            requires_replace = true;
        }
        changes.push(change);
    }

    for name in &names {
        let attr = &schema.block.attributes[*name];
        if !attr.flags.computed {
            continue;
        }
        let carried = match &prior {
            Some(prior) if !requires_replace => {
                if name.as_str() == LAST_UPDATED && !changes.is_empty() {
                    Value::Null
                } else {
                    prior.get(*name).cloned().unwrap_or(Value::Null)
                }
            },
            _ if attr.flags.optional => proposed.get(*name).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        };
        planned.insert((*name).clone(), carried);
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}
