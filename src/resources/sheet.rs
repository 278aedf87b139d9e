//! The `terraxcel_sheet` resource.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{
    check, ensure_unchanged, now, parse_state, plan_from_schema, require_id, split_import_id,
    str_field, to_state, validate_declared,
};
use crate::client::SpreadsheetApi;
use crate::error::ProviderError;
use crate::models::{self, Sheet};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};
use crate::types::PlanResult;

const KIND: &str = "sheet";
const IMPORT_FORMAT: &str = "<workbook_id>/<sheet_id>";

/// Declared state of a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetState {
    /// Assigned by the API.
    #[serde(default)]
    pub id: Option<String>,
    /// Parent workbook.
    pub workbook_id: String,
    /// Sheet name.
    pub name: String,
    /// Requested position on create, actual position afterwards.
    #[serde(default)]
    pub pos: Option<i64>,
    /// Time of the last successful create or update.
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl SheetState {
    /// Build the API object, running the construction rules.
    pub fn to_model(&self) -> Result<Sheet, ProviderError> {
        let sheet = Sheet::new(&self.workbook_id, &self.name, self.pos.unwrap_or_default())?;
        Ok(match &self.id {
            Some(id) => sheet.with_id(id),
            None => sheet,
        })
    }

    /// Fold the API's view of the sheet into this state. The parent
    /// reference is never taken from the response.
    pub fn merge_remote(self, remote: &Sheet) -> Self {
        Self {
            id: Some(remote.id.clone()),
            workbook_id: self.workbook_id,
            name: remote.name.clone(),
            pos: Some(remote.pos),
            last_updated: self.last_updated,
        }
    }

    fn locator(&self, id: &str) -> Sheet {
        Sheet {
            id: id.to_string(),
            workbook_id: self.workbook_id.clone(),
            name: self.name.clone(),
            pos: self.pos.unwrap_or_default(),
        }
    }
}

/// Manages sheets inside a workbook.
pub struct SheetResource {
    api: Arc<dyn SpreadsheetApi>,
}

impl SheetResource {
    /// Create the adapter around a configured client.
    pub fn new(api: Arc<dyn SpreadsheetApi>) -> Self {
        Self { api }
    }

    /// Declared-state schema. Moving a sheet to another workbook replaces it.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("A sheet inside a workbook.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "workbook_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Workbook the sheet belongs to."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description(format!(
                    "Sheet name, at most {} characters.",
                    models::MAX_SHEET_NAME_LEN
                )),
            )
            .with_attribute(
                "pos",
                Attribute::new(
                    AttributeType::Int64,
                    AttributeFlags {
                        optional: true,
                        computed: true,
                        ..Default::default()
                    },
                )
                .with_description("Requested position. The service decides the final one."),
            )
            .with_attribute("last_updated", Attribute::computed_string())
    }

    /// Check a declared sheet without contacting the API.
    pub fn validate_config(config: &Value) -> Vec<Diagnostic> {
        validate_declared(&Self::schema(), config, |config| {
            let mut diagnostics = Vec::new();
            check(
                &mut diagnostics,
                "workbook_id",
                models::require_parent("workbook_id", str_field(config, "workbook_id")),
            );
            check(
                &mut diagnostics,
                "name",
                models::validate_sheet_name(str_field(config, "name")),
            );
            if let Some(pos) = config.get("pos").and_then(Value::as_i64) {
                check(&mut diagnostics, "pos", models::validate_pos(pos));
            }
            diagnostics
        })
    }

    /// Plan a change.
    pub fn plan(prior: Option<Value>, proposed: Value) -> PlanResult {
        plan_from_schema(&Self::schema(), prior, proposed)
    }

    /// Create the sheet and return its new state.
    pub async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let state: SheetState = parse_state(KIND, planned)?;
        let sheet = state.to_model()?;

        let created = self
            .api
            .create_sheet(&sheet)
            .await
            .map_err(|e| ProviderError::remote("Error creating sheet", e))?;
        debug!(
            workbook_id = %state.workbook_id,
            sheet_id = %created.id,
            pos = created.pos,
            "Created sheet"
        );

        let mut state = state.merge_remote(&created);
        state.last_updated = Some(now());
        to_state(&state)
    }

    /// Refresh the state from the API.
    pub async fn read(&self, current: Value) -> Result<Value, ProviderError> {
        let state: SheetState = parse_state(KIND, current)?;
        let id = require_id(KIND, &state.id)?;

        let remote = self
            .api
            .read_sheet(&state.workbook_id, id)
            .await
            .map_err(|e| ProviderError::classify("Error reading sheet", e))?;

        to_state(&state.merge_remote(&remote))
    }

    /// Rename the sheet, then re-read it.
    pub async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let prior: SheetState = parse_state(KIND, prior)?;
        let planned: SheetState = parse_state(KIND, planned)?;
        let id = require_id(KIND, &prior.id)?.to_string();
        ensure_unchanged("workbook_id", &prior.workbook_id, &planned.workbook_id)?;

        let sheet = planned.to_model()?.with_id(&id);
        self.api
            .update_sheet(&sheet)
            .await
            .map_err(|e| ProviderError::remote("Error updating sheet", e))?;

        let remote = self
            .api
            .read_sheet(&prior.workbook_id, &id)
            .await
            .map_err(|e| ProviderError::remote("Error reading updated sheet", e))?;
        debug!(workbook_id = %prior.workbook_id, sheet_id = %id, "Updated sheet");

        let mut state = prior.merge_remote(&remote);
        state.last_updated = Some(now());
        to_state(&state)
    }

    /// Delete the sheet.
    pub async fn delete(&self, current: Value) -> Result<(), ProviderError> {
        let state: SheetState = parse_state(KIND, current)?;
        let id = require_id(KIND, &state.id)?;

        self.api
            .delete_sheet(&state.locator(id))
            .await
            .map_err(|e| ProviderError::remote("Error deleting sheet", e))?;
        debug!(workbook_id = %state.workbook_id, sheet_id = %id, "Deleted sheet");
        Ok(())
    }

    /// Adopt an existing sheet from an ID of the form `<workbook_id>/<sheet_id>`.
    pub async fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let [workbook_id, sheet_id] = split_import_id::<2>(id, IMPORT_FORMAT)?;
        let remote = self
            .api
            .read_sheet(workbook_id, sheet_id)
            .await
            .map_err(|e| ProviderError::classify("Error importing sheet", e))?;

        let state = SheetState {
            id: None,
            workbook_id: workbook_id.to_string(),
            name: String::new(),
            pos: None,
            last_updated: None,
        };
        to_state(&state.merge_remote(&remote))
    }
}
