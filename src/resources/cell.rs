//! The `terraxcel_cell` resource.
//!
//! Cells are addressed by workbook, sheet and their own ID. The row is
//! chosen by the service on create and never changes afterwards; the
//! declared state only carries the column and the value.

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
use crate::models::{self, Cell};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::PlanResult;

const KIND: &str = "cell";
const IMPORT_FORMAT: &str = "<workbook_id>/<sheet_id>/<cell_id>";

/// Value recorded in state when `legacy_cell_placeholder` is enabled.
pub const LEGACY_PLACEHOLDER: &str = "test";

/// Declared state of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellState {
    /// Assigned by the API.
    #[serde(default)]
    pub id: Option<String>,
    /// Parent workbook.
    pub workbook_id: String,
    /// Parent sheet.
    pub sheet_id: String,
    /// Assigned by the API.
    #[serde(default)]
    pub row: Option<i64>,
    /// Column letters, e.g. `A` or `AB`.
    pub column: String,
    /// Cell content, as text.
    pub value: String,
    /// Time of the last successful create or update.
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl CellState {
    /// Build the API object, running the construction rules.
    pub fn to_model(&self) -> Result<Cell, ProviderError> {
        let mut cell = Cell::new(&self.workbook_id, &self.sheet_id, &self.column, &self.value)?;
        if let Some(id) = &self.id {
            cell = cell.with_id(id);
        }
        if let Some(row) = self.row {
            cell = cell.with_row(row);
        }
        Ok(cell)
    }

    /// Fold the API's view of the cell into this state. Parent references
    /// are never taken from the response.
    pub fn merge_remote(self, remote: &Cell) -> Self {
        Self {
            id: Some(remote.id.clone()),
            workbook_id: self.workbook_id,
            sheet_id: self.sheet_id,
            row: Some(remote.row),
            column: remote.column.clone(),
            value: remote.value.clone(),
            last_updated: self.last_updated,
        }
    }

    fn locator(&self, id: &str) -> Cell {
        Cell {
            id: id.to_string(),
            workbook_id: self.workbook_id.clone(),
            sheet_id: self.sheet_id.clone(),
            row: self.row.unwrap_or_default(),
            column: self.column.clone(),
            value: self.value.clone(),
        }
    }
}

/// Manages single cells inside a sheet.
pub struct CellResource {
    api: Arc<dyn SpreadsheetApi>,
    legacy_placeholder: bool,
}

impl CellResource {
    /// Create the adapter around a configured client.
    pub fn new(api: Arc<dyn SpreadsheetApi>) -> Self {
        Self {
            api,
            legacy_placeholder: false,
        }
    }

    /// Record [`LEGACY_PLACEHOLDER`] instead of the real value after every
    /// create, read and update.
    pub fn with_legacy_placeholder(mut self, enabled: bool) -> Self {
        self.legacy_placeholder = enabled;
        self
    }

    /// Declared-state schema. Moving a cell to another sheet replaces it.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("A single cell inside a sheet.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("workbook_id", Attribute::required_string().with_force_new())
            .with_attribute("sheet_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "row",
                Attribute::computed_int64().with_description("Row assigned by the service."),
            )
            .with_attribute(
                "column",
                Attribute::required_string().with_description("Column letters, A to XFD."),
            )
            .with_attribute("value", Attribute::required_string())
            .with_attribute("last_updated", Attribute::computed_string())
    }

    /// Check a declared cell without contacting the API.
    pub fn validate_config(config: &Value) -> Vec<Diagnostic> {
        validate_declared(&Self::schema(), config, |config| {
            let mut diagnostics = Vec::new();
            for parent in ["workbook_id", "sheet_id"] {
                check(
                    &mut diagnostics,
                    parent,
                    models::require_parent(parent, str_field(config, parent)),
                );
            }
            check(
                &mut diagnostics,
                "column",
                models::validate_column(str_field(config, "column")),
            );
            diagnostics
        })
    }

    /// Plan a change.
    pub fn plan(prior: Option<Value>, proposed: Value) -> PlanResult {
        plan_from_schema(&Self::schema(), prior, proposed)
    }

    fn finish(&self, mut state: CellState, stamp: bool) -> Result<Value, ProviderError> {
        if self.legacy_placeholder {
            state.value = LEGACY_PLACEHOLDER.to_string();
        }
        if stamp {
            state.last_updated = Some(now());
        }
        to_state(&state)
    }

    /// Create the cell and return its new state.
    pub async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let mut state: CellState = parse_state(KIND, planned)?;
        // The declared row is not sent; the service picks one.
        state.row = None;
        let cell = state.to_model()?;

        let created = self
            .api
            .create_cell(&cell)
            .await
            .map_err(|e| ProviderError::remote("Error creating cell", e))?;
        debug!(
            workbook_id = %state.workbook_id,
            sheet_id = %state.sheet_id,
            cell_id = %created.id,
            row = created.row,
            "Created cell"
        );

        self.finish(state.merge_remote(&created), true)
    }

    /// Refresh the state from the API.
    pub async fn read(&self, current: Value) -> Result<Value, ProviderError> {
        let state: CellState = parse_state(KIND, current)?;
        let id = require_id(KIND, &state.id)?;

        let remote = self
            .api
            .read_cell(&state.workbook_id, &state.sheet_id, id)
            .await
            .map_err(|e| ProviderError::classify("Error reading cell", e))?;

        self.finish(state.merge_remote(&remote), false)
    }

    /// Write the new column or value, then re-read the cell.
    pub async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let prior: CellState = parse_state(KIND, prior)?;
        let mut planned: CellState = parse_state(KIND, planned)?;
        let id = require_id(KIND, &prior.id)?.to_string();
        ensure_unchanged("workbook_id", &prior.workbook_id, &planned.workbook_id)?;
        ensure_unchanged("sheet_id", &prior.sheet_id, &planned.sheet_id)?;

        planned.row = prior.row;
        let cell = planned.to_model()?.with_id(&id);
        self.api
            .update_cell(&cell)
            .await
            .map_err(|e| ProviderError::remote("Error updating cell", e))?;

        let remote = self
            .api
            .read_cell(&prior.workbook_id, &prior.sheet_id, &id)
            .await
            .map_err(|e| ProviderError::remote("Error reading updated cell", e))?;
        debug!(cell_id = %id, row = remote.row, "Updated cell");

        self.finish(prior.merge_remote(&remote), true)
    }

    /// Delete the cell.
    pub async fn delete(&self, current: Value) -> Result<(), ProviderError> {
        let state: CellState = parse_state(KIND, current)?;
        let id = require_id(KIND, &state.id)?;

        self.api
            .delete_cell(&state.locator(id))
            .await
            .map_err(|e| ProviderError::remote("Error deleting cell", e))?;
        debug!(cell_id = %id, "Deleted cell");
        Ok(())
    }

    /// Adopt an existing cell from an ID of the form
    /// `<workbook_id>/<sheet_id>/<cell_id>`.
    pub async fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let [workbook_id, sheet_id, cell_id] = split_import_id::<3>(id, IMPORT_FORMAT)?;
        let remote = self
            .api
            .read_cell(workbook_id, sheet_id, cell_id)
            .await
            .map_err(|e| ProviderError::classify("Error importing cell", e))?;

        let state = CellState {
            id: None,
            workbook_id: workbook_id.to_string(),
            sheet_id: sheet_id.to_string(),
            row: None,
            column: String::new(),
            value: String::new(),
            last_updated: None,
        };
        self.finish(state.merge_remote(&remote), false)
    }
}
