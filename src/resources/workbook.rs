//! The `terraxcel_workbook` resource.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{check, now, parse_state, plan_from_schema, require_id, str_field, to_state, validate_declared};
use crate::client::SpreadsheetApi;
use crate::error::ProviderError;
use crate::models::{self, Extension, Workbook};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::PlanResult;

const KIND: &str = "workbook";

/// Declared state of a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookState {
    /// Assigned by the API.
    #[serde(default)]
    pub id: Option<String>,
    /// File name without extension.
    pub file_name: String,
    /// One of the supported extensions.
    pub extension: String,
    /// Folder the file lives in.
    pub folder_path: String,
    /// Time of the last successful create or update.
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl WorkbookState {
    /// Build the API object, running the construction rules.
    pub fn to_model(&self) -> Result<Workbook, ProviderError> {
        let workbook = Workbook::new(&self.file_name, &self.extension, &self.folder_path)?;
        Ok(match &self.id {
            Some(id) => workbook.with_id(id),
            None => workbook,
        })
    }

    /// Fold the API's view of the workbook into this state.
    pub fn merge_remote(self, remote: &Workbook) -> Self {
        Self {
            id: Some(remote.id.clone()),
            file_name: remote.file_name.clone(),
            extension: remote.extension.clone(),
            folder_path: remote.folder_path.clone(),
            last_updated: self.last_updated,
        }
    }

    fn from_remote(remote: &Workbook) -> Self {
        Self {
            id: Some(remote.id.clone()),
            file_name: remote.file_name.clone(),
            extension: remote.extension.clone(),
            folder_path: remote.folder_path.clone(),
            last_updated: None,
        }
    }
}

/// Manages workbook files.
pub struct WorkbookResource {
    api: Arc<dyn SpreadsheetApi>,
}

impl WorkbookResource {
    /// Create the adapter around a configured client.
    pub fn new(api: Arc<dyn SpreadsheetApi>) -> Self {
        Self { api }
    }

    /// Declared-state schema.
    pub fn schema() -> Schema {
        let supported: Vec<&str> = Extension::ALL.iter().map(|e| e.as_str()).collect();
        Schema::v0()
            .with_description("A spreadsheet file.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Identifier assigned by the API."),
            )
            .with_attribute(
                "file_name",
                Attribute::required_string().with_description("File name without extension."),
            )
            .with_attribute(
                "extension",
                Attribute::required_string()
                    .with_description(format!("File format, one of: {}.", supported.join(", "))),
            )
            .with_attribute(
                "folder_path",
                Attribute::required_string().with_description("Folder the file is stored in."),
            )
            .with_attribute("last_updated", Attribute::computed_string())
    }

    /// Check a declared workbook without contacting the API.
    pub fn validate_config(config: &Value) -> Vec<Diagnostic> {
        validate_declared(&Self::schema(), config, |config| {
            let mut diagnostics = Vec::new();
            check(
                &mut diagnostics,
                "file_name",
                models::validate_file_name(str_field(config, "file_name")),
            );
            check(
                &mut diagnostics,
                "extension",
                str_field(config, "extension").parse::<Extension>().map(|_| ()),
            );
            check(
                &mut diagnostics,
                "folder_path",
                models::validate_folder_path(str_field(config, "folder_path")),
            );
            diagnostics
        })
    }

    /// Plan a change. Every user attribute is updatable in place.
    pub fn plan(prior: Option<Value>, proposed: Value) -> PlanResult {
        plan_from_schema(&Self::schema(), prior, proposed)
    }

    /// Create the workbook and return its new state.
    pub async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let state: WorkbookState = parse_state(KIND, planned)?;
        let workbook = state.to_model()?;

        let created = self
            .api
            .create_workbook(&workbook)
            .await
            .map_err(|e| ProviderError::remote("Error creating workbook", e))?;
        debug!(workbook_id = %created.id, file_name = %created.file_name, "Created workbook");

        let mut state = state.merge_remote(&created);
        state.last_updated = Some(now());
        to_state(&state)
    }

    /// Refresh the state from the API.
    pub async fn read(&self, current: Value) -> Result<Value, ProviderError> {
        let state: WorkbookState = parse_state(KIND, current)?;
        let id = require_id(KIND, &state.id)?;

        let remote = self
            .api
            .read_workbook(id)
            .await
            .map_err(|e| ProviderError::classify("Error reading workbook", e))?;

        to_state(&state.merge_remote(&remote))
    }

    /// Apply the planned state, then re-read it.
    pub async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let prior: WorkbookState = parse_state(KIND, prior)?;
        let planned: WorkbookState = parse_state(KIND, planned)?;
        let id = require_id(KIND, &prior.id)?.to_string();

        let workbook = planned.to_model()?.with_id(&id);
        self.api
            .update_workbook(&workbook)
            .await
            .map_err(|e| ProviderError::remote("Error updating workbook", e))?;

        let remote = self
            .api
            .read_workbook(&id)
            .await
            .map_err(|e| ProviderError::remote("Error reading updated workbook", e))?;
        debug!(workbook_id = %id, "Updated workbook");

        let mut state = planned.merge_remote(&remote);
        state.last_updated = Some(now());
        to_state(&state)
    }

    /// Delete the workbook. A workbook that is already gone is an error.
    pub async fn delete(&self, current: Value) -> Result<(), ProviderError> {
        let state: WorkbookState = parse_state(KIND, current)?;
        let id = require_id(KIND, &state.id)?;

        self.api
            .delete_workbook(id)
            .await
            .map_err(|e| ProviderError::remote("Error deleting workbook", e))?;
        debug!(workbook_id = %id, "Deleted workbook");
        Ok(())
    }

    /// Adopt an existing workbook by ID.
    pub async fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let remote = self
            .api
            .read_workbook(id)
            .await
            .map_err(|e| ProviderError::classify("Error importing workbook", e))?;
        to_state(&WorkbookState::from_remote(&remote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::testing::{ApiCall, MockSpreadsheetApi};
    use serde_json::json;

    fn setup() -> (Arc<MockSpreadsheetApi>, WorkbookResource) {
        let api = Arc::new(MockSpreadsheetApi::new());
        let resource = WorkbookResource::new(api.clone());
        (api, resource)
    }

    fn budget() -> Value {
        json!({
            "file_name": "budget",
            "extension": "xlsx",
            "folder_path": "/reports"
        })
    }

    #[tokio::test]
    async fn test_create_budget_workbook() {
        let (api, resource) = setup();

        let state = resource.create(budget()).await.unwrap();

        assert_eq!(state["id"], "wb-1");
        assert_eq!(state["file_name"], "budget");
        assert_eq!(state["extension"], "xlsx");
        assert_eq!(state["folder_path"], "/reports");
        assert!(state["last_updated"].as_str().unwrap().ends_with(" UTC"));
        assert!(api.workbook("wb-1").is_some());
    }

    #[tokio::test]
    async fn test_create_then_read_round_trip() {
        let (_api, resource) = setup();

        let created = resource.create(budget()).await.unwrap();
        let read = resource.read(created.clone()).await.unwrap();

        for field in ["id", "file_name", "extension", "folder_path"] {
            assert_eq!(read[field], created[field], "{} differs", field);
        }
        // Read never stamps.
        assert_eq!(read["last_updated"], created["last_updated"]);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_extension_before_calling_api() {
        let (api, resource) = setup();

        let err = resource
            .create(json!({"file_name": "budget", "extension": "csv", "folder_path": "/r"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_api, resource) = setup();

        let mut state = budget();
        state["id"] = json!("wb-404");
        let err = resource.read(state).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_writes_once_then_reads_once() {
        let (api, resource) = setup();
        let prior = resource.create(budget()).await.unwrap();
        api.clear_calls();

        let mut planned = prior.clone();
        planned["folder_path"] = json!("/archive");
        let state = resource.update(prior, planned).await.unwrap();

        assert_eq!(api.calls(), vec![ApiCall::UpdateWorkbook, ApiCall::ReadWorkbook]);
        assert_eq!(state["folder_path"], "/archive");
        assert_eq!(state["id"], "wb-1");
    }

    #[tokio::test]
    async fn test_update_state_comes_from_re_read() {
        let (api, resource) = setup();
        let prior = resource.create(budget()).await.unwrap();
        api.set_stale_updates(true);

        let mut planned = prior.clone();
        planned["folder_path"] = json!("/archive");
        planned["file_name"] = json!("budget-2024");
        let state = resource.update(prior, planned).await.unwrap();

        let stored = api.workbook("wb-1").unwrap();
        assert_eq!(state["file_name"], stored.file_name);
        assert_eq!(state["folder_path"], stored.folder_path);
        assert_eq!(state["folder_path"], "/archive");
    }

    #[tokio::test]
    async fn test_update_fails_when_re_read_fails() {
        let (api, resource) = setup();
        let prior = resource.create(budget()).await.unwrap();
        api.clear_calls();
        api.fail_next(
            ApiCall::ReadWorkbook,
            ApiError::Status {
                status: 503,
                body: "unavailable".to_string(),
            },
        );

        let mut planned = prior.clone();
        planned["file_name"] = json!("forecast");
        let err = resource.update(prior, planned).await.unwrap_err();

        assert_eq!(err.title(), "Error reading updated workbook");
        assert_eq!(api.calls(), vec![ApiCall::UpdateWorkbook, ApiCall::ReadWorkbook]);
    }

    #[tokio::test]
    async fn test_read_picks_up_remote_changes() {
        let (api, resource) = setup();
        let state = resource.create(budget()).await.unwrap();
        api.put_workbook(
            Workbook::new("budget-2024", "xlsm", "/reports")
                .unwrap()
                .with_id("wb-1"),
        );

        let read = resource.read(state).await.unwrap();

        assert_eq!(read["file_name"], "budget-2024");
        assert_eq!(read["extension"], "xlsm");
    }

    #[tokio::test]
    async fn test_read_reports_unlisted_extension_as_drift() {
        let (api, resource) = setup();
        let state = resource.create(budget()).await.unwrap();
        let mut drifted = api.workbook("wb-1").unwrap();
        drifted.extension = "xlsb".to_string();
        api.put_workbook(drifted);

        let read = resource.read(state).await.unwrap();
        assert_eq!(read["extension"], "xlsb");

        let plan = WorkbookResource::plan(Some(read), budget());
        assert!(plan.changes.iter().any(|c| c.path == "extension"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_remote_error() {
        let (api, resource) = setup();
        let state = resource.create(budget()).await.unwrap();
        api.remove_workbook("wb-1");

        let err = resource.delete(state).await.unwrap_err();

        assert!(matches!(err, ProviderError::Remote { .. }));
        assert_eq!(err.title(), "Error deleting workbook");
    }

    #[tokio::test]
    async fn test_import() {
        let (_api, resource) = setup();
        resource.create(budget()).await.unwrap();

        let state = resource.import("wb-1").await.unwrap();
        assert_eq!(state["file_name"], "budget");
        assert!(state["last_updated"].is_null());
    }

    #[test]
    fn test_validate_config() {
        assert!(WorkbookResource::validate_config(&budget()).is_empty());

        let diagnostics = WorkbookResource::validate_config(&json!({
            "file_name": "a/b",
            "extension": "docx",
            "folder_path": "/r"
        }));
        let attributes: Vec<_> = diagnostics
            .iter()
            .map(|d| d.attribute.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(attributes, vec!["file_name", "extension"]);
    }

    #[test]
    fn test_plan_is_in_place() {
        let prior = json!({
            "id": "wb-1",
            "file_name": "budget",
            "extension": "xlsx",
            "folder_path": "/reports",
            "last_updated": "Monday, 02-Jan-06 15:04:05 UTC"
        });
        let mut proposed = prior.clone();
        proposed["extension"] = json!("xlsm");

        let plan = WorkbookResource::plan(Some(prior), proposed);
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 1);
    }
}
