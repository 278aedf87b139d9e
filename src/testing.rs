//! Testing utilities for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] without a gRPC server and
//! [`MockSpreadsheetApi`] stands in for the remote spreadsheet API.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hemmer_provider_terraxcel::testing::{MockSpreadsheetApi, ProviderTester};
//! use hemmer_provider_terraxcel::TerraxcelProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_workbook() {
//!     let api = Arc::new(MockSpreadsheetApi::new());
//!     let tester = ProviderTester::new(TerraxcelProvider::with_api(api.clone()));
//!     tester.configure(json!({"host": "http://mock", "token": "t"})).await.unwrap();
//!
//!     let state = tester
//!         .create("terraxcel_workbook", json!({
//!             "file_name": "budget", "extension": "xlsx", "folder_path": "/reports"
//!         }))
//!         .await
//!         .unwrap();
//!     assert_eq!(state["id"], "wb-1");
//! }
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ApiError, SpreadsheetApi};
use crate::error::ProviderError;
use crate::models::{Cell, Extension, Sheet, Workbook};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// A test harness wrapping a [`ProviderService`].
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate provider configuration, failing on any error diagnostic.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider, failing on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration, failing on any error diagnostic.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Run plan, then create with the planned state, then read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Run plan, then update with the planned state, then read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Run plan, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

impl TestError {
    /// The error diagnostics, if the failure carried any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TestError::Diagnostics(diags) => diags,
            TestError::Provider(_) => &[],
        }
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates a new resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to create, not replace"
    );
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error on the given attribute.
///
/// # Panics
///
/// Panics if no error diagnostic names the attribute.
pub fn assert_error_on_attribute(diagnostics: &[Diagnostic], attribute: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.is_error() && d.attribute.as_deref() == Some(attribute));

    assert!(
        found,
        "Expected an error on '{}', but got: {:?}",
        attribute,
        diagnostics
            .iter()
            .map(|d| (&d.summary, &d.attribute))
            .collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        found,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

// =========================================================================
// In-memory API
// =========================================================================

/// A call made against [`MockSpreadsheetApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    /// `create_workbook`
    CreateWorkbook,
    /// `read_workbook`
    ReadWorkbook,
    /// `update_workbook`
    UpdateWorkbook,
    /// `delete_workbook`
    DeleteWorkbook,
    /// `create_sheet`
    CreateSheet,
    /// `read_sheet`
    ReadSheet,
    /// `update_sheet`
    UpdateSheet,
    /// `delete_sheet`
    DeleteSheet,
    /// `create_cell`
    CreateCell,
    /// `read_cell`
    ReadCell,
    /// `update_cell`
    UpdateCell,
    /// `delete_cell`
    DeleteCell,
    /// `read_extensions`
    ReadExtensions,
}

impl ApiCall {
    /// Whether the call changes remote state.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            ApiCall::ReadWorkbook | ApiCall::ReadSheet | ApiCall::ReadCell | ApiCall::ReadExtensions
        )
    }
}

type SheetKey = (String, String);
type CellKey = (String, String, String);

#[derive(Default)]
struct MockState {
    workbooks: BTreeMap<String, Workbook>,
    sheets: BTreeMap<SheetKey, Sheet>,
    cells: BTreeMap<CellKey, Cell>,
    next_id: u64,
    next_row: HashMap<SheetKey, i64>,
    extensions: Vec<String>,
    calls: Vec<ApiCall>,
    failures: HashMap<ApiCall, VecDeque<ApiError>>,
    stale_updates: bool,
}

impl MockState {
    fn record(&mut self, call: ApiCall) -> Result<(), ApiError> {
        self.calls.push(call);
        match self.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn assign_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

fn not_found(kind: &'static str, id: &str) -> ApiError {
    ApiError::NotFound {
        kind,
        id: id.to_string(),
    }
}

/// An in-memory spreadsheet API.
///
/// Behaves like the remote service: it assigns IDs (`wb-1`, `sh-2`, ...),
/// places sheets at the end of their workbook, gives each new cell the next
/// free row of its sheet (starting at 1) and keeps that row on update. Every
/// call is logged, and failures can be injected per call.
pub struct MockSpreadsheetApi {
    state: Mutex<MockState>,
}

impl Default for MockSpreadsheetApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpreadsheetApi {
    /// An empty API offering every supported extension.
    pub fn new() -> Self {
        let state = MockState {
            extensions: Extension::ALL.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the list returned by `read_extensions`.
    pub fn set_extensions<I, S>(&self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().extensions = extensions.into_iter().map(Into::into).collect();
    }

    /// Make the next `call` fail with `err`. Queued failures are used in order.
    pub fn fail_next(&self, call: ApiCall, err: ApiError) {
        self.lock().failures.entry(call).or_default().push_back(err);
    }

    /// Make update calls answer with the object as it was before the write,
    /// with its server-owned fields shifted. Stored data is still updated.
    pub fn set_stale_updates(&self, stale: bool) {
        self.lock().stale_updates = stale;
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// The stored workbook, if any.
    pub fn workbook(&self, id: &str) -> Option<Workbook> {
        self.lock().workbooks.get(id).cloned()
    }

    /// The stored sheet, if any.
    pub fn sheet(&self, workbook_id: &str, sheet_id: &str) -> Option<Sheet> {
        self.lock()
            .sheets
            .get(&(workbook_id.to_string(), sheet_id.to_string()))
            .cloned()
    }

    /// The stored cell, if any.
    pub fn cell(&self, workbook_id: &str, sheet_id: &str, cell_id: &str) -> Option<Cell> {
        self.lock()
            .cells
            .get(&(
                workbook_id.to_string(),
                sheet_id.to_string(),
                cell_id.to_string(),
            ))
            .cloned()
    }

    /// Overwrite a stored workbook, as an out-of-band change would.
    pub fn put_workbook(&self, workbook: Workbook) {
        self.lock().workbooks.insert(workbook.id.clone(), workbook);
    }

    /// Overwrite a stored sheet, as an out-of-band change would.
    pub fn put_sheet(&self, sheet: Sheet) {
        let key = (sheet.workbook_id.clone(), sheet.id.clone());
        self.lock().sheets.insert(key, sheet);
    }

    /// Overwrite a stored cell, as an out-of-band change would.
    pub fn put_cell(&self, cell: Cell) {
        let key = (cell.workbook_id.clone(), cell.sheet_id.clone(), cell.id.clone());
        self.lock().cells.insert(key, cell);
    }

    /// Remove a workbook and its contents without recording a call.
    pub fn remove_workbook(&self, id: &str) {
        let mut state = self.lock();
        state.workbooks.remove(id);
        state.sheets.retain(|(wid, _), _| wid != id);
        state.cells.retain(|(wid, _, _), _| wid != id);
    }
}

#[async_trait]
impl SpreadsheetApi for MockSpreadsheetApi {
    async fn create_workbook(&self, workbook: &Workbook) -> Result<Workbook, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::CreateWorkbook)?;

        let created = workbook.clone().with_id(state.assign_id("wb"));
        state.workbooks.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn read_workbook(&self, id: &str) -> Result<Workbook, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::ReadWorkbook)?;
        state
            .workbooks
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("workbook", id))
    }

    async fn update_workbook(&self, workbook: &Workbook) -> Result<Workbook, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::UpdateWorkbook)?;
        let stale = state.stale_updates;
        match state.workbooks.get_mut(&workbook.id) {
            Some(stored) => {
                let before = std::mem::replace(stored, workbook.clone());
                if stale {
                    return Ok(before);
                }
                Ok(workbook.clone())
            },
            None => Err(not_found("workbook", &workbook.id)),
        }
    }

    async fn delete_workbook(&self, id: &str) -> Result<(), ApiError> {
        {
            let mut state = self.lock();
            state.record(ApiCall::DeleteWorkbook)?;
            if !state.workbooks.contains_key(id) {
                return Err(not_found("workbook", id));
            }
        }
        self.remove_workbook(id);
        Ok(())
    }

    async fn create_sheet(&self, sheet: &Sheet) -> Result<Sheet, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::CreateSheet)?;
        if !state.workbooks.contains_key(&sheet.workbook_id) {
            return Err(not_found("workbook", &sheet.workbook_id));
        }

        let pos = state
            .sheets
            .keys()
            .filter(|(wid, _)| *wid == sheet.workbook_id)
            .count() as i64;
        let mut created = sheet.clone().with_id(state.assign_id("sh"));
        created.pos = pos;

        let key = (created.workbook_id.clone(), created.id.clone());
        state.sheets.insert(key, created.clone());
        Ok(created)
    }

    async fn read_sheet(&self, workbook_id: &str, sheet_id: &str) -> Result<Sheet, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::ReadSheet)?;
        state
            .sheets
            .get(&(workbook_id.to_string(), sheet_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found("sheet", sheet_id))
    }

    async fn update_sheet(&self, sheet: &Sheet) -> Result<Sheet, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::UpdateSheet)?;
        let stale = state.stale_updates;
        let key = (sheet.workbook_id.clone(), sheet.id.clone());
        match state.sheets.get_mut(&key) {
            Some(stored) => {
                let mut before = stored.clone();
                // Position is owned by the service.
                stored.name = sheet.name.clone();
                if stale {
                    before.pos += 100;
                    return Ok(before);
                }
                Ok(stored.clone())
            },
            None => Err(not_found("sheet", &sheet.id)),
        }
    }

    async fn delete_sheet(&self, sheet: &Sheet) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::DeleteSheet)?;
        let key = (sheet.workbook_id.clone(), sheet.id.clone());
        if state.sheets.remove(&key).is_none() {
            return Err(not_found("sheet", &sheet.id));
        }
        state
            .cells
            .retain(|(wid, sid, _), _| !(wid == &key.0 && sid == &key.1));
        Ok(())
    }

    async fn create_cell(&self, cell: &Cell) -> Result<Cell, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::CreateCell)?;
        let sheet_key = (cell.workbook_id.clone(), cell.sheet_id.clone());
        if !state.sheets.contains_key(&sheet_key) {
            return Err(not_found("sheet", &cell.sheet_id));
        }

        let row = {
            let next = state.next_row.entry(sheet_key).or_insert(1);
            let row = *next;
            *next += 1;
            row
        };
        let created = cell.clone().with_id(state.assign_id("c")).with_row(row);

        let key = (
            created.workbook_id.clone(),
            created.sheet_id.clone(),
            created.id.clone(),
        );
        state.cells.insert(key, created.clone());
        Ok(created)
    }

    async fn read_cell(
        &self,
        workbook_id: &str,
        sheet_id: &str,
        cell_id: &str,
    ) -> Result<Cell, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::ReadCell)?;
        state
            .cells
            .get(&(
                workbook_id.to_string(),
                sheet_id.to_string(),
                cell_id.to_string(),
            ))
            .cloned()
            .ok_or_else(|| not_found("cell", cell_id))
    }

    async fn update_cell(&self, cell: &Cell) -> Result<Cell, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::UpdateCell)?;
        let stale = state.stale_updates;
        let key = (cell.workbook_id.clone(), cell.sheet_id.clone(), cell.id.clone());
        match state.cells.get_mut(&key) {
            Some(stored) => {
                let mut before = stored.clone();
                // Row is owned by the service.
                stored.column = cell.column.clone();
                stored.value = cell.value.clone();
                if stale {
                    before.row += 100;
                    return Ok(before);
                }
                Ok(stored.clone())
            },
            None => Err(not_found("cell", &cell.id)),
        }
    }

    async fn delete_cell(&self, cell: &Cell) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::DeleteCell)?;
        let key = (cell.workbook_id.clone(), cell.sheet_id.clone(), cell.id.clone());
        state
            .cells
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| not_found("cell", &cell.id))
    }

    async fn read_extensions(&self) -> Result<Vec<String>, ApiError> {
        let mut state = self.lock();
        state.record(ApiCall::ReadExtensions)?;
        Ok(state.extensions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            body: "boom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_assigns_ids_and_rows() {
        let api = MockSpreadsheetApi::new();
        let wb = api
            .create_workbook(&Workbook::new("budget", "xlsx", "/reports").unwrap())
            .await
            .unwrap();
        assert_eq!(wb.id, "wb-1");

        let sheet = api
            .create_sheet(&Sheet::new(&wb.id, "Data", 5).unwrap())
            .await
            .unwrap();
        assert_eq!(sheet.id, "sh-2");
        assert_eq!(sheet.pos, 0);

        let first = api
            .create_cell(&Cell::new(&wb.id, &sheet.id, "A", "1").unwrap().with_row(99))
            .await
            .unwrap();
        let second = api
            .create_cell(&Cell::new(&wb.id, &sheet.id, "B", "2").unwrap())
            .await
            .unwrap();
        assert_eq!(first.row, 1);
        assert_eq!(second.row, 2);
    }

    #[tokio::test]
    async fn test_mock_keeps_row_on_update() {
        let api = MockSpreadsheetApi::new();
        let wb = api
            .create_workbook(&Workbook::new("budget", "xlsx", "/reports").unwrap())
            .await
            .unwrap();
        let sheet = api
            .create_sheet(&Sheet::new(&wb.id, "Data", 0).unwrap())
            .await
            .unwrap();
        let cell = api
            .create_cell(&Cell::new(&wb.id, &sheet.id, "A", "1").unwrap())
            .await
            .unwrap();

        let updated = api
            .update_cell(&cell.clone().with_row(7))
            .await
            .unwrap();
        assert_eq!(updated.row, cell.row);
    }

    #[tokio::test]
    async fn test_mock_records_calls_and_injects_failures() {
        let api = MockSpreadsheetApi::new();
        api.fail_next(ApiCall::ReadExtensions, server_error());

        assert_err!(api.read_extensions().await);
        let extensions = assert_ok!(api.read_extensions().await);
        assert_eq!(extensions, vec!["xlsx", "xlsm", "xltx", "xltm"]);

        assert_eq!(
            api.calls(),
            vec![ApiCall::ReadExtensions, ApiCall::ReadExtensions]
        );
        assert!(!ApiCall::ReadExtensions.is_write());
        assert!(ApiCall::UpdateCell.is_write());
    }

    #[tokio::test]
    async fn test_mock_missing_objects() {
        let api = MockSpreadsheetApi::new();
        let err = api.read_workbook("wb-404").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { kind: "workbook", .. }));

        let err = api.delete_workbook("wb-404").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));

        let orphan = Sheet::new("wb-404", "Data", 0).unwrap();
        assert_err!(api.create_sheet(&orphan).await);
    }

    #[tokio::test]
    async fn test_delete_workbook_cascades() {
        let api = MockSpreadsheetApi::new();
        let wb = api
            .create_workbook(&Workbook::new("budget", "xlsx", "/reports").unwrap())
            .await
            .unwrap();
        let sheet = api
            .create_sheet(&Sheet::new(&wb.id, "Data", 0).unwrap())
            .await
            .unwrap();

        assert_ok!(api.delete_workbook(&wb.id).await);
        assert!(api.workbook(&wb.id).is_none());
        assert!(api.sheet(&wb.id, &sheet.id).is_none());
    }

    #[test]
    fn test_check_diagnostics_ignores_warnings() {
        assert!(check_diagnostics(vec![Diagnostic::warning("deprecated")]).is_ok());

        let err = check_diagnostics(vec![
            Diagnostic::warning("deprecated"),
            Diagnostic::error("Missing Terraxcel host").with_attribute("host"),
        ])
        .unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[test]
    fn test_assert_error_on_attribute() {
        let diagnostics = vec![Diagnostic::error("Missing Terraxcel token").with_attribute("token")];
        assert_error_on_attribute(&diagnostics, "token");
        assert_error_contains(&diagnostics, "token");
    }

    #[test]
    #[should_panic(expected = "Expected an error on 'host'")]
    fn test_assert_error_on_attribute_fails() {
        let diagnostics = vec![Diagnostic::error("Missing Terraxcel token").with_attribute("token")];
        assert_error_on_attribute(&diagnostics, "host");
    }

    #[test]
    fn test_plan_assertions() {
        use crate::types::AttributeChange;
        use serde_json::json;

        let plan = PlanResult::with_changes(
            json!({"value": "42"}),
            vec![AttributeChange::modified("value", json!("41"), json!("42"))],
            false,
        );
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "value");
        assert_plan_no_changes(&PlanResult::no_change(json!({})));
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![Diagnostic::error("Invalid column")
            .with_detail("column must be uppercase")
            .with_attribute("column")]);

        let display = format!("{}", err);
        assert!(display.contains("1 diagnostic(s)"));
        assert!(display.contains("Invalid column"));
        assert!(display.contains("(at column)"));
    }
}
