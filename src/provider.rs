//! The Terraxcel provider.
//!
//! [`TerraxcelProvider`] resolves its configuration once, builds a single
//! API client from it and hands that client to every adapter. Requests
//! are then dispatched to the adapter registered for the resource type.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::{debug, info};

use crate::client::{ApiError, HttpClient, SpreadsheetApi};
use crate::config::{config_schema, ProviderConfig};
use crate::error::ProviderError;
use crate::resources::{
    CellResource, ExtensionsDataSource, SheetResource, WorkbookResource, CELL, EXTENSIONS, SHEET,
    WORKBOOK,
};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation;

/// Builds the API client from a resolved configuration.
pub type ClientFactory =
    Box<dyn Fn(&ProviderConfig) -> Result<Arc<dyn SpreadsheetApi>, ApiError> + Send + Sync>;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Adapters built at configure time, all sharing one client.
struct Adapters {
    workbooks: WorkbookResource,
    sheets: SheetResource,
    cells: CellResource,
    extensions: ExtensionsDataSource,
}

impl Adapters {
    fn new(api: Arc<dyn SpreadsheetApi>, config: &ProviderConfig) -> Self {
        Self {
            workbooks: WorkbookResource::new(Arc::clone(&api)),
            sheets: SheetResource::new(Arc::clone(&api)),
            cells: CellResource::new(Arc::clone(&api))
                .with_legacy_placeholder(config.legacy_cell_placeholder),
            extensions: ExtensionsDataSource::new(api),
        }
    }
}

/// Provider managing spreadsheet workbooks, sheets and cells.
pub struct TerraxcelProvider {
    factory: ClientFactory,
    env: EnvLookup,
    adapters: OnceLock<Adapters>,
}

impl Default for TerraxcelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TerraxcelProvider {
    /// A provider talking to the API over HTTP.
    pub fn new() -> Self {
        Self::with_client_factory(|config: &ProviderConfig| {
            let client = HttpClient::new(&config.host, config.token.clone())?;
            Ok(Arc::new(client) as Arc<dyn SpreadsheetApi>)
        })
    }

    /// A provider using a custom client constructor.
    pub fn with_client_factory<F>(factory: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn SpreadsheetApi>, ApiError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            env: Box::new(|name| std::env::var(name).ok()),
            adapters: OnceLock::new(),
        }
    }

    /// A provider that uses `api` once configured, whatever the host.
    pub fn with_api<A: SpreadsheetApi>(api: Arc<A>) -> Self {
        let api: Arc<dyn SpreadsheetApi> = api;
        Self::with_client_factory(move |_| Ok(Arc::clone(&api)))
    }

    /// Replace the environment lookup used for configuration fallback.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Whether `configure` has succeeded.
    pub fn is_configured(&self) -> bool {
        self.adapters.get().is_some()
    }

    fn adapters(&self) -> Result<&Adapters, ProviderError> {
        self.adapters.get().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    fn resolve(&self, config: &Value) -> Result<ProviderConfig, Vec<Diagnostic>> {
        ProviderConfig::resolve_with(config, |name| (self.env)(name))
    }
}

fn unknown(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(resource_type.to_string())
}

#[async_trait::async_trait]
impl ProviderService for TerraxcelProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(config_schema())
            .with_resource(WORKBOOK, WorkbookResource::schema())
            .with_resource(SHEET, SheetResource::schema())
            .with_resource(CELL, CellResource::schema())
            .with_data_source(EXTENSIONS, ExtensionsDataSource::schema())
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validation::validate(&config_schema(), &config);
        if !diagnostics.is_empty() {
            return Ok(diagnostics);
        }
        Ok(self.resolve(&config).err().unwrap_or_default())
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        if self.is_configured() {
            return Err(ProviderError::Configuration(
                "provider is already configured".to_string(),
            ));
        }

        let resolved = match self.resolve(&config) {
            Ok(resolved) => resolved,
            Err(diagnostics) => return Ok(diagnostics),
        };

        let api = match (self.factory)(&resolved) {
            Ok(api) => api,
            Err(e) => {
                return Ok(vec![Diagnostic::error("Unable to create Terraxcel API client")
                    .with_detail(e.to_string())])
            },
        };

        self.adapters
            .set(Adapters::new(api, &resolved))
            .map_err(|_| {
                ProviderError::Configuration("provider is already configured".to_string())
            })?;

        info!(
            host = %resolved.host,
            legacy_cell_placeholder = resolved.legacy_cell_placeholder,
            "Provider configured"
        );
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("Provider stopping");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        match resource_type {
            WORKBOOK => Ok(WorkbookResource::validate_config(&config)),
            SHEET => Ok(SheetResource::validate_config(&config)),
            CELL => Ok(CellResource::validate_config(&config)),
            _ => Err(unknown(resource_type)),
        }
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        match resource_type {
            WORKBOOK => Ok(WorkbookResource::plan(prior_state, proposed_state)),
            SHEET => Ok(SheetResource::plan(prior_state, proposed_state)),
            CELL => Ok(CellResource::plan(prior_state, proposed_state)),
            _ => Err(unknown(resource_type)),
        }
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let adapters = self.adapters()?;
        match resource_type {
            WORKBOOK => adapters.workbooks.create(planned_state).await,
            SHEET => adapters.sheets.create(planned_state).await,
            CELL => adapters.cells.create(planned_state).await,
            _ => Err(unknown(resource_type)),
        }
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let adapters = self.adapters()?;
        match resource_type {
            WORKBOOK => adapters.workbooks.read(current_state).await,
            SHEET => adapters.sheets.read(current_state).await,
            CELL => adapters.cells.read(current_state).await,
            _ => Err(unknown(resource_type)),
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let adapters = self.adapters()?;
        match resource_type {
            WORKBOOK => adapters.workbooks.update(prior_state, planned_state).await,
            SHEET => adapters.sheets.update(prior_state, planned_state).await,
            CELL => adapters.cells.update(prior_state, planned_state).await,
            _ => Err(unknown(resource_type)),
        }
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let adapters = self.adapters()?;
        match resource_type {
            WORKBOOK => adapters.workbooks.delete(current_state).await,
            SHEET => adapters.sheets.delete(current_state).await,
            CELL => adapters.cells.delete(current_state).await,
            _ => Err(unknown(resource_type)),
        }
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let adapters = self.adapters()?;
        let state = match resource_type {
            WORKBOOK => adapters.workbooks.import(id).await?,
            SHEET => adapters.sheets.import(id).await?,
            CELL => adapters.cells.import(id).await?,
            _ => return Err(unknown(resource_type)),
        };
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        let adapters = self.adapters()?;
        match data_source_type {
            EXTENSIONS => adapters.extensions.read().await,
            _ => Err(unknown(data_source_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HOST_ENV, TOKEN_ENV};
    use crate::testing::{
        assert_error_contains, assert_error_on_attribute, assert_plan_changes_attribute,
        assert_plan_creates, assert_plan_no_changes, assert_plan_replaces,
        assert_plan_updates_in_place, MockSpreadsheetApi, ProviderTester, TestError,
    };
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn tester() -> (Arc<MockSpreadsheetApi>, ProviderTester<TerraxcelProvider>) {
        let api = Arc::new(MockSpreadsheetApi::new());
        let provider = TerraxcelProvider::with_api(api.clone()).with_env(no_env);
        (api, ProviderTester::new(provider))
    }

    async fn configured() -> (Arc<MockSpreadsheetApi>, ProviderTester<TerraxcelProvider>) {
        let (api, tester) = tester();
        tester
            .configure(json!({"host": "http://mock", "token": "secret"}))
            .await
            .unwrap();
        (api, tester)
    }

    #[test]
    fn test_schema_and_metadata() {
        let (_api, tester) = tester();

        assert_eq!(
            tester.resource_types(),
            vec!["terraxcel_cell", "terraxcel_sheet", "terraxcel_workbook"]
        );
        assert_eq!(tester.data_source_types(), vec!["terraxcel_extensions"]);

        let schema = tester.schema();
        assert!(schema.provider.block.attributes["token"].flags.sensitive);
    }

    #[tokio::test]
    async fn test_configure_reports_every_missing_field() {
        let (_api, tester) = tester();

        let err = tester.configure(Value::Null).await.unwrap_err();

        assert_error_on_attribute(err.diagnostics(), "host");
        assert_error_on_attribute(err.diagnostics(), "token");
        assert_error_contains(err.diagnostics(), "Missing Terraxcel token");
        assert!(!tester.provider().is_configured());
    }

    #[tokio::test]
    async fn test_configure_with_env_token() {
        let api = Arc::new(MockSpreadsheetApi::new());
        let provider = TerraxcelProvider::with_api(api).with_env(|name| {
            (name == TOKEN_ENV).then(|| "from-env".to_string())
        });
        let tester = ProviderTester::new(provider);

        tester
            .configure(json!({"host": "http://mock"}))
            .await
            .unwrap();
        assert!(tester.provider().is_configured());
    }

    #[tokio::test]
    async fn test_configure_twice_fails() {
        let (_api, tester) = configured().await;

        let err = tester
            .configure(json!({"host": "http://mock", "token": "secret"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TestError::Provider(ProviderError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_unusable_host() {
        let tester = ProviderTester::new(TerraxcelProvider::new().with_env(no_env));

        let err = tester
            .configure(json!({"host": "not a url", "token": "secret"}))
            .await
            .unwrap_err();

        assert_eq!(
            err.diagnostics()[0].summary,
            "Unable to create Terraxcel API client"
        );
        assert!(!tester.provider().is_configured());
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let provider = TerraxcelProvider::with_api(Arc::new(MockSpreadsheetApi::new()))
            .with_env(|name| (name == HOST_ENV).then(|| "http://env".to_string()));
        let tester = ProviderTester::new(provider);

        tester
            .validate_provider_config(json!({"token": "secret"}))
            .await
            .unwrap();

        let err = tester
            .validate_provider_config(json!({"host": 42}))
            .await
            .unwrap_err();
        assert_error_on_attribute(err.diagnostics(), "host");
    }

    #[tokio::test]
    async fn test_operations_before_configure() {
        let (api, tester) = tester();

        let err = tester
            .create(
                WORKBOOK,
                json!({"file_name": "budget", "extension": "xlsx", "folder_path": "/reports"}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let (_api, tester) = configured().await;

        let err = tester.create("terraxcel_chart", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = tester.plan_create("terraxcel_chart", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = tester
            .read_data_source("terraxcel_formats", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (api, tester) = configured().await;

        let workbook = tester
            .lifecycle_create(
                WORKBOOK,
                json!({"file_name": "budget", "extension": "xlsx", "folder_path": "/reports"}),
            )
            .await
            .unwrap();
        let workbook_id = workbook["id"].as_str().unwrap().to_string();

        let sheet = tester
            .lifecycle_create(SHEET, json!({"workbook_id": workbook_id, "name": "Data"}))
            .await
            .unwrap();
        let sheet_id = sheet["id"].as_str().unwrap().to_string();

        let cell = tester
            .lifecycle_create(
                CELL,
                json!({"workbook_id": workbook_id, "sheet_id": sheet_id, "column": "A", "value": "42"}),
            )
            .await
            .unwrap();
        assert_eq!(cell["row"], 1);
        assert_eq!(cell["value"], "42");

        let mut proposed = cell.clone();
        proposed["value"] = json!("43");
        let plan = tester.plan_update(CELL, cell.clone(), proposed.clone()).await.unwrap();
        assert_plan_updates_in_place(&plan);

        let updated = tester.lifecycle_update(CELL, cell, proposed).await.unwrap();
        assert_eq!(updated["value"], "43");
        assert_eq!(updated["row"], 1);

        tester.lifecycle_delete(CELL, updated).await.unwrap();
        tester.lifecycle_delete(SHEET, sheet).await.unwrap();
        tester.lifecycle_delete(WORKBOOK, workbook).await.unwrap();
        assert!(api.workbook(&workbook_id).is_none());
    }

    #[tokio::test]
    async fn test_plans() {
        let (_api, tester) = configured().await;

        let plan = tester
            .plan_create(SHEET, json!({"workbook_id": "wb-1", "name": "Data"}))
            .await
            .unwrap();
        assert_plan_creates(&plan);

        let prior = json!({
            "id": "sh-2",
            "workbook_id": "wb-1",
            "name": "Data",
            "pos": 0,
            "last_updated": "Monday, 02-Jan-06 15:04:05 UTC"
        });
        let plan = tester.plan_update(SHEET, prior.clone(), prior.clone()).await.unwrap();
        assert_plan_no_changes(&plan);

        let mut proposed = prior.clone();
        proposed["workbook_id"] = json!("wb-9");
        let plan = tester.plan_update(SHEET, prior.clone(), proposed).await.unwrap();
        assert_plan_replaces(&plan);
        assert_plan_changes_attribute(&plan, "workbook_id");

        let plan = tester.plan_delete(SHEET, prior).await.unwrap();
        assert!(plan.planned_state.is_null());
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let (_api, tester) = tester();

        tester
            .validate_resource_config(
                CELL,
                json!({"workbook_id": "wb-1", "sheet_id": "sh-1", "column": "XFD", "value": ""}),
            )
            .await
            .unwrap();

        let err = tester
            .validate_resource_config(
                WORKBOOK,
                json!({"file_name": "budget", "extension": "ods", "folder_path": "/r"}),
            )
            .await
            .unwrap_err();
        assert_error_on_attribute(err.diagnostics(), "extension");
    }

    #[tokio::test]
    async fn test_import() {
        let (_api, tester) = configured().await;
        tester
            .create(
                WORKBOOK,
                json!({"file_name": "budget", "extension": "xlsx", "folder_path": "/reports"}),
            )
            .await
            .unwrap();

        let imported = tester.import_resource(WORKBOOK, "wb-1").await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, WORKBOOK);
        assert_eq!(imported[0].state["folder_path"], "/reports");

        let err = tester.import_resource(WORKBOOK, "wb-7").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_extensions_data_source() {
        let (_api, tester) = configured().await;

        let result = tester.read_data_source(EXTENSIONS, Value::Null).await.unwrap();

        let names: Vec<&str> = result["extensions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["extension"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["xlsx", "xlsm", "xltx", "xltm"]);
    }

    #[tokio::test]
    async fn test_legacy_placeholder_flag() {
        let (api, tester) = tester();
        api.put_workbook(
            crate::models::Workbook::new("budget", "xlsx", "/reports")
                .unwrap()
                .with_id("wb-1"),
        );
        api.put_sheet(
            crate::models::Sheet::new("wb-1", "Data", 0)
                .unwrap()
                .with_id("sh-1"),
        );
        tester
            .configure(json!({"host": "http://mock", "token": "secret", "legacy_cell_placeholder": true}))
            .await
            .unwrap();

        let cell = tester
            .create(
                CELL,
                json!({"workbook_id": "wb-1", "sheet_id": "sh-1", "column": "B", "value": "hello"}),
            )
            .await
            .unwrap();
        assert_eq!(cell["value"], "test");
    }
}
