//! The `terraxcel_extensions` data source.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::client::SpreadsheetApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Lists the file extensions the service accepts.
pub struct ExtensionsDataSource {
    api: Arc<dyn SpreadsheetApi>,
}

impl ExtensionsDataSource {
    /// Create the data source around a configured client.
    pub fn new(api: Arc<dyn SpreadsheetApi>) -> Self {
        Self { api }
    }

    /// `extensions` is a computed list of `{ extension }` objects.
    pub fn schema() -> Schema {
        let entry = AttributeType::object([("extension", AttributeType::String)]);
        Schema::v0()
            .with_description("File extensions supported by the service.")
            .with_attribute(
                "extensions",
                Attribute::new(AttributeType::list(entry), AttributeFlags::computed()),
            )
    }

    /// Fetch the list, keeping the service's order.
    pub async fn read(&self) -> Result<Value, ProviderError> {
        let extensions = self
            .api
            .read_extensions()
            .await
            .map_err(|e| ProviderError::remote("Unable to read extensions", e))?;

        let entries: Vec<Value> = extensions
            .into_iter()
            .map(|extension| json!({ "extension": extension }))
            .collect();
        Ok(json!({ "extensions": entries }))
    }
}
