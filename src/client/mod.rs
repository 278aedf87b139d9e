//! Client seam for the remote spreadsheet API.
//!
//! Resource adapters only talk to the API through [`SpreadsheetApi`]. The
//! provider builds exactly one implementation at configure time and hands an
//! `Arc` of it to every adapter, so implementations must be safe to share
//! across concurrent requests.

mod http;

pub use self::http::HttpClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Cell, Sheet, Workbook};

/// Errors returned by a [`SpreadsheetApi`] implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed object does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Kind of object, e.g. `workbook`.
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The API answered with a non-success status.
    #[error("API returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The request never produced a usable response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a body that is not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured endpoint cannot be used as a base URL.
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Operations offered by the spreadsheet API.
///
/// Every call returns the API's view of the object. Update responses are
/// not trusted by the adapters, which always re-read after writing.
#[async_trait]
pub trait SpreadsheetApi: Send + Sync + 'static {
    /// Create a workbook; the response carries the assigned ID.
    async fn create_workbook(&self, workbook: &Workbook) -> Result<Workbook, ApiError>;

    /// Fetch a workbook by ID.
    async fn read_workbook(&self, id: &str) -> Result<Workbook, ApiError>;

    /// Apply changes to a workbook identified by `workbook.id`.
    async fn update_workbook(&self, workbook: &Workbook) -> Result<Workbook, ApiError>;

    /// Remove a workbook.
    async fn delete_workbook(&self, id: &str) -> Result<(), ApiError>;

    /// Create a sheet inside `sheet.workbook_id`.
    async fn create_sheet(&self, sheet: &Sheet) -> Result<Sheet, ApiError>;

    /// Fetch a sheet.
    async fn read_sheet(&self, workbook_id: &str, sheet_id: &str) -> Result<Sheet, ApiError>;

    /// Apply changes to a sheet.
    async fn update_sheet(&self, sheet: &Sheet) -> Result<Sheet, ApiError>;

    /// Remove a sheet.
    async fn delete_sheet(&self, sheet: &Sheet) -> Result<(), ApiError>;

    /// Create a cell; the API decides the row.
    async fn create_cell(&self, cell: &Cell) -> Result<Cell, ApiError>;

    /// Fetch a cell.
    async fn read_cell(
        &self,
        workbook_id: &str,
        sheet_id: &str,
        cell_id: &str,
    ) -> Result<Cell, ApiError>;

    /// Apply changes to a cell.
    async fn update_cell(&self, cell: &Cell) -> Result<Cell, ApiError>;

    /// Remove a cell.
    async fn delete_cell(&self, cell: &Cell) -> Result<(), ApiError>;

    /// List supported file extensions, in the API's order.
    async fn read_extensions(&self) -> Result<Vec<String>, ApiError>;
}
