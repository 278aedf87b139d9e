//! HTTP implementation of [`SpreadsheetApi`].
//!
//! Direct REST client with bearer-token authentication. Resources are
//! addressed hierarchically:
//!
//! ```text
//! /workbooks/{workbook_id}
//! /workbooks/{workbook_id}/sheets/{sheet_id}
//! /workbooks/{workbook_id}/sheets/{sheet_id}/cells/{cell_id}
//! /extensions
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ApiError, SpreadsheetApi};
use crate::config::Credential;
use crate::models::{Cell, Sheet, Workbook};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Spreadsheet API client over HTTP.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    token: Credential,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token)
            .finish()
    }
}

impl HttpClient {
    /// Create a client for the API rooted at `endpoint`.
    pub fn new(endpoint: &str, token: Credential) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(endpoint).map_err(|_| ApiError::InvalidEndpoint(endpoint.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidEndpoint(endpoint.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn workbook_url(&self, workbook_id: &str) -> Result<Url, ApiError> {
        self.url(&["workbooks", workbook_id])
    }

    fn sheets_url(&self, workbook_id: &str) -> Result<Url, ApiError> {
        self.url(&["workbooks", workbook_id, "sheets"])
    }

    fn sheet_url(&self, workbook_id: &str, sheet_id: &str) -> Result<Url, ApiError> {
        self.url(&["workbooks", workbook_id, "sheets", sheet_id])
    }

    fn cells_url(&self, workbook_id: &str, sheet_id: &str) -> Result<Url, ApiError> {
        self.url(&["workbooks", workbook_id, "sheets", sheet_id, "cells"])
    }

    fn cell_url(&self, workbook_id: &str, sheet_id: &str, cell_id: &str) -> Result<Url, ApiError> {
        self.url(&[
            "workbooks",
            workbook_id,
            "sheets",
            sheet_id,
            "cells",
            cell_id,
        ])
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        kind: &'static str,
        id: &str,
    ) -> Result<T, ApiError> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.expose())
            .send()
            .await?;
        decode(response, kind, id).await
    }

    async fn post<B, T>(&self, url: Url, body: &B, kind: &'static str) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose())
            .json(body)
            .send()
            .await?;
        decode(response, kind, "").await
    }

    async fn put<B, T>(&self, url: Url, body: &B, kind: &'static str, id: &str) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%url, "PUT");
        let response = self
            .client
            .put(url)
            .bearer_auth(self.token.expose())
            .json(body)
            .send()
            .await?;
        decode(response, kind, id).await
    }

    async fn delete(&self, url: Url, kind: &'static str, id: &str) -> Result<(), ApiError> {
        debug!(%url, "DELETE");
        let response = self
            .client
            .delete(url)
            .bearer_auth(self.token.expose())
            .send()
            .await?;
        check_status(response, kind, id).await.map(|_| ())
    }
}

async fn check_status(
    response: Response,
    kind: &'static str,
    id: &str,
) -> Result<Response, ApiError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound {
            kind,
            id: id.to_string(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(
    response: Response,
    kind: &'static str,
    id: &str,
) -> Result<T, ApiError> {
    let body = check_status(response, kind, id).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl SpreadsheetApi for HttpClient {
    async fn create_workbook(&self, workbook: &Workbook) -> Result<Workbook, ApiError> {
        self.post(self.url(&["workbooks"])?, workbook, "workbook")
            .await
    }

    async fn read_workbook(&self, id: &str) -> Result<Workbook, ApiError> {
        self.get(self.workbook_url(id)?, "workbook", id).await
    }

    async fn update_workbook(&self, workbook: &Workbook) -> Result<Workbook, ApiError> {
        self.put(
            self.workbook_url(&workbook.id)?,
            workbook,
            "workbook",
            &workbook.id,
        )
        .await
    }

    async fn delete_workbook(&self, id: &str) -> Result<(), ApiError> {
        self.delete(self.workbook_url(id)?, "workbook", id).await
    }

    async fn create_sheet(&self, sheet: &Sheet) -> Result<Sheet, ApiError> {
        self.post(self.sheets_url(&sheet.workbook_id)?, sheet, "sheet")
            .await
    }

    async fn read_sheet(&self, workbook_id: &str, sheet_id: &str) -> Result<Sheet, ApiError> {
        self.get(self.sheet_url(workbook_id, sheet_id)?, "sheet", sheet_id)
            .await
    }

    async fn update_sheet(&self, sheet: &Sheet) -> Result<Sheet, ApiError> {
        self.put(
            self.sheet_url(&sheet.workbook_id, &sheet.id)?,
            sheet,
            "sheet",
            &sheet.id,
        )
        .await
    }

    async fn delete_sheet(&self, sheet: &Sheet) -> Result<(), ApiError> {
        self.delete(
            self.sheet_url(&sheet.workbook_id, &sheet.id)?,
            "sheet",
            &sheet.id,
        )
        .await
    }

    async fn create_cell(&self, cell: &Cell) -> Result<Cell, ApiError> {
        self.post(
            self.cells_url(&cell.workbook_id, &cell.sheet_id)?,
            cell,
            "cell",
        )
        .await
    }

    async fn read_cell(
        &self,
        workbook_id: &str,
        sheet_id: &str,
        cell_id: &str,
    ) -> Result<Cell, ApiError> {
        self.get(self.cell_url(workbook_id, sheet_id, cell_id)?, "cell", cell_id)
            .await
    }

    async fn update_cell(&self, cell: &Cell) -> Result<Cell, ApiError> {
        self.put(
            self.cell_url(&cell.workbook_id, &cell.sheet_id, &cell.id)?,
            cell,
            "cell",
            &cell.id,
        )
        .await
    }

    async fn delete_cell(&self, cell: &Cell) -> Result<(), ApiError> {
        self.delete(
            self.cell_url(&cell.workbook_id, &cell.sheet_id, &cell.id)?,
            "cell",
            &cell.id,
        )
        .await
    }

    async fn read_extensions(&self) -> Result<Vec<String>, ApiError> {
        self.get(self.url(&["extensions"])?, "extensions", "").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::resources::workbook::WorkbookResource;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(endpoint: &str) -> HttpClient {
        HttpClient::new(endpoint, Credential::new("secret-token")).unwrap()
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let err = HttpClient::new("not a url", Credential::new("t")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidEndpoint(_)));

        let err = HttpClient::new("mailto:ops@example.com", Credential::new("t")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_resource_urls() {
        let client = client("https://sheets.example.com/api/v1/");

        assert_eq!(
            client.workbook_url("wb-1").unwrap().as_str(),
            "https://sheets.example.com/api/v1/workbooks/wb-1"
        );
        assert_eq!(
            client.sheet_url("wb-1", "sh-1").unwrap().as_str(),
            "https://sheets.example.com/api/v1/workbooks/wb-1/sheets/sh-1"
        );
        assert_eq!(
            client.cell_url("wb-1", "sh-1", "c-1").unwrap().as_str(),
            "https://sheets.example.com/api/v1/workbooks/wb-1/sheets/sh-1/cells/c-1"
        );
    }

    #[test]
    fn test_urls_without_trailing_slash() {
        let client = client("http://localhost:8080");
        assert_eq!(
            client.url(&["extensions"]).unwrap().as_str(),
            "http://localhost:8080/extensions"
        );
    }

    #[test]
    fn test_ids_are_percent_encoded() {
        let client = client("http://localhost:8080");
        assert_eq!(
            client.workbook_url("a/b").unwrap().as_str(),
            "http://localhost:8080/workbooks/a%2Fb"
        );
    }

    /// Serve one canned HTTP response on a local port and return its URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let endpoint = serve_once("404 Not Found", "").await;

        let err = client(&endpoint).read_workbook("wb-9").await.unwrap_err();

        match err {
            ApiError::NotFound { kind, id } => {
                assert_eq!(kind, "workbook");
                assert_eq!(id, "wb-9");
            },
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let endpoint = serve_once("500 Internal Server Error", "disk full").await;

        let err = client(&endpoint)
            .read_sheet("wb-1", "sh-1")
            .await
            .unwrap_err();

        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "disk full");
            },
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let endpoint = serve_once("200 OK", "{\"id\": ").await;

        let err = client(&endpoint).read_extensions().await.unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
        assert!(err.to_string().starts_with("invalid response body"));
    }

    #[tokio::test]
    async fn test_decodes_success_body() {
        let endpoint = serve_once(
            "200 OK",
            r#"{"id":"wb-1","file_name":"budget","extension":"xlsx","folder_path":"/reports"}"#,
        )
        .await;

        let workbook = client(&endpoint).read_workbook("wb-1").await.unwrap();

        assert_eq!(workbook.id, "wb-1");
        assert_eq!(workbook.extension, "xlsx");
    }

    #[tokio::test]
    async fn test_delete_404_reaches_adapter_as_remote_error() {
        let endpoint = serve_once("404 Not Found", "").await;
        let api: Arc<dyn SpreadsheetApi> = Arc::new(client(&endpoint));
        let resource = WorkbookResource::new(api);

        let err = resource
            .delete(json!({
                "id": "wb-9",
                "file_name": "budget",
                "extension": "xlsx",
                "folder_path": "/reports"
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Remote { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", client("http://localhost:8080"));
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("localhost"));
    }
}
