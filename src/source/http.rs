//! HTTP implementation of the remote source contract.
//!
//! Talks to an Apps-Script-style web-app endpoint: one URL answering
//! `?action=tables` with the table list and `?action=rows&table=<name>` with
//! the rows of one table, each row an object keyed by the sheet's header row.
//! The credential's API key rides along as a query parameter.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use super::error::SourceError;
use super::{Credentials, Record, RemoteSource, SourceClient};

/// HTTP request timeout in seconds.
/// 30s allows for slow spreadsheet reads while still failing in bounded time.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct TablesResponse {
    tables: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<Record>,
}

/// Remote source backed by a single JSON web-app endpoint.
pub struct HttpSource {
    client: Client,
    endpoint: String,
}

impl HttpSource {
    pub fn new(endpoint: String) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn SourceClient>, SourceError> {
        let handle = HttpClient {
            // Cheap clone - reqwest::Client shares its connection pool.
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key: credentials.api_key.clone(),
        };

        // A ping both checks reachability and lets the endpoint reject the
        // key up front instead of on the first table read.
        let response = handle.request(&[("action", "ping")]).await?;
        check_response(response).await?;

        debug!("Authenticated against remote source: {}", self.endpoint);
        Ok(Box::new(handle))
    }
}

struct HttpClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpClient {
    async fn request(&self, params: &[(&str, &str)]) -> Result<Response, SourceError> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        if let Some(ref key) = self.api_key {
            query.push(("key", key));
        }
        Ok(self.client.get(&self.endpoint).query(&query).send().await?)
    }
}

#[async_trait]
impl SourceClient for HttpClient {
    async fn list_tables(&self) -> Result<Vec<String>, SourceError> {
        let response = self.request(&[("action", "tables")]).await?;
        let response = check_response(response).await?;
        let parsed: TablesResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("table list: {e}")))?;
        debug!("Remote source exposes {} tables", parsed.tables.len());
        Ok(parsed.tables)
    }

    async fn read_table(&self, name: &str) -> Result<Vec<Record>, SourceError> {
        let response = self
            .request(&[("action", "rows"), ("table", name)])
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::TableNotFound(name.to_string()));
        }
        let response = check_response(response).await?;

        let parsed: RowsResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("rows of {name}: {e}")))?;
        debug!("Fetched {} records from table: {name}", parsed.rows.len());
        Ok(parsed.rows)
    }
}

async fn check_response(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SourceError::from_status(status, &body))
}
