//! The remote source contract and credential resolution.
//!
//! The sync layer treats the upstream spreadsheet service as an opaque
//! capability: authenticate once, enumerate named tables, read each table's
//! rows. [`HttpSource`] is the bundled implementation; tests inject fakes.

pub mod error;
pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;

pub use error::SourceError;
pub use http::HttpSource;

/// One spreadsheet row: column name to value, in sheet column order.
pub type Record = Map<String, Value>;

/// Service-account-style credential blob. Unknown fields are carried along
/// untouched so the source implementation can use whatever it needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credentials {
    pub fn from_json(blob: &str) -> Result<Self, SourceError> {
        serde_json::from_str(blob)
            .map_err(|e| SourceError::Auth(format!("invalid credential blob: {e}")))
    }

    /// Resolve credentials with two sources in priority order: the inline
    /// blob from the environment, then the configured credential file.
    pub fn resolve(config: &Config) -> Result<Self, SourceError> {
        if let Some(ref blob) = config.credentials_json {
            debug!("Using credentials from environment variable");
            return Self::from_json(blob);
        }

        let path = &config.credentials_file;
        if !path.exists() {
            return Err(SourceError::Auth(format!(
                "no inline credentials and credential file not found: {}",
                path.display()
            )));
        }

        debug!("Using credentials from file: {}", path.display());
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Auth(format!("cannot read credential file: {e}")))?;
        Self::from_json(&contents)
    }
}

/// An authenticated handle to the remote source.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Names of every table the source exposes.
    async fn list_tables(&self) -> Result<Vec<String>, SourceError>;

    /// All rows of one table. A missing table fails with
    /// [`SourceError::TableNotFound`], which callers may recover per table.
    async fn read_table(&self, name: &str) -> Result<Vec<Record>, SourceError>;
}

/// The remote source capability consumed by the sync service.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn SourceClient>, SourceError>;
}
