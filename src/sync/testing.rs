//! In-memory fake of the remote source contract for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::source::{Credentials, Record, RemoteSource, SourceClient, SourceError};

/// Scripted behavior for a [`FakeSource`].
#[derive(Clone, Default)]
pub struct FakeSourcePlan {
    tables: Vec<(String, Vec<Record>)>,
    missing_tables: Vec<String>,
    fail_auth: bool,
    fail_list: bool,
    fetch_delay: Option<Duration>,
}

impl FakeSourcePlan {
    pub fn with_table(mut self, name: &str, rows: Vec<Value>) -> Self {
        let records = rows
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                other => panic!("fake table rows must be objects, got {other}"),
            })
            .collect();
        self.tables.push((name.to_string(), records));
        self
    }

    /// Table that shows up in the listing but fails every read.
    pub fn with_missing_table(mut self, name: &str) -> Self {
        self.missing_tables.push(name.to_string());
        self
    }

    pub fn with_auth_failure(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    pub fn with_list_failure(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// Make every fetch take this long, to exercise scheduler drift handling.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }
}

pub struct FakeSource {
    plan: FakeSourcePlan,
    list_calls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(plan: FakeSourcePlan) -> Self {
        Self {
            plan,
            list_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of `list_tables` calls, i.e. of fetch attempts that got past
    /// authentication.
    pub fn list_calls(&self) -> Arc<AtomicUsize> {
        self.list_calls.clone()
    }
}

#[async_trait]
impl RemoteSource for FakeSource {
    async fn authenticate(
        &self,
        _credentials: &Credentials,
    ) -> Result<Box<dyn SourceClient>, SourceError> {
        if self.plan.fail_auth {
            return Err(SourceError::Auth("rejected by fake source".to_string()));
        }
        Ok(Box::new(FakeClient {
            plan: self.plan.clone(),
            list_calls: self.list_calls.clone(),
        }))
    }
}

struct FakeClient {
    plan: FakeSourcePlan,
    list_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceClient for FakeClient {
    async fn list_tables(&self) -> Result<Vec<String>, SourceError> {
        if let Some(delay) = self.plan.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.plan.fail_list {
            return Err(SourceError::Unavailable(
                "fake source is down".to_string(),
            ));
        }
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let mut names: Vec<String> = self.plan.tables.iter().map(|(n, _)| n.clone()).collect();
        names.extend(self.plan.missing_tables.iter().cloned());
        Ok(names)
    }

    async fn read_table(&self, name: &str) -> Result<Vec<Record>, SourceError> {
        if self.plan.missing_tables.iter().any(|t| t == name) {
            return Err(SourceError::TableNotFound(name.to_string()));
        }
        self.plan
            .tables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| SourceError::TableNotFound(name.to_string()))
    }
}
