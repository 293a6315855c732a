//! reqwest-backed [`DashboardApi`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DashboardApi, JobAction, states_query};
use crate::config::DashboardConfig;
use crate::error::ApiError;
use crate::model::{Job, JobState, Slave, Workflow};

/// Every response wraps its payload as `{ "data": ... }`.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

/// HTTP client for the scheduler backend.
pub struct HttpApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` and unwrap the `data` envelope.
    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ApiError> {
        let mut request = self.client.get(self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: DataEnvelope<T> = resp.json().await.map_err(|e| ApiError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        debug!(path, present = envelope.data.is_some(), "API response");
        Ok(envelope.data)
    }

    /// GET a list endpoint. Items that fail to decode are logged and
    /// skipped so one bad row cannot sink the whole refresh.
    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let items = self
            .get_data::<Vec<Value>>(path, query)
            .await?
            .unwrap_or_default();
        Ok(decode_items(path, items))
    }
}

fn decode_items<T: DeserializeOwned>(path: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(path, error = %e, "Skipping undecodable item");
                None
            }
        })
        .collect()
}

#[async_trait]
impl DashboardApi for HttpApi {
    async fn list_jobs(&self, states: &[JobState]) -> Result<Vec<Job>, ApiError> {
        let query = if states.is_empty() {
            Vec::new()
        } else {
            vec![("states", states_query(states))]
        };
        self.get_list("/api/jobs", &query).await
    }

    async fn job_action(
        &self,
        action: JobAction,
        job_id: &str,
        slave_id: &str,
    ) -> Result<Option<Job>, ApiError> {
        let path = format!("/api/job/{job_id}/{action}/{slave_id}");
        self.get_data(&path, &[]).await
    }

    async fn list_slaves(&self) -> Result<Vec<Slave>, ApiError> {
        self.get_list("/api/slaves", &[]).await
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, ApiError> {
        self.get_list("/api/workflows", &[]).await
    }
}
