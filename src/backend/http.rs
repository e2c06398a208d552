/// REST client for the knowledge-graph memory service.
///
/// Every tool call becomes one request against `/api/v1/*`. A bearer token
/// is attached when configured; the configured timeout applies per request.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::models::{CognifyRequest, DataItem, Dataset, SearchRequest};
use super::{BackendError, DeleteMode, MemoryBackend};
use crate::config::Config;

// ── Constants ────────────────────────────────────────────────────────

const ADD_PATH: &str = "/api/v1/add";
const COGNIFY_PATH: &str = "/api/v1/cognify";
const SEARCH_PATH: &str = "/api/v1/search";
const DATASETS_PATH: &str = "/api/v1/datasets";
const DELETE_PATH: &str = "/api/v1/delete";
const HEALTH_PATH: &str = "/health";

/// Name given to the uploaded text part of an `add` call.
const UPLOAD_FILENAME: &str = "data.txt";

pub struct HttpBackend {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kgbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(
            config.api_base(),
            config.api_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, format!("{}{path}", self.base_url))
    }

    fn request_url<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl + std::fmt::Display,
    {
        debug!(%method, %url, "knowledge-graph API request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// `/api/v1/datasets/{id}` plus optional trailing segments, with the id
    /// escaped as a single path segment.
    fn dataset_url(&self, dataset_id: &str, tail: &[&str]) -> Result<Url, BackendError> {
        if matches!(dataset_id.trim(), "" | "." | "..") {
            return Err(BackendError::InvalidArgument(format!(
                "invalid dataset id '{dataset_id}'"
            )));
        }

        let mut url = Url::parse(&format!("{}{DATASETS_PATH}", self.base_url))
            .map_err(|e| BackendError::InvalidArgument(format!("invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidArgument("API URL cannot carry a path".to_string()))?
            .push(dataset_id)
            .extend(tail);
        Ok(url)
    }

    /// Send, fail on non-2xx, and decode the body. An empty body decodes as
    /// JSON `null`.
    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, BackendError> {
        let resp = Self::send(builder).await?;
        let text = resp.text().await?;
        let text = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str(text).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn send(builder: RequestBuilder) -> Result<Response, BackendError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::status(status.as_u16(), &body))
    }
}

#[async_trait]
impl MemoryBackend for HttpBackend {
    async fn add(
        &self,
        data: &str,
        dataset: &str,
        node_set: &[String],
    ) -> Result<Value, BackendError> {
        let part = Part::text(data.to_string())
            .file_name(UPLOAD_FILENAME)
            .mime_str("text/plain")?;
        let mut form = Form::new()
            .part("data", part)
            .text("datasetName", dataset.to_string());
        for node in node_set {
            form = form.text("node_set", node.clone());
        }

        Self::send_json(self.request(Method::POST, ADD_PATH).multipart(form)).await
    }

    async fn cognify(&self, request: &CognifyRequest) -> Result<Value, BackendError> {
        Self::send_json(self.request(Method::POST, COGNIFY_PATH).json(request)).await
    }

    async fn search(&self, request: &SearchRequest) -> Result<Value, BackendError> {
        Self::send_json(self.request(Method::POST, SEARCH_PATH).json(request)).await
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, BackendError> {
        let datasets: Option<Vec<Dataset>> =
            Self::send_json(self.request(Method::GET, DATASETS_PATH)).await?;
        Ok(datasets.unwrap_or_default())
    }

    async fn list_data(&self, dataset_id: &str) -> Result<Vec<DataItem>, BackendError> {
        let url = self.dataset_url(dataset_id, &["data"])?;
        let items: Option<Vec<DataItem>> =
            Self::send_json(self.request_url(Method::GET, url)).await?;
        Ok(items.unwrap_or_default())
    }

    async fn delete(
        &self,
        data_id: &str,
        dataset_id: &str,
        mode: DeleteMode,
    ) -> Result<Value, BackendError> {
        let builder = self.request(Method::DELETE, DELETE_PATH).query(&[
            ("data_id", data_id),
            ("dataset_id", dataset_id),
            ("mode", mode.as_str()),
        ]);
        Self::send_json(builder).await
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), BackendError> {
        let url = self.dataset_url(dataset_id, &[])?;
        Self::send(self.request_url(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn health(&self) -> Result<(), BackendError> {
        Self::send(self.request(Method::GET, HEALTH_PATH)).await?;
        Ok(())
    }
}
