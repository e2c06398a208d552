/// In-memory backend for tests.
///
/// Stores datasets and items in process memory and records every call so
/// tests can assert on what the tools asked the service to do.
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::models::{CognifyRequest, DataItem, Dataset, SearchRequest};
use super::{BackendError, DeleteMode, MemoryBackend};

#[derive(Default)]
struct MockState {
    datasets: Vec<(Dataset, Vec<DataItem>)>,
    next_id: usize,
    calls: Vec<String>,
    search_response: Option<Value>,
    failing_datasets: Vec<String>,
    healthy: bool,
}

/// A backend that keeps data in memory and records calls.
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState {
                healthy: true,
                ..MockState::default()
            }),
        }
    }
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the value returned by every `search` call.
    pub fn set_search_response(&self, value: Value) {
        self.lock().search_response = Some(value);
    }

    /// Make `delete_dataset` fail for the given id.
    pub fn fail_dataset_delete(&self, dataset_id: &str) {
        self.lock().failing_datasets.push(dataset_id.to_string());
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    /// Calls received so far, formatted as `op:arg,...`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn dataset_count(&self) -> usize {
        self.lock().datasets.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

#[async_trait]
impl MemoryBackend for MockBackend {
    async fn add(
        &self,
        data: &str,
        dataset: &str,
        node_set: &[String],
    ) -> Result<Value, BackendError> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("add:{dataset},{}", node_set.join("|")));

        let item_id = state.next_id("data");
        let position = state.datasets.iter().position(|(d, _)| d.name == dataset);
        let idx = match position {
            Some(idx) => idx,
            None => {
                let id = state.next_id("dataset");
                state.datasets.push((
                    Dataset {
                        id,
                        name: dataset.to_string(),
                        created_at: None,
                    },
                    Vec::new(),
                ));
                state.datasets.len() - 1
            }
        };

        let (ds, items) = &mut state.datasets[idx];
        items.push(DataItem {
            id: item_id.clone(),
            name: format!("text_{}", data.len()),
            extension: Some("txt".to_string()),
            mime_type: Some("text/plain".to_string()),
            created_at: None,
        });

        Ok(json!({"status": "completed", "dataset_id": ds.id, "data_id": item_id}))
    }

    async fn cognify(&self, request: &CognifyRequest) -> Result<Value, BackendError> {
        let mut state = self.lock();
        state.calls.push(format!(
            "cognify:{},background={}",
            request.datasets.join("|"),
            request.run_in_background
        ));
        Ok(json!({"status": "PipelineRunStarted"}))
    }

    async fn search(&self, request: &SearchRequest) -> Result<Value, BackendError> {
        let mut state = self.lock();
        state.calls.push(format!(
            "search:{},{},{}",
            request.search_type, request.top_k, request.query
        ));
        Ok(state.search_response.clone().unwrap_or_else(|| json!([])))
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, BackendError> {
        let mut state = self.lock();
        state.calls.push("list_datasets".to_string());
        Ok(state.datasets.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn list_data(&self, dataset_id: &str) -> Result<Vec<DataItem>, BackendError> {
        let mut state = self.lock();
        state.calls.push(format!("list_data:{dataset_id}"));
        state
            .datasets
            .iter()
            .find(|(d, _)| d.id == dataset_id)
            .map(|(_, items)| items.clone())
            .ok_or_else(|| BackendError::status(404, "dataset not found"))
    }

    async fn delete(
        &self,
        data_id: &str,
        dataset_id: &str,
        mode: DeleteMode,
    ) -> Result<Value, BackendError> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("delete:{data_id},{dataset_id},{mode}"));

        let items = state
            .datasets
            .iter_mut()
            .find(|(d, _)| d.id == dataset_id)
            .map(|(_, items)| items)
            .ok_or_else(|| BackendError::status(404, "dataset not found"))?;
        let before = items.len();
        items.retain(|i| i.id != data_id);
        if items.len() == before {
            return Err(BackendError::status(404, "data not found"));
        }
        Ok(json!({"status": "success", "deleted_data_id": data_id}))
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(format!("delete_dataset:{dataset_id}"));
        if state.failing_datasets.iter().any(|d| d == dataset_id) {
            return Err(BackendError::status(500, "dataset is locked"));
        }
        state.datasets.retain(|(d, _)| d.id != dataset_id);
        Ok(())
    }

    async fn health(&self) -> Result<(), BackendError> {
        if self.lock().healthy {
            Ok(())
        } else {
            Err(BackendError::status(503, "unhealthy"))
        }
    }
}
