//! Client side of the knowledge-graph memory service.
//!
//! [`MemoryBackend`] is the seam the MCP tools talk to. [`http::HttpBackend`]
//! forwards each call to the service's REST API; [`mock::MockBackend`] keeps
//! everything in memory for tests.
pub mod http;
pub mod mock;
pub mod models;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use self::models::{CognifyRequest, DataItem, Dataset, SearchRequest};

/// Upper bound on how much of an upstream error body is kept.
pub const MAX_ERROR_BODY: usize = 500;

/// Errors returned by backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to knowledge-graph API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("knowledge-graph API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response from knowledge-graph API: {0}")]
    Decode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BackendError {
    /// Build a status error, keeping at most [`MAX_ERROR_BODY`] characters.
    #[must_use]
    pub fn status(status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(MAX_ERROR_BODY) {
            Some((idx, _)) => format!("{}…", &body[..idx]),
            None => body.to_string(),
        };
        Self::Status { status, body }
    }
}

/// How thoroughly a data item is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Remove the item and the graph nodes only it produced.
    #[default]
    Soft,
    /// Also remove entity nodes shared with other items.
    Hard,
}

impl DeleteMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeleteMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            other => Err(BackendError::InvalidArgument(format!(
                "mode must be 'soft' or 'hard', got '{other}'"
            ))),
        }
    }
}

/// Operations the knowledge-graph service exposes over HTTP.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Upload text into `dataset`, tagged with `node_set`.
    async fn add(
        &self,
        data: &str,
        dataset: &str,
        node_set: &[String],
    ) -> Result<Value, BackendError>;

    /// Start the graph-building pipeline over the given datasets.
    async fn cognify(&self, request: &CognifyRequest) -> Result<Value, BackendError>;

    async fn search(&self, request: &SearchRequest) -> Result<Value, BackendError>;

    async fn list_datasets(&self) -> Result<Vec<Dataset>, BackendError>;

    async fn list_data(&self, dataset_id: &str) -> Result<Vec<DataItem>, BackendError>;

    async fn delete(
        &self,
        data_id: &str,
        dataset_id: &str,
        mode: DeleteMode,
    ) -> Result<Value, BackendError>;

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), BackendError>;

    /// Succeeds when the service answers its health probe.
    async fn health(&self) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_mode_parse() {
        assert_eq!("soft".parse::<DeleteMode>().unwrap(), DeleteMode::Soft);
        assert_eq!(" HARD ".parse::<DeleteMode>().unwrap(), DeleteMode::Hard);
        assert!(matches!(
            "purge".parse::<DeleteMode>(),
            Err(BackendError::InvalidArgument(_))
        ));
        assert_eq!(DeleteMode::default(), DeleteMode::Soft);
    }

    #[test]
    fn test_status_body_truncated() {
        let long = "x".repeat(MAX_ERROR_BODY + 50);
        match BackendError::status(500, &long) {
            BackendError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.chars().count(), MAX_ERROR_BODY + 1);
                assert!(body.ends_with('…'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_status_short_body_kept() {
        let err = BackendError::status(404, "dataset not found");
        assert_eq!(
            err.to_string(),
            "knowledge-graph API returned 404: dataset not found"
        );
    }
}
