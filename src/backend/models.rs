use serde::{Deserialize, Serialize};

use crate::search::SearchType;

/// A dataset as listed by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One ingested item inside a dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, alias = "mime_type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CognifyRequest {
    pub datasets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    pub run_in_background: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchRequest {
    pub search_type: SearchType,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasets: Option<Vec<String>>,
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_accepts_camel_and_snake() {
        let camel: Dataset =
            serde_json::from_value(json!({"id": "d1", "name": "main", "createdAt": "t"})).unwrap();
        let snake: Dataset =
            serde_json::from_value(json!({"id": "d1", "name": "main", "created_at": "t"})).unwrap();
        assert_eq!(camel, snake);
    }

    #[test]
    fn test_data_item_ignores_unknown_fields() {
        let item: DataItem = serde_json::from_value(json!({
            "id": "x",
            "name": "notes.txt",
            "mimeType": "text/plain",
            "rawDataLocation": "/data/x"
        }))
        .unwrap();
        assert_eq!(item.mime_type.as_deref(), Some("text/plain"));
        assert!(item.extension.is_none());
    }

    #[test]
    fn test_search_request_body() {
        let req = SearchRequest {
            search_type: SearchType::Chunks,
            query: "auth".to_string(),
            datasets: None,
            top_k: 3,
            system_prompt: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"search_type": "CHUNKS", "query": "auth", "top_k": 3})
        );
    }
}
