/// Search modes understood by the knowledge-graph API and rendering of
/// their results as tool output.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Search sub-mode, serialized with the upstream's literal tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    /// LLM answer grounded on the knowledge graph.
    #[default]
    GraphCompletion,
    /// LLM answer grounded on retrieved chunks.
    RagCompletion,
    Code,
    Chunks,
    Summaries,
    /// Raw graph query language.
    Cypher,
    /// Upstream picks the mode and returns its best single result.
    FeelingLucky,
}

impl SearchType {
    pub const ALL: [SearchType; 7] = [
        Self::GraphCompletion,
        Self::RagCompletion,
        Self::Code,
        Self::Chunks,
        Self::Summaries,
        Self::Cypher,
        Self::FeelingLucky,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GraphCompletion => "GRAPH_COMPLETION",
            Self::RagCompletion => "RAG_COMPLETION",
            Self::Code => "CODE",
            Self::Chunks => "CHUNKS",
            Self::Summaries => "SUMMARIES",
            Self::Cypher => "CYPHER",
            Self::FeelingLucky => "FEELING_LUCKY",
        }
    }

    /// Completion modes answer with generated text rather than records.
    #[must_use]
    pub fn is_completion(&self) -> bool {
        matches!(self, Self::GraphCompletion | Self::RagCompletion)
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == token)
            .ok_or_else(|| {
                let accepted: Vec<&str> = Self::ALL.iter().map(SearchType::as_str).collect();
                format!(
                    "unknown search_type '{}' (expected one of: {})",
                    s.trim(),
                    accepted.join(", ")
                )
            })
    }
}

pub const NO_RESULTS: &str = "No results found.";

/// Render an upstream search response as tool text.
///
/// Completion modes yield the first textual answer. Everything else is
/// pretty-printed JSON.
#[must_use]
pub fn format_results(search_type: SearchType, results: &Value) -> String {
    if is_empty(results) {
        return NO_RESULTS.to_string();
    }

    if search_type.is_completion() {
        if let Some(answer) = first_answer(results) {
            return answer;
        }
    }

    serde_json::to_string_pretty(results).unwrap_or_else(|_| results.to_string())
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Pull the first string answer out of the shapes the upstream returns:
/// a bare string, a list of strings, or a list of `{search_result: ...}`
/// objects (one per dataset).
fn first_answer(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_answer),
        Value::Object(map) => map.get("search_result").and_then(first_answer),
        _ => None,
    }
}
