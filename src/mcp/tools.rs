/// MCP tool handlers for kgbridge.
///
/// Each tool forwards to the knowledge-graph API through [`MemoryBackend`]:
/// 1. add              – upload text into a dataset
/// 2. cognify          – run the graph-building pipeline (optionally adding text first)
/// 3. search           – query the graph in one of the search modes
/// 4. list_data        – list datasets and their data items
/// 5. delete           – remove one data item from a dataset
/// 6. prune            – delete every dataset
/// 7. save_interaction – store a user/agent exchange and cognify it
/// 8. cognify_status   – unavailable in API mode
/// 9. codify_status    – unavailable in API mode
///
/// [`MemoryBackend`]: crate::backend::MemoryBackend
use crate::backend::models::{CognifyRequest, SearchRequest};
use crate::backend::{BackendError, DeleteMode};
use crate::instruction;
use crate::mcp::server::McpContext;
use crate::search::{self, SearchType};
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

pub const COGNIFY_STATUS_UNAVAILABLE: &str = "Cognify status is not available in API mode";
pub const CODIFY_STATUS_UNAVAILABLE: &str = "Codify status is not available in API mode";

/// Node set that `save_interaction` files exchanges under.
pub const INTERACTION_NODE_SET: &str = "user_agent_interaction";

const DEFAULT_TOP_K: usize = 10;
const MAX_TOP_K: usize = 100;

const SERVER_INSTRUCTIONS: &str = "Knowledge-graph memory over HTTP. Use `add` or `cognify` to \
ingest text, `search` to query it (GRAPH_COMPLETION, RAG_COMPLETION, CODE, CHUNKS, SUMMARIES, \
CYPHER, FEELING_LUCKY), `list_data`/`delete`/`prune` to manage it, and `save_interaction` to \
remember an exchange. Pipeline status is not available in API mode.";

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct AddParams {
    /// Text to store
    pub data: String,
    /// Target dataset (default: configured dataset)
    pub dataset_name: Option<String>,
    /// Node sets to tag the data with
    pub node_set: Option<Vec<String>>,
}

#[derive(Deserialize, JsonSchema)]
pub struct CognifyParams {
    /// Text to add before running the pipeline (optional)
    pub data: Option<String>,
    /// Datasets to process (default: configured dataset)
    pub datasets: Option<Vec<String>>,
    /// Custom prompt for entity and relationship extraction
    pub custom_prompt: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Search query (natural language, code, or graph query for CYPHER)
    pub search_query: String,
    /// GRAPH_COMPLETION | RAG_COMPLETION | CODE | CHUNKS | SUMMARIES | CYPHER | FEELING_LUCKY (default: GRAPH_COMPLETION)
    pub search_type: Option<String>,
    /// Restrict to these datasets
    pub datasets: Option<Vec<String>>,
    /// Max results (default: 10, max: 100)
    pub top_k: Option<usize>,
    /// System prompt for completion modes
    pub system_prompt: Option<String>,
    /// Query instruction profile: nl2code | qa | code2code | code2nl | code2completion
    pub instruction_type: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ListDataParams {
    /// Only list items of this dataset
    pub dataset_id: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct DeleteParams {
    /// Data item id
    pub data_id: String,
    /// Dataset the item belongs to
    pub dataset_id: String,
    /// soft | hard (default: soft)
    pub mode: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct InteractionParams {
    /// Transcript of the user/agent exchange
    pub data: String,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn text_result(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

fn backend_error(op: &str, e: &BackendError) -> Result<CallToolResult, McpError> {
    warn!(op, error = %e, "knowledge-graph API call failed");
    error_result(&format!("{op} failed: {e}"))
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.server_info.name = env!("CARGO_PKG_NAME").to_string();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.instructions = Some(SERVER_INSTRUCTIONS.to_string());
        info
    }
}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    fn dataset_or_default(&self, name: Option<&str>) -> String {
        name.map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.ctx.config.default_dataset.as_str())
            .to_string()
    }

    // ── Tool 1: add ─────────────────────────────────────────────────

    #[tool(description = "Add text to a dataset in the knowledge graph. Run cognify afterwards to build the graph.")]
    pub async fn add(&self, params: Parameters<AddParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.data.trim().is_empty() {
            return error_result("data is required");
        }

        let dataset = self.dataset_or_default(p.dataset_name.as_deref());
        let node_set = p.node_set.unwrap_or_default();
        info!(dataset = %dataset, bytes = p.data.len(), "add");

        match self.ctx.backend.add(&p.data, &dataset, &node_set).await {
            Ok(response) => json_result(serde_json::json!({
                "success": true,
                "dataset": dataset,
                "response": response,
            })),
            Err(e) => backend_error("add", &e),
        }
    }

    // ── Tool 2: cognify ─────────────────────────────────────────────

    #[tool(
        description = "Build the knowledge graph for datasets. If data is given it is added to the first dataset first. The pipeline runs in the background upstream."
    )]
    pub async fn cognify(
        &self,
        params: Parameters<CognifyParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let mut datasets: Vec<String> = p
            .datasets
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        if datasets.is_empty() {
            datasets.push(self.ctx.config.default_dataset.clone());
        }

        if let Some(data) = p.data.as_deref().filter(|d| !d.trim().is_empty()) {
            if let Err(e) = self.ctx.backend.add(data, &datasets[0], &[]).await {
                return backend_error("add", &e);
            }
        }

        let request = CognifyRequest {
            datasets: datasets.clone(),
            custom_prompt: p.custom_prompt.filter(|c| !c.trim().is_empty()),
            run_in_background: true,
        };
        info!(datasets = ?request.datasets, "cognify");

        match self.ctx.backend.cognify(&request).await {
            Ok(response) => json_result(serde_json::json!({
                "success": true,
                "message": "Background process launched. Pipeline status is not available in API mode; use list_data or search to see results.",
                "datasets": datasets,
                "response": response,
            })),
            Err(e) => backend_error("cognify", &e),
        }
    }

    // ── Tool 3: search ──────────────────────────────────────────────

    #[tool(
        description = "Search the knowledge graph. Completion modes return an answer; other modes return matching records as JSON."
    )]
    pub async fn search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.search_query.trim().is_empty() {
            return error_result("search_query is required");
        }

        let search_type = match p.search_type.as_deref() {
            Some(token) => match token.parse::<SearchType>() {
                Ok(t) => t,
                Err(e) => return error_result(&e),
            },
            None => SearchType::default(),
        };

        let top_k = p.top_k.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 || top_k > MAX_TOP_K {
            return error_result(&format!("top_k must be between 1 and {MAX_TOP_K}"));
        }

        let query = instruction::prepare_query_texts(
            [p.search_query.as_str()],
            p.instruction_type.as_deref(),
            &self.ctx.config.instructions,
        )
        .into_iter()
        .next()
        .unwrap_or(p.search_query);

        let request = SearchRequest {
            search_type,
            query,
            datasets: p.datasets.filter(|d| !d.is_empty()),
            top_k,
            system_prompt: p.system_prompt.filter(|s| !s.trim().is_empty()),
        };
        info!(%search_type, top_k, "search");

        match self.ctx.backend.search(&request).await {
            Ok(results) => text_result(search::format_results(search_type, &results)),
            Err(e) => backend_error("search", &e),
        }
    }

    // ── Tool 4: list_data ───────────────────────────────────────────

    #[tool(description = "List datasets and their data items, or the items of one dataset")]
    pub async fn list_data(
        &self,
        params: Parameters<ListDataParams>,
    ) -> Result<CallToolResult, McpError> {
        let backend = &self.ctx.backend;

        if let Some(dataset_id) = params.0.dataset_id.filter(|d| !d.trim().is_empty()) {
            return match backend.list_data(&dataset_id).await {
                Ok(items) => json_result(serde_json::json!({
                    "dataset_id": dataset_id,
                    "count": items.len(),
                    "items": items,
                })),
                Err(e) => backend_error("list_data", &e),
            };
        }

        let datasets = match backend.list_datasets().await {
            Ok(d) => d,
            Err(e) => return backend_error("list_datasets", &e),
        };

        let mut listed = Vec::with_capacity(datasets.len());
        for ds in &datasets {
            let entry = match backend.list_data(&ds.id).await {
                Ok(items) => serde_json::json!({
                    "id": ds.id,
                    "name": ds.name,
                    "count": items.len(),
                    "items": items,
                }),
                Err(e) => {
                    warn!(dataset = %ds.id, error = %e, "failed to list dataset items");
                    serde_json::json!({
                        "id": ds.id,
                        "name": ds.name,
                        "error": e.to_string(),
                    })
                }
            };
            listed.push(entry);
        }

        json_result(serde_json::json!({
            "count": listed.len(),
            "datasets": listed,
        }))
    }

    // ── Tool 5: delete ──────────────────────────────────────────────

    #[tool(description = "Delete a data item from a dataset. mode=hard also removes shared entity nodes.")]
    pub async fn delete(
        &self,
        params: Parameters<DeleteParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.data_id.trim().is_empty() || p.dataset_id.trim().is_empty() {
            return error_result("data_id and dataset_id are required");
        }

        let mode = match p.mode.as_deref() {
            Some(m) => match m.parse::<DeleteMode>() {
                Ok(mode) => mode,
                Err(e) => return error_result(&e.to_string()),
            },
            None => DeleteMode::default(),
        };
        info!(data_id = %p.data_id, dataset_id = %p.dataset_id, %mode, "delete");

        match self.ctx.backend.delete(&p.data_id, &p.dataset_id, mode).await {
            Ok(response) => json_result(serde_json::json!({
                "success": true,
                "mode": mode.as_str(),
                "response": response,
            })),
            Err(e) => backend_error("delete", &e),
        }
    }

    // ── Tool 6: prune ───────────────────────────────────────────────

    #[tool(description = "Reset the knowledge graph by deleting every dataset. Irreversible.")]
    pub async fn prune(&self) -> Result<CallToolResult, McpError> {
        let backend = &self.ctx.backend;
        let datasets = match backend.list_datasets().await {
            Ok(d) => d,
            Err(e) => return backend_error("list_datasets", &e),
        };
        info!(count = datasets.len(), "prune");

        let mut removed = 0usize;
        let mut failed = Vec::new();
        for ds in &datasets {
            match backend.delete_dataset(&ds.id).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(dataset = %ds.id, error = %e, "failed to delete dataset");
                    failed.push(serde_json::json!({"id": ds.id, "name": ds.name, "error": e.to_string()}));
                }
            }
        }

        json_result(serde_json::json!({
            "success": failed.is_empty(),
            "removed": removed,
            "failed": failed,
        }))
    }

    // ── Tool 7: save_interaction ────────────────────────────────────

    #[tool(description = "Store a user/agent interaction in memory and cognify it in the background")]
    pub async fn save_interaction(
        &self,
        params: Parameters<InteractionParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = params.0.data;
        if data.trim().is_empty() {
            return error_result("data is required");
        }

        let dataset = self.ctx.config.default_dataset.clone();
        let node_set = vec![INTERACTION_NODE_SET.to_string()];
        info!(dataset = %dataset, "save_interaction");

        if let Err(e) = self.ctx.backend.add(&data, &dataset, &node_set).await {
            return backend_error("add", &e);
        }

        let request = CognifyRequest {
            datasets: vec![dataset.clone()],
            custom_prompt: None,
            run_in_background: true,
        };
        match self.ctx.backend.cognify(&request).await {
            Ok(_) => json_result(serde_json::json!({
                "success": true,
                "message": "Interaction saved; processing in the background",
                "dataset": dataset,
            })),
            Err(e) => backend_error("cognify", &e),
        }
    }

    // ── Tools 8 & 9: status (unavailable) ───────────────────────────

    #[tool(description = "Status of the cognify pipeline. Not available in API mode.")]
    pub async fn cognify_status(&self) -> Result<CallToolResult, McpError> {
        error_result(COGNIFY_STATUS_UNAVAILABLE)
    }

    #[tool(description = "Status of the codify pipeline. Not available in API mode.")]
    pub async fn codify_status(&self) -> Result<CallToolResult, McpError> {
        error_result(CODIFY_STATUS_UNAVAILABLE)
    }
}
