/// MCP server setup using `rmcp`.
///
/// Provides `McpContext` (shared state) and `McpServer` (startup logic for
/// the stdio and streamable HTTP transports).
use crate::mcp::tools::AppTools;
use anyhow::{Context, Result};
use axum::{Json, extract::State, routing::get};
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{ServiceExt, handler::server::router::Router as McpRouter, transport::io::stdio};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::MemoryBackend;
use crate::config::{Config, HEALTH_ROUTE, TransportMode};

/// Shared application context available to all tool handlers.
#[derive(Clone)]
pub struct McpContext {
    pub backend: Arc<dyn MemoryBackend>,
    pub config: Arc<Config>,
}

/// MCP Server wrapping the context and serving on the configured transport.
#[derive(Clone)]
pub struct McpServer {
    pub ctx: McpContext,
}

impl McpServer {
    pub fn new(ctx: McpContext) -> Self {
        Self { ctx }
    }

    /// Serve on the configured transport until the client disconnects
    /// (stdio) or Ctrl-C is received (HTTP).
    pub async fn start(self) -> Result<()> {
        match self.ctx.config.transport {
            TransportMode::Stdio => self.serve_stdio().await,
            TransportMode::Http => self.serve_http().await,
            TransportMode::Sse => {
                warn!("sse transport is served by the streamable HTTP transport");
                self.serve_http().await
            }
        }
    }

    async fn serve_stdio(self) -> Result<()> {
        info!("Starting MCP server on stdio...");
        let (stdin, stdout) = stdio();

        let running = build_router(self.ctx.clone())
            .serve((stdin, stdout))
            .await
            .context("MCP Server failed to initialize on stdio transport")?;
        running
            .waiting()
            .await
            .context("MCP Server encountered an error during stdio transport")?;

        Ok(())
    }

    async fn serve_http(self) -> Result<()> {
        let config = self.ctx.config.clone();
        let addr = format!("{}:{}", config.host, config.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(
            "Starting MCP server on http://{addr}{} (upstream {})",
            config.mcp_path, config.api_url
        );

        let shutdown = CancellationToken::new();
        tokio::spawn(wait_for_ctrl_c(shutdown.clone()));

        axum::serve(listener, http_app(self.ctx, &shutdown))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .context("MCP Server encountered an error during HTTP transport")?;

        info!("MCP server stopped");
        Ok(())
    }
}

/// Router for one MCP session.
fn build_router(ctx: McpContext) -> McpRouter<AppTools> {
    let app_tools = AppTools::new(ctx);
    McpRouter::new(app_tools.clone()).with_tools(app_tools.tool_router.clone())
}

/// HTTP application: the MCP endpoint at `mcp_path` plus `GET /health`.
///
/// Open MCP event streams end when `shutdown` is cancelled, so graceful
/// shutdown does not wait on connected clients.
pub fn http_app(ctx: McpContext, shutdown: &CancellationToken) -> axum::Router {
    let mut http_config = StreamableHttpServerConfig::default();
    http_config.cancellation_token = shutdown.child_token();

    let session_ctx = ctx.clone();
    let service = StreamableHttpService::new(
        move || Ok(build_router(session_ctx.clone())),
        LocalSessionManager::default().into(),
        http_config,
    );

    let mcp_path = ctx.config.mcp_path.clone();
    axum::Router::new()
        .route(HEALTH_ROUTE, get(health))
        .nest_service(&mcp_path, service)
        .with_state(ctx)
}

async fn health(State(ctx): State<McpContext>) -> Json<serde_json::Value> {
    let upstream = match ctx.backend.health().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "knowledge-graph API health check failed");
            "unreachable"
        }
    };

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "api_url": ctx.config.api_url,
        "upstream": upstream,
    }))
}

async fn wait_for_ctrl_c(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {e}");
        return;
    }
    info!("Ctrl-C received, shutting down");
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    fn test_ctx(backend: Arc<MockBackend>) -> McpContext {
        McpContext {
            backend,
            config: Arc::new(Config::default()),
        }
    }

    async fn spawn_app(backend: Arc<MockBackend>) -> String {
        let ctx = test_ctx(backend);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, http_app(ctx, &CancellationToken::new()))
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    fn initialize_request() -> serde_json::Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0.0.0"}
            }
        })
    }

    #[tokio::test]
    async fn test_health_reports_upstream() {
        let backend = Arc::new(MockBackend::new());
        let base = spawn_app(backend.clone()).await;

        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["upstream"], "ok");

        backend.set_healthy(false);
        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["upstream"], "unreachable");
    }

    #[tokio::test]
    async fn test_mcp_endpoint_streams_events() {
        let base = spawn_app(Arc::new(MockBackend::new())).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/mcp"))
            .header("Accept", "application/json, text/event-stream")
            .json(&initialize_request())
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(
            content_type.starts_with("text/event-stream"),
            "got {content_type}"
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_open_event_stream() {
        let shutdown = CancellationToken::new();
        let app = http_app(test_ctx(Arc::new(MockBackend::new())), &shutdown);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server_shutdown = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await
        });

        let client = reqwest::Client::new();
        let accept = "application/json, text/event-stream";

        // 1. initialize and keep the session id
        let resp = client
            .post(format!("{base}/mcp"))
            .header("Accept", accept)
            .json(&initialize_request())
            .send()
            .await
            .unwrap();
        let session_id = resp
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        resp.text().await.unwrap();

        // 2. initialized notification
        client
            .post(format!("{base}/mcp"))
            .header("Accept", accept)
            .header("mcp-session-id", &session_id)
            .json(&serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .send()
            .await
            .unwrap();

        // 3. hold the server-to-client event stream open
        let stream = client
            .get(format!("{base}/mcp"))
            .header("Accept", "text/event-stream")
            .header("mcp-session-id", &session_id)
            .send()
            .await
            .unwrap();
        assert_eq!(stream.status(), 200);

        shutdown.cancel();
        let stopped = tokio::time::timeout(std::time::Duration::from_secs(5), server).await;
        assert!(stopped.is_ok(), "server did not stop with an open event stream");
        drop(stream);
    }
}
