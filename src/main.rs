use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kgbridge::backend::MemoryBackend;
use kgbridge::backend::http::HttpBackend;
use kgbridge::config::{Config, TransportMode};
use kgbridge::mcp::server::{McpContext, McpServer};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kgbridge", version, about = "MCP bridge to a knowledge-graph memory API")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, env = "KGBRIDGE_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// stdio | http | sse
    #[arg(long)]
    transport: Option<TransportMode>,

    /// Base URL of the knowledge-graph API
    #[arg(long)]
    api_url: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// HTTP path of the MCP endpoint
    #[arg(long)]
    path: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(t) = self.transport {
            config.transport = t;
        }
        if let Some(url) = self.api_url {
            config.api_url = url;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = self.path {
            config.mcp_path = path;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Load config: file < environment < CLI
    let mut config = Config::load(&cli.config)?;
    config.apply_env();
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    tracing::info!(
        "Starting kgbridge v{} ({} transport, upstream {})",
        env!("CARGO_PKG_VERSION"),
        config.transport,
        config.api_url
    );

    // 2. Init upstream client
    let backend: Arc<dyn MemoryBackend> =
        Arc::new(HttpBackend::from_config(&config).context("Failed to build HTTP client")?);
    if let Err(e) = backend.health().await {
        tracing::warn!("Knowledge-graph API not reachable yet: {e}");
    }

    // 3. Init MCP Context
    let mcp_ctx = McpContext {
        backend,
        config: Arc::new(config),
    };

    // 4. Start Server
    let server = McpServer::new(mcp_ctx);
    server.start().await?;

    Ok(())
}
