/// Configuration module for kgbridge.
///
/// Handles loading, validating, and providing default configuration values.
/// Sources are layered: JSON file, then environment, then CLI flags.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

/// Route served next to the MCP endpoint; `mcp_path` may not overlap it.
pub const HEALTH_ROUTE: &str = "/health";

fn default_dataset() -> String {
    "main_dataset".to_string()
}

fn default_instruction_mode() -> String {
    "off".to_string()
}

// ── Transport ────────────────────────────────────────────────────────

/// How the MCP server talks to its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
    /// Served by the streamable HTTP transport, whose responses are SSE framed.
    Sse,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" | "streamable-http" | "streamable_http" => Ok(Self::Http),
            "sse" => Ok(Self::Sse),
            other => Err(format!(
                "unknown transport '{other}' (expected stdio, http or sse)"
            )),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Sse => "sse",
        };
        f.write_str(s)
    }
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Base URL of the knowledge-graph HTTP API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token sent upstream when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub transport: TransportMode,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_mcp_path")]
    pub mcp_path: String,

    /// Dataset used when a tool call names none.
    #[serde(default = "default_dataset")]
    pub default_dataset: String,

    #[serde(default)]
    pub instructions: InstructionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstructionConfig {
    #[serde(default = "default_instruction_mode")]
    pub mode: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_type: Option<String>,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
            transport: TransportMode::default(),
            host: default_host(),
            port: default_port(),
            mcp_path: default_mcp_path(),
            default_dataset: default_dataset(),
            instructions: InstructionConfig::default(),
        }
    }
}

impl Default for InstructionConfig {
    fn default() -> Self {
        Self {
            mode: default_instruction_mode(),
            default_type: None,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. A file that exists but does not
    /// parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;

        info!("Loaded configuration from {}", path.display());
        Ok(cfg)
    }

    /// Override fields from process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Override fields from an arbitrary variable lookup.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("API_TOKEN") {
            self.api_token = Some(v);
        }
        if let Some(v) = get("TRANSPORT_MODE") {
            match v.parse() {
                Ok(mode) => self.transport = mode,
                Err(e) => warn!("Ignoring TRANSPORT_MODE: {e}"),
            }
        }
        if let Some(v) = get("MCP_HOST") {
            self.host = v;
        }
        if let Some(v) = get("MCP_PORT") {
            match v.trim().parse() {
                Ok(port) => self.port = port,
                Err(e) => warn!("Ignoring MCP_PORT={v}: {e}"),
            }
        }
        if let Some(v) = get("API_TIMEOUT") {
            match v.trim().parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(e) => warn!("Ignoring API_TIMEOUT={v}: {e}"),
            }
        }
        if let Some(v) = get("DEFAULT_DATASET") {
            self.default_dataset = v;
        }
        if let Some(v) = get("EMBEDDING_INSTRUCTION_MODE") {
            self.instructions.mode = v;
        }
        if let Some(v) = get("EMBEDDING_INSTRUCTION_DEFAULT") {
            self.instructions.default_type = Some(v);
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.api_url.starts_with("http://") || self.api_url.starts_with("https://"),
            "api_url must be an absolute http(s) URL, got '{}'",
            self.api_url
        );
        anyhow::ensure!(self.timeout_secs > 0, "timeout_secs must be positive");
        anyhow::ensure!(self.port > 0, "port must be positive");
        anyhow::ensure!(
            self.mcp_path.starts_with('/'),
            "mcp_path must start with '/'"
        );
        let under_health = self
            .mcp_path
            .strip_prefix(HEALTH_ROUTE)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        anyhow::ensure!(
            !under_health,
            "mcp_path '{}' overlaps the {HEALTH_ROUTE} route",
            self.mcp_path
        );
        anyhow::ensure!(
            !self.default_dataset.trim().is_empty(),
            "default_dataset must not be empty"
        );
        Ok(())
    }

    /// Upstream base URL without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.port, 8000);
        assert_eq!(config.mcp_path, "/mcp");
        assert_eq!(config.default_dataset, "main_dataset");
        assert_eq!(config.instructions.mode, "off");
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"api_url": "http://cognee:8000", "transport": "sse"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_url, "http://cognee:8000");
        assert_eq!(config.transport, TransportMode::Sse);
        // Other fields should have defaults
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config::load(&temp.path().join("absent.json")).unwrap();
        assert_eq!(config.api_url, default_api_url());
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"port": 9100, "api_token": "secret"}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.port, 9100);
        assert_eq!(loaded.api_token.as_deref(), Some("secret"));
        assert_eq!(loaded.mcp_path, "/mcp");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("API_URL", "http://api:8000"),
            ("TRANSPORT_MODE", "SSE"),
            ("MCP_PORT", "8001"),
            ("API_TIMEOUT", "120"),
            ("API_TOKEN", "tok"),
            ("EMBEDDING_INSTRUCTION_MODE", "on"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_url, "http://api:8000");
        assert_eq!(config.transport, TransportMode::Sse);
        assert_eq!(config.port, 8001);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.api_token.as_deref(), Some("tok"));
        assert_eq!(config.instructions.mode, "on");
    }

    #[test]
    fn test_env_bad_values_ignored() {
        let mut config = Config::default();
        config.apply_vars(|k| match k {
            "MCP_PORT" => Some("eighty".to_string()),
            "TRANSPORT_MODE" => Some("carrier-pigeon".to_string()),
            "API_URL" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 8000);
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.api_url, default_api_url());
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = Config::default();
        config.api_url = "localhost:8000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_relative_path() {
        let mut config = Config::default();
        config.mcp_path = "mcp".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_path_overlapping_health() {
        for path in ["/health", "/health/mcp"] {
            let mut config = Config::default();
            config.mcp_path = path.to_string();
            assert!(config.validate().is_err(), "{path} should be rejected");
        }

        let mut config = Config::default();
        config.mcp_path = "/healthz".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("http".parse::<TransportMode>().unwrap(), TransportMode::Http);
        assert_eq!(
            "streamable-http".parse::<TransportMode>().unwrap(),
            TransportMode::Http
        );
        assert_eq!(" Stdio ".parse::<TransportMode>().unwrap(), TransportMode::Stdio);
        assert!("ws".parse::<TransportMode>().is_err());
    }

    #[test]
    fn test_api_base_trims_slash() {
        let mut config = Config::default();
        config.api_url = "http://api:8000/".to_string();
        assert_eq!(config.api_base(), "http://api:8000");
    }
}
