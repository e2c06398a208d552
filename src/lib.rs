//! # kgbridge: Knowledge-Graph MCP Bridge
//!
//! MCP server that lets AI assistants use a knowledge-graph memory service
//! through its HTTP API ("API mode"). Tool calls are forwarded upstream;
//! nothing is stored locally.
//!
//! ## Architecture
//!
//! - **[`config`]**: Configuration loading (JSON file, environment, CLI) and validation
//! - **[`backend`]**: `MemoryBackend` trait, REST client, and in-memory mock
//! - **[`search`]**: Search modes and result rendering
//! - **[`instruction`]**: Instruction-aware query/passage prefixes
//! - **[`mcp`]**: MCP server with 9 tool handlers (stdio or streamable HTTP via rmcp)

pub mod backend;
pub mod config;
pub mod instruction;
pub mod mcp;
pub mod search;
