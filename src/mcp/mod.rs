//! MCP surface: tool handlers and transports.
pub mod server;
pub mod tools;
