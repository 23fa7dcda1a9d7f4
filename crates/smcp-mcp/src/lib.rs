//! Model Context Protocol (MCP) server for the SMCP plugin bridge
//!
//! Exposes the tools of a [`smcp_runtime::PluginHost`] to MCP clients.
//!
//! # Example
//!
//! ```rust,ignore
//! use smcp_mcp::{McpServer, StdioTransport};
//! use smcp_runtime::{HostConfig, PluginHost};
//! use std::sync::Arc;
//!
//! let host = Arc::new(PluginHost::new(HostConfig::new("plugins")));
//! host.reload().await?;
//!
//! let server = Arc::new(McpServer::new(host));
//! StdioTransport::new(server).run().await?;
//! ```
//!
//! # Features
//!
//! - `stdio` (default): newline-delimited JSON over stdin/stdout
//! - `sse` (default): HTTP + Server-Sent Events via axum

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{
    error_codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpError, McpResult, RequestId,
    MCP_PROTOCOL_VERSION,
};
pub use server::McpServer;
pub use transport::InFlight;

#[cfg(feature = "sse")]
pub use transport::{SseConfig, SseTransport};
#[cfg(feature = "stdio")]
pub use transport::StdioTransport;
