//! # SMCP
//!
//! An MCP server that exposes command-line plugins as tools.
//!
//! Each subdirectory of the plugin directory holding a `cli.py`, `cli.sh` or
//! `cli` entry point is a plugin. Its commands are discovered through the
//! `--describe` JSON contract, or by scraping `--help` output when the plugin
//! doesn't implement it, and every command becomes a tool named
//! `plugin.command`.
//!
//! ```rust,no_run
//! use smcp::mcp::{McpServer, StdioTransport};
//! use smcp::runtime::{HostConfig, PluginHost};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let host = Arc::new(PluginHost::new(HostConfig::new("plugins")));
//!     host.reload().await?;
//!
//!     StdioTransport::new(Arc::new(McpServer::new(host))).run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;

pub use smcp_core as core;
pub use smcp_mcp as mcp;
pub use smcp_runtime as runtime;

pub use config::{Cli, Transport};
pub use smcp_mcp::McpServer;
pub use smcp_runtime::{HostConfig, PluginHost};
