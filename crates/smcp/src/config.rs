//! Command-line and environment configuration.
//!
//! Every option can also be set through an `MCP_*` environment variable;
//! a `.env` file in the working directory is loaded before parsing.

use anyhow::{Context, Result};
use crate::logging::{FileLog, LogOptions, LogRotation};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use smcp_runtime::{DiscoveryConfig, ExecutorConfig, HostConfig};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

/// How MCP clients connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// HTTP with Server-Sent Events
    Sse,
    /// Newline-delimited JSON over stdin/stdout
    Stdio,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "smcp", version)]
#[command(about = "MCP server that exposes command-line plugins as tools")]
pub struct Cli {
    /// Transport to serve MCP over
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value_t = Transport::Sse)]
    pub transport: Transport,

    /// Host to bind the SSE server to
    #[arg(long, env = "MCP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the SSE server to
    #[arg(short, long, env = "MCP_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Listen on all interfaces instead of --host
    #[arg(long)]
    pub allow_external: bool,

    /// Directory containing one subdirectory per plugin
    #[arg(long, env = "MCP_PLUGINS_DIR", default_value = "plugins")]
    pub plugins_dir: PathBuf,

    /// Interpreter for cli.py entry points
    #[arg(long, env = "MCP_PYTHON", default_value = "python3")]
    pub python: String,

    /// Seconds a plugin may take to answer --describe or --help
    #[arg(long, default_value_t = 10)]
    pub describe_timeout_secs: u64,

    /// Seconds a tool call may run before the plugin is killed
    #[arg(long, env = "MCP_EXEC_TIMEOUT", default_value_t = 300)]
    pub exec_timeout_secs: u64,

    /// Log filter, e.g. `debug` or `smcp_runtime=trace` (falls back to RUST_LOG)
    #[arg(long, env = "MCP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit log lines as JSON objects
    #[arg(long, env = "MCP_LOG_JSON", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub log_json: bool,

    /// Also write logs to this file
    #[arg(long, env = "MCP_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// When to start a new log file
    #[arg(long, env = "MCP_LOG_ROTATION", value_enum, default_value_t = LogRotation::Daily)]
    pub log_rotation: LogRotation,

    /// Rotated log files to keep
    #[arg(long, env = "MCP_LOG_BACKUP_COUNT", default_value_t = 5)]
    pub log_backup_count: usize,

    /// Ignore --log-file and log to stderr only
    #[arg(long, env = "MCP_DISABLE_FILE_LOG", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub disable_file_log: bool,
}

impl Cli {
    /// Address for the SSE listener.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let host = if self.allow_external {
            "0.0.0.0"
        } else {
            self.host.as_str()
        };
        (host, self.port)
            .to_socket_addrs()
            .with_context(|| format!("invalid bind address {}:{}", host, self.port))?
            .next()
            .with_context(|| format!("{}:{} did not resolve to an address", host, self.port))
    }

    pub fn host_config(&self) -> HostConfig {
        HostConfig::new(&self.plugins_dir)
            .with_discovery(
                DiscoveryConfig::new()
                    .with_python(&self.python)
                    .with_describe_timeout(Duration::from_secs(self.describe_timeout_secs)),
            )
            .with_executor(
                ExecutorConfig::new().with_timeout(Duration::from_secs(self.exec_timeout_secs)),
            )
    }

    /// Level used when neither --log-level nor RUST_LOG is set.
    ///
    /// Stdio clients often surface stderr to users, so it stays quieter.
    pub fn default_log_level(&self) -> &'static str {
        match self.transport {
            Transport::Sse => "info",
            Transport::Stdio => "warn",
        }
    }

    pub fn log_options(&self) -> LogOptions {
        let file = match &self.log_file {
            Some(path) if !self.disable_file_log => Some(FileLog {
                path: path.clone(),
                rotation: self.log_rotation,
                max_files: self.log_backup_count,
            }),
            _ => None,
        };
        LogOptions {
            level: self.log_level.clone(),
            default_level: self.default_log_level(),
            json: self.log_json,
            file,
        }
    }
}
