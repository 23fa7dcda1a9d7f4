//! Error types
//!
//! Discovery and execution failures are contained per plugin and per call;
//! only [`DiscoveryError::RootUnreadable`] is meant to reach the caller of a
//! discovery pass.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a plugin's `--describe` invocation could not be used
#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("failed to spawn plugin: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("plugin did not answer within {0:?}")]
    Timeout(Duration),

    #[error("plugin exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("plugin returned invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("plugin returned an invalid document: {0}")]
    InvalidDocument(String),
}

impl DescribeError {
    /// A plain non-zero exit usually just means the flag isn't supported.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, DescribeError::NonZeroExit { .. })
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The plugin root itself can't be listed; the whole pass fails.
    #[error("cannot read plugin directory {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One plugin yielded nothing usable; it is left out of the registry.
    #[error("plugin {plugin} skipped: {reason}")]
    PluginSkipped { plugin: String, reason: String },
}

/// Failure of a single plugin command execution
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin command timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("{}", failure_message(.exit_code, .stderr, .stdout))]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
        stdout: String,
    },
}

impl ExecutionError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Standard error of a command that ran to completion
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecutionError::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout { .. })
    }
}

/// Pick the most useful diagnostic from a failed run: stderr first, then an
/// `"error"` field in JSON stdout, then raw stdout.
fn failure_message(exit_code: &Option<i32>, stderr: &str, stdout: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }

    let stdout = stdout.trim();
    if !stdout.is_empty() {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(stdout) {
            match map.get("error") {
                Some(serde_json::Value::String(msg)) => return msg.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
        return stdout.to_string();
    }

    match *exit_code {
        Some(code) => format!("plugin exited with code {} (no output)", code),
        None => "plugin was terminated by a signal (no output)".to_string(),
    }
}

/// Failure of a call routed through the tool table
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
