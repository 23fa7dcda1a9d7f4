//! Tool execution
//!
//! Turns a tool call into a plugin command line, runs it under the
//! execution timeout and classifies the outcome.

use crate::process::{run_bounded, ProcessError, ProcessSpec};
use serde_json::{Map, Value};
use smcp_core::{EntryPoint, ExecutionError};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default limit for a single tool call
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(300);

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Output of a command that exited with status zero
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    /// Trimmed standard output
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

/// Convert tool arguments to command-line flags, in argument order.
///
/// | value            | flags               |
/// |------------------|---------------------|
/// | string / number  | `--key value`       |
/// | `true`           | `--key`             |
/// | `false` / `null` | omitted             |
/// | array / object   | `--key <json>`      |
pub fn marshal_arguments(arguments: &Map<String, Value>) -> Vec<String> {
    let mut flags = Vec::with_capacity(arguments.len() * 2);

    for (key, value) in arguments {
        let flag = format!("--{}", key);
        match value {
            Value::Null | Value::Bool(false) => {}
            Value::Bool(true) => flags.push(flag),
            Value::String(s) => {
                flags.push(flag);
                flags.push(s.clone());
            }
            Value::Number(n) => {
                flags.push(flag);
                flags.push(n.to_string());
            }
            Value::Array(_) | Value::Object(_) => {
                flags.push(flag);
                flags.push(value.to_string());
            }
        }
    }

    flags
}

/// Runs plugin commands. Cheap to clone; executions never block each other.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    config: ExecutorConfig,
}

impl ToolExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Run `<entry> <command> <flags...>` and wait for it, up to the timeout.
    ///
    /// Dropping the returned future kills the plugin process.
    #[instrument(skip(self, entry, arguments), fields(entry = %entry))]
    pub async fn execute(
        &self,
        entry: &EntryPoint,
        command: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let process = ProcessSpec::for_entry_point(entry)
            .arg(command)
            .args(marshal_arguments(arguments));
        debug!(command_line = %process.command_line(), "Executing plugin command");

        let output = run_bounded(&process, self.config.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Spawn { program, source } | ProcessError::Wait { program, source } => {
                    ExecutionError::Spawn { program, source }
                }
                ProcessError::TimedOut { after, .. } => {
                    warn!(?after, "Plugin command timed out and was killed");
                    ExecutionError::Timeout { after }
                }
            })?;

        if !output.success() {
            debug!(exit_code = ?output.exit_code, "Plugin command failed");
            return Err(ExecutionError::Failed {
                exit_code: output.exit_code,
                stderr: output.stderr,
                stdout: output.stdout,
            });
        }

        debug!(duration_ms = output.duration.as_millis() as u64, "Plugin command succeeded");
        Ok(ExecutionOutput {
            stdout: output.stdout.trim().to_string(),
            stderr: output.stderr,
            exit_code: 0,
            duration: output.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_marshal_booleans_and_strings() {
        let flags = marshal_arguments(&args(json!({"name": "x", "force": true, "dry_run": false})));
        assert_eq!(flags, vec!["--name", "x", "--force"]);
    }

    #[test]
    fn test_marshal_numbers_null_and_structures() {
        let flags = marshal_arguments(&args(json!({
            "replicas": 3,
            "ratio": 0.5,
            "skip": null,
            "tags": ["a", "b"],
            "meta": {"k": 1}
        })));
        assert_eq!(
            flags,
            vec![
                "--replicas",
                "3",
                "--ratio",
                "0.5",
                "--tags",
                r#"["a","b"]"#,
                "--meta",
                r#"{"k":1}"#
            ]
        );
    }

    #[test]
    fn test_marshal_keeps_keys_literally() {
        let flags = marshal_arguments(&args(json!({"app_name": "web", "dry-run": true})));
        assert_eq!(flags, vec!["--app_name", "web", "--dry-run"]);
    }

    #[test]
    fn test_marshal_empty() {
        assert!(marshal_arguments(&Map::new()).is_empty());
    }
}
