//! Introspection client for the `--describe` contract and the `--help` fallback.

use crate::process::{run_bounded, ProcessError, ProcessSpec};
use smcp_core::{DescribeDocument, DescribeError, EntryPoint};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default limit for introspection calls
pub const DEFAULT_DESCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Asks plugins what they can do. Stateless; one instance serves a whole pass.
#[derive(Debug, Clone)]
pub struct DescribeClient {
    timeout: Duration,
}

impl Default for DescribeClient {
    fn default() -> Self {
        Self::new(DEFAULT_DESCRIBE_TIMEOUT)
    }
}

impl DescribeClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `<entry> --describe` and parse the structured document.
    #[instrument(skip(self, entry), fields(entry = %entry))]
    pub async fn describe(&self, entry: &EntryPoint) -> Result<DescribeDocument, DescribeError> {
        let stdout = self.introspect(entry, "--describe").await?;

        let value: serde_json::Value = serde_json::from_str(stdout.trim())?;
        if value.get("commands").is_none() {
            return Err(DescribeError::InvalidDocument(
                "missing \"commands\" array".to_string(),
            ));
        }

        let document: DescribeDocument = serde_json::from_value(value)
            .map_err(|e| DescribeError::InvalidDocument(e.to_string()))?;
        debug!(commands = document.commands.len(), "Parsed describe document");
        Ok(document)
    }

    /// Run `<entry> --help` and return its standard output.
    #[instrument(skip(self, entry), fields(entry = %entry))]
    pub async fn help(&self, entry: &EntryPoint) -> Result<String, DescribeError> {
        self.introspect(entry, "--help").await
    }

    async fn introspect(&self, entry: &EntryPoint, flag: &str) -> Result<String, DescribeError> {
        let process = ProcessSpec::for_entry_point(entry).arg(flag);
        let output = run_bounded(&process, self.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::TimedOut { after, .. } => DescribeError::Timeout(after),
                ProcessError::Spawn { source, .. } | ProcessError::Wait { source, .. } => {
                    DescribeError::Spawn(source)
                }
            })?;

        if !output.success() {
            return Err(DescribeError::NonZeroExit {
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}
