//! Plugin discovery
//!
//! Scans the plugin root, picks an entry point per subdirectory and asks
//! each plugin for its commands, preferring `--describe` and falling back
//! to scraping `--help`. Plugins are introspected concurrently.

use crate::describe::{DescribeClient, DEFAULT_DESCRIBE_TIMEOUT};
use crate::help::parse_commands_from_help;
use futures::future::join_all;
use smcp_core::{
    is_valid_name, CommandSpec, DescribeDocument, DiscoveryError, DiscoveryMethod, EntryPoint,
    PluginRecord, PluginRegistry,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Interpreter used for `cli.py` entry points
    pub python: String,

    /// Interpreter used for `cli.sh` entry points
    pub shell: String,

    /// Limit for each `--describe` / `--help` call
    pub describe_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            shell: "sh".to_string(),
            describe_timeout: DEFAULT_DESCRIBE_TIMEOUT,
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_describe_timeout(mut self, timeout: Duration) -> Self {
        self.describe_timeout = timeout;
        self
    }
}

/// Builds a fresh [`PluginRegistry`] from a plugin root directory
#[derive(Debug, Clone)]
pub struct PluginDiscoverer {
    config: DiscoveryConfig,
    client: DescribeClient,
}

impl Default for PluginDiscoverer {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

impl PluginDiscoverer {
    pub fn new(config: DiscoveryConfig) -> Self {
        let client = DescribeClient::new(config.describe_timeout);
        Self { config, client }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Run a full discovery pass.
    ///
    /// Fails only when `root` itself can't be listed; individual plugins that
    /// can't be introspected are logged and left out.
    #[instrument(skip(self, root), fields(root = %root.display()))]
    pub async fn discover(&self, root: &Path) -> Result<PluginRegistry, DiscoveryError> {
        let unreadable = |source| DiscoveryError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        };

        let mut entries = tokio::fs::read_dir(root).await.map_err(unreadable)?;
        let mut candidates = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let path = entry.path();
            // metadata() follows symlinks, so linked plugin dirs count
            let is_dir = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_valid_name(&name) {
                debug!(dir = %path.display(), "Skipping directory with unusable plugin name");
                continue;
            }

            match self.find_entry_point(&path).await {
                Some(entry_point) => candidates.push((name, entry_point)),
                None => debug!(plugin = %name, "No entry point found, skipping"),
            }
        }

        let results = join_all(
            candidates
                .into_iter()
                .map(|(name, entry_point)| self.introspect(name, entry_point)),
        )
        .await;

        let mut registry = PluginRegistry::new();
        for result in results {
            match result {
                Ok(record) => {
                    registry.insert(record);
                }
                Err(e) => warn!(error = %e, "Plugin left out of registry"),
            }
        }

        info!(
            plugins = registry.len(),
            commands = registry.command_count(),
            "Plugin discovery complete"
        );
        Ok(registry)
    }

    /// First recognized entry point in `dir`: `cli.py`, then `cli.sh`, then `cli`.
    pub async fn find_entry_point(&self, dir: &Path) -> Option<EntryPoint> {
        let candidates: [(&str, Option<&str>); 3] = [
            ("cli.py", Some(self.config.python.as_str())),
            ("cli.sh", Some(self.config.shell.as_str())),
            ("cli", None),
        ];

        for (file, interpreter) in candidates {
            let path: PathBuf = dir.join(file);
            let is_file = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            return Some(match interpreter {
                Some(interpreter) => EntryPoint::interpreted(interpreter, path),
                None => EntryPoint::direct(path),
            });
        }
        None
    }

    async fn introspect(
        &self,
        name: String,
        entry_point: EntryPoint,
    ) -> Result<PluginRecord, DiscoveryError> {
        match self.client.describe(&entry_point).await {
            Ok(document) => Ok(record_from_document(name, entry_point, document)),
            Err(describe_err) => {
                if describe_err.is_unsupported() {
                    debug!(plugin = %name, error = %describe_err, "Describe not supported, falling back to help");
                } else {
                    warn!(plugin = %name, error = %describe_err, "Describe failed, falling back to help");
                }
                self.introspect_help(name, entry_point, describe_err.to_string())
                    .await
            }
        }
    }

    async fn introspect_help(
        &self,
        name: String,
        entry_point: EntryPoint,
        describe_failure: String,
    ) -> Result<PluginRecord, DiscoveryError> {
        let help_text = self.client.help(&entry_point).await.map_err(|e| {
            DiscoveryError::PluginSkipped {
                plugin: name.clone(),
                reason: format!("describe failed ({}); help failed ({})", describe_failure, e),
            }
        })?;

        let commands: BTreeMap<String, CommandSpec> = parse_commands_from_help(&help_text)
            .into_iter()
            .filter(|c| {
                let valid = is_valid_name(c);
                if !valid {
                    warn!(plugin = %name, command = %c, "Skipping command with invalid name");
                }
                valid
            })
            .map(|c| (c.clone(), CommandSpec::bare(c)))
            .collect();

        if commands.is_empty() {
            return Err(DiscoveryError::PluginSkipped {
                plugin: name,
                reason: "help output lists no commands".to_string(),
            });
        }

        info!(plugin = %name, method = %DiscoveryMethod::HelpText, commands = commands.len(), "Discovered plugin");
        Ok(PluginRecord {
            name,
            entry_point,
            info: None,
            method: DiscoveryMethod::HelpText,
            commands,
        })
    }
}

fn record_from_document(
    name: String,
    entry_point: EntryPoint,
    document: DescribeDocument,
) -> PluginRecord {
    let mut commands = BTreeMap::new();
    for command in document.commands {
        if command.name.is_empty() {
            warn!(plugin = %name, "Skipping described command without a name");
            continue;
        }
        if !is_valid_name(&command.name) {
            warn!(plugin = %name, command = %command.name, "Skipping command with invalid name");
            continue;
        }
        if let Some(previous) = commands.insert(command.name.clone(), command) {
            warn!(plugin = %name, command = %previous.name, "Command described twice, keeping the last one");
        }
    }

    info!(plugin = %name, method = %DiscoveryMethod::Describe, commands = commands.len(), "Discovered plugin");
    PluginRecord {
        name,
        entry_point,
        info: document.plugin,
        method: DiscoveryMethod::Describe,
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smcp_core::Launcher;

    #[tokio::test]
    async fn test_entry_point_priority() {
        let dir = tempfile::tempdir().unwrap();
        let discoverer = PluginDiscoverer::new(DiscoveryConfig::new().with_python("python3.12"));

        assert!(discoverer.find_entry_point(dir.path()).await.is_none());

        std::fs::write(dir.path().join("cli"), "").unwrap();
        let entry = discoverer.find_entry_point(dir.path()).await.unwrap();
        assert_eq!(entry.launcher, Launcher::Direct);

        std::fs::write(dir.path().join("cli.sh"), "").unwrap();
        let entry = discoverer.find_entry_point(dir.path()).await.unwrap();
        assert_eq!(entry.launcher, Launcher::Interpreter("sh".into()));

        std::fs::write(dir.path().join("cli.py"), "").unwrap();
        let entry = discoverer.find_entry_point(dir.path()).await.unwrap();
        assert_eq!(entry.launcher, Launcher::Interpreter("python3.12".into()));
        assert_eq!(entry.path, dir.path().join("cli.py"));
    }

    #[test]
    fn test_record_from_document_skips_bad_commands() {
        let document: DescribeDocument = serde_json::from_value(serde_json::json!({
            "commands": [
                {"name": "ok"},
                {"description": "nameless"},
                {"name": "bad name"},
                {"name": "ok", "description": "second"}
            ]
        }))
        .unwrap();

        let record = record_from_document(
            "demo".into(),
            EntryPoint::direct("/p/demo/cli"),
            document,
        );
        assert_eq!(record.method, DiscoveryMethod::Describe);
        assert_eq!(record.commands.len(), 1);
        assert_eq!(
            record.command("ok").unwrap().description.as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = PluginDiscoverer::default()
            .discover(&missing)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::RootUnreadable { .. }));
    }
}
