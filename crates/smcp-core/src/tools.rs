//! Tool descriptors
//!
//! A tool is the flattened, externally visible view of one plugin command.

use crate::plugin::{CommandHints, CommandSpec};
use crate::schema::{to_json_schema, ToolParameterSchema};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Separator between plugin and command in a qualified tool name
pub const QUALIFIED_NAME_SEPARATOR: char = '.';

/// Build the globally unique tool name for a plugin command.
pub fn qualified_name(plugin: &str, command: &str) -> String {
    format!("{}{}{}", plugin, QUALIFIED_NAME_SEPARATOR, command)
}

/// MCP tool annotations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub read_only_hint: bool,
    pub destructive_hint: bool,
    pub idempotent_hint: bool,
    pub open_world_hint: bool,
}

impl Default for ToolAnnotations {
    /// Assumes the worst about a plugin command that declared nothing.
    fn default() -> Self {
        Self {
            title: None,
            read_only_hint: false,
            destructive_hint: true,
            idempotent_hint: false,
            open_world_hint: true,
        }
    }
}

impl ToolAnnotations {
    /// Annotations for a side-effect free, local tool.
    pub fn read_only(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            read_only_hint: true,
            destructive_hint: false,
            idempotent_hint: true,
            open_world_hint: false,
        }
    }

    /// Start from the conservative defaults and apply whatever the plugin declared.
    ///
    /// A read-only command can't be destructive, so `readOnlyHint: true`
    /// without an explicit `destructiveHint` clears the destructive default.
    pub fn from_hints(default_title: String, hints: Option<&CommandHints>) -> Self {
        let mut annotations = Self {
            title: Some(default_title),
            ..Self::default()
        };
        let Some(hints) = hints else {
            return annotations;
        };

        if let Some(title) = hints.title.as_ref().filter(|t| !t.is_empty()) {
            annotations.title = Some(title.clone());
        }
        if let Some(read_only) = hints.read_only_hint {
            annotations.read_only_hint = read_only;
            if read_only && hints.destructive_hint.is_none() {
                annotations.destructive_hint = false;
            }
        }
        if let Some(destructive) = hints.destructive_hint {
            annotations.destructive_hint = destructive;
        }
        if let Some(idempotent) = hints.idempotent_hint {
            annotations.idempotent_hint = idempotent;
        }
        if let Some(open_world) = hints.open_world_hint {
            annotations.open_world_hint = open_world;
        }
        annotations
    }
}

/// Title shown to users, e.g. `devops` + `send-message` -> `Devops Send Message`.
pub fn default_title(plugin: &str, command: &str) -> String {
    plugin
        .split(['-', '_'])
        .chain(command.split(['-', '_']))
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Externally visible description of one registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub qualified_name: String,
    pub description: String,
    pub input_schema: ToolParameterSchema,
    pub annotations: ToolAnnotations,
}

impl ToolDescriptor {
    pub fn new(
        qualified_name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ToolParameterSchema,
        annotations: ToolAnnotations,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            description: description.into(),
            input_schema,
            annotations,
        }
    }

    /// Descriptor for a discovered plugin command.
    pub fn for_command(plugin: &str, command: &CommandSpec) -> Self {
        let description = command
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Execute {} {} command", plugin, command.name));

        Self {
            qualified_name: qualified_name(plugin, &command.name),
            description,
            input_schema: to_json_schema(&command.parameters),
            annotations: ToolAnnotations::from_hints(
                default_title(plugin, &command.name),
                command.annotations.as_ref(),
            ),
        }
    }
}

/// Successful result of a tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Text content returned to the client
    pub text: String,
    /// Wall-clock time spent producing it
    pub duration: Duration,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            text: text.into(),
            duration,
        }
    }
}
