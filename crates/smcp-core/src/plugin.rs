//! Plugin data model
//!
//! Types describing what discovery learns about a plugin directory: where
//! its entry point lives, which commands it offers and which parameters
//! those commands accept. The same types double as the serde model of the
//! `--describe` document.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

lazy_static::lazy_static! {
    /// Plugin and command names end up in tool names and on command lines.
    static ref NAME_PATTERN: regex::Regex = regex::Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// Returns true when `name` is usable as a plugin or command identifier.
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

// ============================================
// Entry points
// ============================================

/// How an entry point is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// Run the entry point itself (it must be executable)
    Direct,
    /// Run the entry point through an interpreter, e.g. `python3 cli.py`
    Interpreter(String),
}

/// The program discovery found inside a plugin directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub path: PathBuf,
    pub launcher: Launcher,
}

impl EntryPoint {
    pub fn direct(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            launcher: Launcher::Direct,
        }
    }

    pub fn interpreted(interpreter: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            launcher: Launcher::Interpreter(interpreter.into()),
        }
    }

    /// Program to spawn and the leading arguments that precede the
    /// plugin's own arguments.
    pub fn program_and_args(&self) -> (String, Vec<String>) {
        let path = self.path.to_string_lossy().into_owned();
        match &self.launcher {
            Launcher::Direct => (path, Vec::new()),
            Launcher::Interpreter(interpreter) => (interpreter.clone(), vec![path]),
        }
    }

    /// Directory the plugin lives in; used as the working directory.
    pub fn plugin_dir(&self) -> Option<&Path> {
        self.path.parent()
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.launcher {
            Launcher::Direct => write!(f, "{}", self.path.display()),
            Launcher::Interpreter(i) => write!(f, "{} {}", i, self.path.display()),
        }
    }
}

// ============================================
// Parameter and command metadata
// ============================================

/// Parameter kinds understood by the schema converter
///
/// Anything else a plugin declares is kept verbatim in `Unknown` so the
/// converter can log it and fall back to a permissive schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParameterType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Unknown(String),
}

impl ParameterType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "string" => ParameterType::String,
            "number" => ParameterType::Number,
            "integer" => ParameterType::Integer,
            "boolean" => ParameterType::Boolean,
            "array" => ParameterType::Array,
            "object" => ParameterType::Object,
            _ => ParameterType::Unknown(raw.to_string()),
        }
    }

    /// JSON Schema `type` keyword, `None` for unrecognized kinds.
    pub fn json_type(&self) -> Option<&'static str> {
        match self {
            ParameterType::String => Some("string"),
            ParameterType::Number => Some("number"),
            ParameterType::Integer => Some("integer"),
            ParameterType::Boolean => Some("boolean"),
            ParameterType::Array => Some("array"),
            ParameterType::Object => Some("object"),
            ParameterType::Unknown(_) => None,
        }
    }
}

impl Serialize for ParameterType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParameterType::Unknown(raw) => serializer.serialize_str(raw),
            known => serializer.serialize_str(known.json_type().unwrap_or("string")),
        }
    }
}

/// Never fails: a non-string `type` (null, a number, a list) is kept as
/// `Unknown` so one sloppy parameter can't sink the whole document.
impl<'de> Deserialize<'de> for ParameterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => ParameterType::parse(&raw),
            other => ParameterType::Unknown(other.to_string()),
        })
    }
}

/// `null` reads as an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One parameter of a plugin command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type", default)]
    pub param_type: ParameterType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            default: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Optional behavior hints a plugin can attach to a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// One invokable plugin command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Empty when the describe document omitted it; discovery skips those.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub parameters: Vec<ParameterSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<CommandHints>,
}

impl CommandSpec {
    /// A command known only by name (help-text discovery).
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            annotations: None,
        }
    }
}

/// Plugin metadata block of the describe document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Output of `<plugin> --describe`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginInfo>,
    pub commands: Vec<CommandSpec>,
}

// ============================================
// Registry
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Structured `--describe` output, full parameter metadata
    Describe,
    /// `--help` scraping, command names only
    HelpText,
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryMethod::Describe => f.write_str("describe"),
            DiscoveryMethod::HelpText => f.write_str("help"),
        }
    }
}

/// Everything discovery learned about one plugin directory
#[derive(Debug, Clone, PartialEq)]
pub struct PluginRecord {
    pub name: String,
    pub entry_point: EntryPoint,
    pub info: Option<PluginInfo>,
    pub method: DiscoveryMethod,
    pub commands: BTreeMap<String, CommandSpec>,
}

impl PluginRecord {
    pub fn command(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }
}

/// The result of one discovery pass; replaced wholesale on rediscovery
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginRecord>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it replaced (if any).
    pub fn insert(&mut self, record: PluginRecord) -> Option<PluginRecord> {
        self.plugins.insert(record.name.clone(), record)
    }

    pub fn get(&self, name: &str) -> Option<&PluginRecord> {
        self.plugins.get(name)
    }

    pub fn plugins(&self) -> impl Iterator<Item = &PluginRecord> {
        self.plugins.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Total number of commands across all plugins.
    pub fn command_count(&self) -> usize {
        self.plugins.values().map(|p| p.commands.len()).sum()
    }
}
