//! JSON Schema generation for plugin commands
//!
//! Every tool's input schema is produced here from discovered parameter
//! metadata. Commands without metadata get the empty object schema.

use crate::plugin::{ParameterSpec, ParameterType};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

/// JSON Schema fragment for a tool's input or one of its properties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    /// JSON Schema type; `None` means any value is accepted
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,

    /// Required property names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ToolParameterSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameterSchema {
    /// Schema with a type constraint and nothing else
    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    /// Object schema with no properties: the fallback input schema
    pub fn empty_object() -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: Some(Properties::new()),
            required: Some(Vec::new()),
            ..Default::default()
        }
    }

    /// Serialize into a plain JSON value for the wire.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    pub fn property(&self, name: &str) -> Option<&ToolParameterSchema> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }

    pub fn required_names(&self) -> &[String] {
        self.required.as_deref().unwrap_or(&[])
    }
}

/// Object properties in declaration order, serialized as a JSON object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties(Vec<(String, ToolParameterSchema)>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property. Redefining a name replaces it in its original position.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        schema: ToolParameterSchema,
    ) -> Option<ToolParameterSchema> {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, schema)),
            None => {
                self.0.push((name, schema));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolParameterSchema> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, schema)| schema)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, schema) in &self.0 {
            map.serialize_entry(name, schema)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json's map keeps document order (`preserve_order`)
        let raw = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(name, value)| {
                serde_json::from_value(value)
                    .map(|schema| (name, schema))
                    .map_err(D::Error::custom)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Properties)
    }
}

/// Convert a command's parameter list into its tool input schema.
pub fn to_json_schema(parameters: &[ParameterSpec]) -> ToolParameterSchema {
    let mut schema = ToolParameterSchema::empty_object();
    let mut properties = Properties::new();
    let mut required: Vec<String> = Vec::new();

    for param in parameters {
        properties.insert(param.name.clone(), property_schema(param));
        if param.required && !required.contains(&param.name) {
            required.push(param.name.clone());
        }
    }

    schema.properties = Some(properties);
    schema.required = Some(required);
    schema
}

fn property_schema(param: &ParameterSpec) -> ToolParameterSchema {
    let mut prop = match param.param_type.json_type() {
        Some(json_type) => ToolParameterSchema::typed(json_type),
        None => {
            if let ParameterType::Unknown(raw) = &param.param_type {
                warn!(
                    parameter = %param.name,
                    declared_type = %raw,
                    "Unrecognized parameter type, accepting any value"
                );
            }
            ToolParameterSchema::default()
        }
    };

    prop.description = param.description.clone().filter(|d| !d.is_empty());
    prop.default = param.default.clone().filter(|d| !d.is_null());

    if param.param_type == ParameterType::Array {
        prop.items = Some(Box::new(ToolParameterSchema::typed("string")));
    }

    prop
}
