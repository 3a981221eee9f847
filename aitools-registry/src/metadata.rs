//! Tool metadata: inference from declarations and validation of supplied
//! JSON.

use aitools_primitives::{ParamDescriptor, ParamType, ToolName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::callable::Callable;
use crate::error::{ToolError, ToolResult};

const OBJECT_TYPE: &str = "object";
const UNNAMED: &str = "<unnamed>";
const SCHEMA_KEYS: [&str; 3] = ["type", "properties", "required"];

/// JSON-Schema-like description of a tool's input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    kind: String,
    properties: Map<String, Value>,
    required: Vec<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl InputSchema {
    /// Builds an object schema from parameter descriptors, keeping
    /// declaration order in `required`.
    #[must_use]
    pub fn from_params(params: &[ParamDescriptor]) -> Self {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in params {
            let mut property = Map::new();
            property.insert("type".into(), Value::from(param.ty().as_str()));
            properties.insert(param.name().to_owned(), Value::Object(property));
            if param.is_required() {
                required.push(param.name().to_owned());
            }
        }

        Self {
            kind: OBJECT_TYPE.to_owned(),
            properties,
            required,
            extra: Map::new(),
        }
    }

    /// Returns the schema `type` tag, `"object"` for inferred schemas.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the property map.
    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Returns the required parameter names in order.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Returns the declared type of a property, if it has one.
    #[must_use]
    pub fn property_type(&self, name: &str) -> Option<ParamType> {
        self.properties
            .get(name)?
            .get("type")?
            .as_str()
            .map(ParamType::from_schema_name)
    }

    /// Renders the schema as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert("type".into(), Value::from(self.kind.clone()));
        object.insert("properties".into(), Value::Object(self.properties.clone()));
        object.insert(
            "required".into(),
            Value::Array(self.required.iter().cloned().map(Value::from).collect()),
        );
        Value::Object(object)
    }
}

/// Name, description, and input schema advertised for a tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    name: ToolName,
    #[serde(default)]
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: InputSchema,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ToolMetadata {
    /// Infers metadata from a callable's declarations.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::MetadataInference`] when the callable has no
    /// usable name.
    pub fn infer(callable: &Callable) -> ToolResult<Self> {
        let raw = callable
            .name()
            .ok_or_else(|| ToolError::MetadataInference {
                reason: "unable to extract name from callable".into(),
            })?;
        let name = ToolName::new(raw).map_err(|err| ToolError::MetadataInference {
            reason: err.to_string(),
        })?;

        Ok(Self {
            name,
            description: callable.doc().unwrap_or_default().to_owned(),
            input_schema: InputSchema::from_params(callable.params()),
            extra: Map::new(),
        })
    }

    /// Validates caller-supplied metadata and keeps it verbatim.
    ///
    /// `fallback_name` is only used to label errors when the supplied object
    /// has no usable `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] naming the missing or malformed
    /// field and the intended tool name.
    pub fn from_value(value: Value, fallback_name: Option<&str>) -> ToolResult<Self> {
        let supplied_name = value
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty());
        let tool = supplied_name
            .or(fallback_name)
            .unwrap_or(UNNAMED)
            .to_owned();

        let Value::Object(object) = &value else {
            return Err(ToolError::invalid_metadata(
                tool,
                "metadata",
                "must be a JSON object",
            ));
        };

        if supplied_name.is_none() {
            return Err(ToolError::invalid_metadata(
                tool,
                "name",
                "is missing or empty",
            ));
        }

        match object.get("description") {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(ToolError::invalid_metadata(
                    tool,
                    "description",
                    "must be a string",
                ));
            }
            None => {
                return Err(ToolError::invalid_metadata(
                    tool,
                    "description",
                    "is missing",
                ));
            }
        }

        let Some(schema) = object.get("inputSchema") else {
            return Err(ToolError::invalid_metadata(
                tool,
                "inputSchema",
                "is missing",
            ));
        };
        validate_input_schema(&tool, schema)?;

        serde_json::from_value(value)
            .map_err(|err| ToolError::invalid_metadata(tool, "metadata", err.to_string()))
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the description, empty when none was given.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the input schema.
    #[must_use]
    pub fn input_schema(&self) -> &InputSchema {
        &self.input_schema
    }

    /// Renders the metadata as the wire-visible JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert("name".into(), Value::from(self.name.as_str()));
        object.insert("description".into(), Value::from(self.description.clone()));
        object.insert("inputSchema".into(), self.input_schema.to_value());
        Value::Object(object)
    }
}

fn validate_input_schema(tool: &str, schema: &Value) -> ToolResult<()> {
    let Value::Object(schema) = schema else {
        return Err(ToolError::invalid_metadata(
            tool,
            "inputSchema",
            "must be a JSON object",
        ));
    };

    for key in SCHEMA_KEYS {
        if !schema.contains_key(key) {
            return Err(ToolError::invalid_metadata(
                tool,
                format!("inputSchema.{key}"),
                "is missing",
            ));
        }
    }

    if !schema["type"].is_string() {
        return Err(ToolError::invalid_metadata(
            tool,
            "inputSchema.type",
            "must be a string",
        ));
    }
    if !schema["properties"].is_object() {
        return Err(ToolError::invalid_metadata(
            tool,
            "inputSchema.properties",
            "must be an object",
        ));
    }
    let required_ok = schema["required"]
        .as_array()
        .is_some_and(|names| names.iter().all(Value::is_string));
    if !required_ok {
        return Err(ToolError::invalid_metadata(
            tool,
            "inputSchema.required",
            "must be an array of strings",
        ));
    }

    Ok(())
}
