//! Tool schema types (spec §4.3): parameter shapes and sensitivity
//! classification used by the registry and, later, the approval gate.

use serde::{Deserialize, Serialize};

/// JSON-Schema-ish parameter type enumerated by spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// A UTF-8 string.
    String,
    /// A number (integer or float).
    Number,
    /// A boolean.
    Boolean,
    /// An array of values.
    Array,
}

/// Description of one tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Whether the caller must supply this parameter.
    pub required: bool,
    /// Human-readable description.
    pub description: String,
    /// Optional enumeration of allowed string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterSchema {
    /// Build a required parameter with no enum constraint.
    pub fn required(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: description.into(),
            enum_values: None,
        }
    }

    /// Build an optional parameter with no enum constraint.
    pub fn optional(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            description: description.into(),
            enum_values: None,
        }
    }

    /// Attach an enum constraint.
    pub fn with_enum(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// How sensitive an operation is, driving the Approval Gate (spec §4.3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    /// Safe to run without confirmation in any mode.
    Low,
    /// Confirmation required outside permissive modes.
    Medium,
    /// Confirmation required except in the most permissive mode.
    High,
}

/// The full schema of a tool: name, description, parameters, category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool name.
    pub name: String,
    /// Human-readable purpose.
    pub description: String,
    /// Declared parameters.
    pub parameters: Vec<ParameterSchema>,
    /// Default sensitivity classification (spec §4.3 table); the
    /// Approval Gate's configuration override lives in `cortex-exec`.
    pub category: Sensitivity,
}

impl ToolSchema {
    /// Render this schema as a JSON Schema object, the shape a planner
    /// prompt or provider tool-use request expects.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = serde_json::json!({
                "type": match param.ty {
                    ParamType::String => "string",
                    ParamType::Number => "number",
                    ParamType::Boolean => "boolean",
                    ParamType::Array => "array",
                },
                "description": param.description,
            });
            if let Some(values) = &param.enum_values {
                prop["enum"] = serde_json::json!(values);
            }
            properties.insert(param.name.clone(), prop);
            if param.required {
                required.push(param.name.clone());
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
