//! Object-safe tool trait and registry (spec §4.3, component C6).
//!
//! Grounded on `neuron-tool::{ToolDyn, ToolRegistry}` (near-verbatim
//! shape: `Arc<dyn ToolDyn>` keyed by name, `Pin<Box<dyn Future<..>>>`
//! return) and `neuron-tool::builtin::validate_input` for the
//! schema-validate-before-invoke convention, generalized from neuron's
//! "object, required fields, property types" checks to also cover the
//! enum constraint spec §4.3 allows on string parameters.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cortex_core::error::ToolError;

use crate::result::ToolResult;
use crate::schema::{ParamType, ToolSchema};

/// Object-safe tool implementation. Any tool source — a local function,
/// a subprocess, an HTTP call — implements this.
pub trait ToolDyn: Send + Sync {
    /// This tool's schema (name, description, parameters, category).
    fn schema(&self) -> &ToolSchema;

    /// Execute with already-validated arguments.
    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>>;
}

/// Name-keyed set of tools with uniform registration, lookup, and
/// validated dispatch (spec §4.3: "register/get/list/execute").
///
/// Immutable after startup (spec §5): build the full set, then share it
/// behind an `Arc` — no further mutation once the orchestrator starts.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Returns an error if a tool with the same name is
    /// already registered (spec §4.3: "duplicate registration is an error").
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) -> Result<(), ToolError> {
        let name = tool.schema().name.clone();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Other(
                format!("tool already registered: {name}").into(),
            ));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// List every registered tool's schema.
    pub fn list(&self) -> Vec<&ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Validate `args` against the named tool's schema, then execute it.
    /// Validation failure returns `{success=false, error="schema: ..."}`
    /// without invoking the tool (spec §4.3).
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::err(format!("tool not found: {name}"));
        };
        if let Err(reason) = validate_args(&args, tool.schema()) {
            return ToolResult::err(format!("schema: {reason}"));
        }
        tool.execute(args).await
    }
}

/// Lightweight structural validation: the input must be an object,
/// every required parameter present, and declared types must match.
fn validate_args(args: &serde_json::Value, schema: &ToolSchema) -> Result<(), String> {
    let obj = args
        .as_object()
        .ok_or_else(|| "expected object input".to_string())?;

    for param in &schema.parameters {
        let value = obj.get(&param.name);
        if param.required && value.is_none() {
            return Err(format!("missing required field: {}", param.name));
        }
        let Some(value) = value else { continue };
        if !type_matches(value, param.ty) {
            return Err(format!(
                "field '{}' expected type '{:?}', got {}",
                param.name,
                param.ty,
                type_name(value)
            ));
        }
        if let (ParamType::String, Some(allowed)) = (param.ty, &param.enum_values) {
            if let Some(s) = value.as_str() {
                if !allowed.iter().any(|v| v == s) {
                    return Err(format!(
                        "field '{}' must be one of {:?}, got '{s}'",
                        param.name, allowed
                    ));
                }
            }
        }
    }
    Ok(())
}

fn type_matches(value: &serde_json::Value, ty: ParamType) -> bool {
    match ty {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Array => value.is_array(),
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParameterSchema, Sensitivity};

    struct EchoTool {
        schema: ToolSchema,
    }

    impl ToolDyn for EchoTool {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }

        fn execute(
            &self,
            args: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
            Box::pin(async move { ToolResult::ok(args.to_string()) })
        }
    }

    fn echo_schema() -> ToolSchema {
        ToolSchema {
            name: "echo".into(),
            description: "echoes input".into(),
            parameters: vec![ParameterSchema::required(
                "text",
                ParamType::String,
                "text to echo",
            )],
            category: Sensitivity::Low,
        }
    }

    #[tokio::test]
    async fn registers_and_executes() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoTool {
                schema: echo_schema(),
            }))
            .unwrap();

        let result = registry
            .execute("echo", serde_json::json!({"text": "hi"}))
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn missing_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nope", serde_json::json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn schema_validation_blocks_missing_required_field() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoTool {
                schema: echo_schema(),
            }))
            .unwrap();
        let result = registry.execute("echo", serde_json::json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("schema:"));
    }

    #[tokio::test]
    async fn schema_validation_blocks_wrong_type() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoTool {
                schema: echo_schema(),
            }))
            .unwrap();
        let result = registry
            .execute("echo", serde_json::json!({"text": 5}))
            .await;
        assert!(!result.success);
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoTool {
                schema: echo_schema(),
            }))
            .unwrap();
        let err = registry.register(Arc::new(EchoTool {
            schema: echo_schema(),
        }));
        assert!(err.is_err());
    }

    #[test]
    fn list_reports_every_tool() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoTool {
                schema: echo_schema(),
            }))
            .unwrap();
        assert_eq!(registry.list().len(), 1);
    }
}
