use crate::protocol::models::{FunctionCall, FunctionDeclaration, JsonSchema as SchemaValue};
use futures::FutureExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::transport::BoxFuture;

type ToolHandler =
    Box<dyn Fn(Value) -> BoxFuture<'static, Result<ToolOutcome, ToolError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
    SlotUnavailable,
    NotFound,
}

impl ToolStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::SlotUnavailable => "slot_unavailable",
            Self::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one tool call: a status tag, a sentence the model can
/// read out, and any extra fields flattened next to them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutcome {
    pub status: ToolStatus,
    pub message: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ToolOutcome {
    #[must_use]
    pub fn new(status: ToolStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: Map::new(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Success, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Error, message)
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),
    #[error("invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },
    #[error("{name} failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: crate::Error,
    },
    #[error("{0} panicked")]
    Panicked(String),
}

#[derive(Clone, Debug)]
struct ToolDefinition {
    name: String,
    description: String,
    parameters: SchemaValue,
}

/// Closed set of named tools, each with typed arguments.
#[derive(Default)]
pub struct ToolRegistry {
    defs: Vec<ToolDefinition>,
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. The parameter schema is derived from `TArgs`.
    /// Registering the same name twice replaces the earlier handler.
    pub fn tool<TArgs, F, Fut>(&mut self, name: &str, description: impl Into<String>, handler: F)
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<ToolOutcome>> + Send + 'static,
    {
        let root = schemars::schema_for!(TArgs);
        let parameters = serde_json::to_value(&root.schema)
            .map_or_else(|_| object_schema(), |raw| gemini_schema(&raw));

        self.defs.retain(|def| def.name != name);
        self.defs.push(ToolDefinition {
            name: name.to_string(),
            description: description.into(),
            parameters,
        });

        let user_handler = Arc::new(handler);
        let tool_name = name.to_string();
        let handler = move |value: Value| -> BoxFuture<'static, Result<ToolOutcome, ToolError>> {
            let user_handler = Arc::clone(&user_handler);
            let name = tool_name.clone();
            Box::pin(async move {
                let args: TArgs = serde_json::from_value(value).map_err(|e| {
                    ToolError::InvalidArguments {
                        name: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                user_handler(args)
                    .await
                    .map_err(|source| ToolError::Failed { name, source })
            })
        };

        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    #[must_use]
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.defs
            .iter()
            .map(|def| FunctionDeclaration {
                name: def.name.clone(),
                description: Some(def.description.clone()),
                parameters: Some(def.parameters.clone()),
            })
            .collect()
    }

    /// Run the handler registered for `call.name`.
    ///
    /// # Errors
    /// Returns a `ToolError` if the tool is unknown, the arguments do not
    /// decode, or the handler fails or panics.
    pub async fn call(&self, call: &FunctionCall) -> Result<ToolOutcome, ToolError> {
        let handler = self
            .handlers
            .get(&call.name)
            .ok_or_else(|| ToolError::Unknown(call.name.clone()))?;
        let fut = handler(Value::Object(call.args.clone()));
        AssertUnwindSafe(fut)
            .catch_unwind()
            .await
            .map_err(|_| ToolError::Panicked(call.name.clone()))?
    }
}

fn object_schema() -> SchemaValue {
    serde_json::json!({ "type": "OBJECT" })
}

/// Rewrite a generated JSON schema into the dialect accepted for function
/// declarations: uppercase type names, `nullable` in place of `["T", "null"]`,
/// and only the keys the remote service understands.
#[must_use]
pub fn gemini_schema(schema: &Value) -> Value {
    let Value::Object(obj) = schema else {
        return object_schema();
    };

    let mut out = Map::new();
    for (key, value) in obj {
        match key.as_str() {
            "type" => match value {
                Value::String(ty) => {
                    out.insert("type".into(), Value::String(ty.to_uppercase()));
                }
                Value::Array(types) => {
                    let mut concrete = types.iter().filter_map(Value::as_str).filter(|t| *t != "null");
                    if let Some(ty) = concrete.next() {
                        out.insert("type".into(), Value::String(ty.to_uppercase()));
                    }
                    if types.iter().any(|t| t == "null") {
                        out.insert("nullable".into(), Value::Bool(true));
                    }
                }
                _ => {}
            },
            "properties" => {
                if let Value::Object(props) = value {
                    if !props.is_empty() {
                        let props = props
                            .iter()
                            .map(|(name, prop)| (name.clone(), gemini_schema(prop)))
                            .collect();
                        out.insert("properties".into(), Value::Object(props));
                    }
                }
            }
            "items" => {
                out.insert("items".into(), gemini_schema(value));
            }
            "required" => {
                if value.as_array().is_some_and(|r| !r.is_empty()) {
                    out.insert("required".into(), value.clone());
                }
            }
            "description" | "enum" | "nullable" => {
                out.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
    out
        .entry("type")
        .or_insert_with(|| Value::String("OBJECT".into()));
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct Lookup {
        /// Who to look up.
        name: String,
        #[serde(default)]
        note: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Empty {}

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            id: Some("c1".into()),
            name: name.into(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    async fn boom(_: Empty) -> crate::Result<ToolOutcome> {
        panic!("handler bug")
    }

    fn registry() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.tool("lookup", "Find someone.", |args: Lookup| async move {
            Ok(ToolOutcome::success(format!("found {}", args.name))
                .with("note", json!(args.note)))
        });
        tools.tool("fail", "Always fails.", |_: Empty| async move {
            Err::<ToolOutcome, _>(crate::Error::Tool("disk on fire".into()))
        });
        tools.tool("boom", "Panics.", boom);
        tools
    }

    #[test]
    fn schema_uses_remote_dialect() {
        let tools = registry();
        let decl = &tools.declarations()[0];
        let params = decl.parameters.as_ref().unwrap();

        assert_eq!(params["type"], "OBJECT");
        assert_eq!(params["properties"]["name"]["type"], "STRING");
        assert_eq!(params["properties"]["name"]["description"], "Who to look up.");
        assert_eq!(params["properties"]["note"]["type"], "STRING");
        assert_eq!(params["properties"]["note"]["nullable"], true);
        assert_eq!(params["required"], json!(["name"]));
        assert!(params.get("title").is_none());
    }

    #[test]
    fn empty_args_declare_bare_object() {
        let tools = registry();
        let fail = tools.declarations().into_iter().find(|d| d.name == "fail").unwrap();
        assert_eq!(fail.parameters, Some(json!({ "type": "OBJECT" })));
    }

    #[tokio::test]
    async fn registering_a_name_again_replaces_it() {
        let mut tools = registry();
        tools.tool("fail", "Recovered.", |_: Empty| async move {
            Ok(ToolOutcome::success("fine now"))
        });

        let names: Vec<_> = tools.declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["lookup", "boom", "fail"]);
        let outcome = tools.call(&call("fail", json!({}))).await.unwrap();
        assert_eq!(outcome.message, "fine now");
    }

    #[tokio::test]
    async fn call_runs_typed_handler() {
        let outcome = registry()
            .call(&call("lookup", json!({ "name": "Lee" })))
            .await
            .unwrap();
        assert_eq!(outcome.status, ToolStatus::Success);
        assert_eq!(outcome.message, "found Lee");
        assert_eq!(outcome.payload["note"], Value::Null);
    }

    #[tokio::test]
    async fn call_classifies_failures() {
        let tools = registry();

        let unknown = tools.call(&call("delete_hospital", json!({}))).await.unwrap_err();
        assert!(matches!(unknown, ToolError::Unknown(name) if name == "delete_hospital"));

        let invalid = tools.call(&call("lookup", json!({ "name": 7 }))).await.unwrap_err();
        assert!(matches!(invalid, ToolError::InvalidArguments { .. }));

        let failed = tools.call(&call("fail", json!({}))).await.unwrap_err();
        assert!(matches!(failed, ToolError::Failed { .. }));

        let panicked = tools.call(&call("boom", json!({}))).await.unwrap_err();
        assert!(matches!(panicked, ToolError::Panicked(name) if name == "boom"));
    }

    #[test]
    fn outcome_flattens_payload() {
        let outcome = ToolOutcome::new(ToolStatus::SlotUnavailable, "taken").with("slots", json!([]));
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "status": "slot_unavailable", "message": "taken", "slots": [] })
        );
    }
}
