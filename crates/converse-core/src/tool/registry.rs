use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use converse_harness::ToolSpec;
use serde_json::Value;

use crate::error::{ToolCallError, ToolError};

use super::suggestions;

/// Runs one tool. The returned text becomes the tool result shown to the model.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: Value) -> String;
}

/// Adapts an async closure to [`ToolExecutor`].
pub struct FnToolExecutor<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnToolExecutor<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = String> + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _fut: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<F, Fut> ToolExecutor for FnToolExecutor<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = String> + Send,
{
    async fn execute(&self, _name: &str, args: Value) -> String {
        (self.f)(args).await
    }
}

pub(crate) struct RegisteredTool {
    pub spec: ToolSpec,
    validator: jsonschema::Validator,
    pub executor: Arc<dyn ToolExecutor>,
}

impl RegisteredTool {
    /// Parses raw call arguments and validates them against the tool schema.
    /// An empty argument string is treated as `{}`.
    pub fn parse_arguments(&self, raw: &str) -> Result<Value, ToolCallError> {
        let args: Value = if raw.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| ToolCallError::InvalidArguments {
                tool: self.spec.name.clone(),
                message: e.to_string(),
            })?
        };
        let errors: Vec<String> = self
            .validator
            .iter_errors(&args)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(args)
        } else {
            Err(ToolCallError::ValidationFailed {
                tool: self.spec.name.clone(),
                message: errors.join("; "),
            })
        }
    }
}

/// Registry: tool name -> spec, compiled schema and executor.
///
/// Registration order is the order in which tools are advertised.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `user_prompt_suggestions` tool registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        suggestions::register_prompt_suggestions(&mut registry);
        registry
    }

    /// Registers a tool. The parameter schema is compiled here so invalid
    /// schemas fail at startup.
    pub fn register(
        &mut self,
        spec: ToolSpec,
        executor: Arc<dyn ToolExecutor>,
    ) -> Result<(), ToolError> {
        if self.by_name.contains_key(&spec.name) {
            return Err(ToolError::DuplicateTool { tool: spec.name });
        }
        let validator =
            jsonschema::validator_for(&spec.parameters).map_err(|e| ToolError::InvalidSchema {
                tool: spec.name.clone(),
                message: e.to_string(),
            })?;
        self.by_name.insert(spec.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            spec,
            validator,
            executor,
        });
        Ok(())
    }

    /// Registers an async closure as a tool.
    pub fn register_fn<F, Fut>(&mut self, spec: ToolSpec, f: F) -> Result<(), ToolError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.register(spec, Arc::new(FnToolExecutor::new(f)))
    }

    /// All registered specs in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.by_name.get(name).and_then(|idx| self.tools.get(*idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_spec() -> ToolSpec {
        ToolSpec::new(
            "add",
            "Adds two numbers",
            json!({
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }),
        )
        .source("AIAnalyst")
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(add_spec(), |_| async { "ok".to_string() })
            .expect("first");
        let err = registry
            .register_fn(add_spec(), |_| async { "ok".to_string() })
            .expect_err("duplicate");
        assert_eq!(err, ToolError::DuplicateTool { tool: "add".into() });
    }

    #[test]
    fn invalid_schema_fails_at_registration() {
        let mut registry = ToolRegistry::new();
        let spec = ToolSpec::new("bad", "bad schema", json!({"type": 12}));
        let err = registry
            .register_fn(spec, |_| async { String::new() })
            .expect_err("schema");
        assert!(matches!(err, ToolError::InvalidSchema { ref tool, .. } if tool == "bad"));
        assert!(registry.is_empty());
    }

    #[test]
    fn specs_keep_registration_order() {
        let registry = {
            let mut r = ToolRegistry::with_builtins();
            r.register_fn(add_spec(), |_| async { String::new() })
                .expect("add");
            r
        };
        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["user_prompt_suggestions", "add"]);
    }

    #[test]
    fn arguments_are_parsed_and_validated() {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(add_spec(), |_| async { String::new() })
            .expect("add");
        let tool = registry.get("add").expect("registered");
        assert_eq!(
            tool.parse_arguments("{\"a\":1,\"b\":2}").expect("valid"),
            json!({"a": 1, "b": 2})
        );
        assert!(matches!(
            tool.parse_arguments("{\"a\":1"),
            Err(ToolCallError::InvalidArguments { .. })
        ));
        assert!(matches!(
            tool.parse_arguments("{\"a\":\"one\",\"b\":2}"),
            Err(ToolCallError::ValidationFailed { .. })
        ));
        assert!(matches!(
            tool.parse_arguments(""),
            Err(ToolCallError::ValidationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn fn_executor_receives_arguments() {
        let executor = FnToolExecutor::new(|args: Value| async move {
            format!("{}", args["a"].as_i64().unwrap_or_default() * 2)
        });
        assert_eq!(executor.execute("double", json!({"a": 21})).await, "42");
    }
}
