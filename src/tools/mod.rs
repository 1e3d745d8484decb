// ABOUTME: Tool Registry & Dispatcher — name lookup, schema validation, normalized ToolResult.

pub mod ask_user;
pub mod echo;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::message::ToolResultStatus;

const MAX_RESULT_MESSAGE_CHARS: usize = 500;

/// A single decoded tool invocation, assembled by the LLM Facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallDescriptor {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Normalized outcome of dispatching one tool call. Never panics or
/// propagates a raw error to the model — failures become `Error` results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub status: ToolResultStatus,
    pub message: String,
    pub output: String,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>, output: impl Into<String>) -> Self {
        ToolResult { status: ToolResultStatus::Ok, message: message.into(), output: output.into() }.normalize()
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResult { status: ToolResultStatus::Error, message: message.into(), output: String::new() }.normalize()
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ToolResult { status: ToolResultStatus::Rejected, message: message.into(), output: String::new() }.normalize()
    }

    fn normalize(mut self) -> Self {
        if self.message.chars().count() > MAX_RESULT_MESSAGE_CHARS {
            let truncated: String = self.message.chars().take(MAX_RESULT_MESSAGE_CHARS - 1).collect();
            self.message = format!("{truncated}\u{2026}");
        }
        self
    }
}

/// Advertises a tool's calling contract to the LLM Facade.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameter_schema: Value,
}

/// A side-effecting capability exposed to the model. Implementors own any
/// approval gating their body needs (the registry does not impose it).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    async fn execute(&self, params: Value) -> anyhow::Result<ToolResult>;
}

/// Name → Tool table. Registration rejects duplicate names; dispatch
/// validates decoded arguments against the tool's schema before the body
/// ever runs (§9 Open Question (b)).
#[derive(Default)]
pub struct Registry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { order: Vec::new(), tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> anyhow::Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            anyhow::bail!("duplicate tool registration: {name}");
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .map(|name| {
                let tool = &self.tools[name];
                ToolSpec {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameter_schema: tool.schema(),
                }
            })
            .collect()
    }

    /// §4.3 dispatch pipeline: lookup, decode, schema-validate, execute.
    /// Every failure mode normalizes to a `ToolResult`; this never returns
    /// `Err` because an unknown tool or bad arguments are not driver faults.
    pub async fn dispatch(&self, call: ToolCallDescriptor) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult::error(format!("unknown tool: {}", call.name));
        };

        let params: Value = match serde_json::from_str(&call.arguments) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid arguments: {e}")),
        };

        let schema = tool.schema();
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                let detail = validator.iter_errors(&params).next().map(|e| e.to_string());
                if let Some(detail) = detail {
                    return ToolResult::error(format!("invalid arguments: {detail}"));
                }
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool schema failed to compile, skipping validation");
            }
        }

        match tool.execute(params).await {
            Ok(result) => result.normalize(),
            Err(e) => ToolResult::error(format!("tool execution error: {e}")),
        }
    }
}
