// ABOUTME: AskUser tool — lets the model ask a free-text question of whoever is driving the run.
// ABOUTME: A reference Tool body; the question/answer exchange itself is the host's concern.

use async_trait::async_trait;

use super::{Tool, ToolResult};

pub const ASK_USER_TOOL_NAME: &str = "ask_user";

/// Reference implementation of a side-effect-free tool: asks a question
/// and reports back whatever the caller supplied as its answer.
pub struct AskUserTool;

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        ASK_USER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Ask the user a question and get their free-text response. Use when you need clarification or input from the user."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> anyhow::Result<ToolResult> {
        let question = params["question"].as_str().unwrap_or_default();
        Ok(ToolResult::ok("", format!("[no interactive host attached; question was: {question}]")))
    }
}
