// ABOUTME: EchoTool — trivial reference tool used to exercise the Registry and Loop Driver in tests.

use async_trait::async_trait;

use super::{Tool, ToolResult};

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return its input text unchanged. Useful for exercising the dispatch pipeline."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> anyhow::Result<ToolResult> {
        let text = params["text"].as_str().unwrap_or_default();
        Ok(ToolResult::ok("", text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::ToolResultStatus;

    #[tokio::test]
    async fn echoes_text_back() {
        let tool = EchoTool;
        let result = tool.execute(serde_json::json!({"text": "hello"})).await.unwrap();
        assert_eq!(result.status, ToolResultStatus::Ok);
        assert_eq!(result.output, "hello");
    }
}
