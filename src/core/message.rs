// ABOUTME: Message / ContentPart data model — the unit the Context Store persists
// ABOUTME: and the Loop Driver, Registry, and LLM Facade all exchange.

use serde::{Deserialize, Serialize};

/// Who authored a Message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// Outcome of a tool invocation, as seen by the model and the history file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolResultStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "REJECTED")]
    Rejected,
}

/// The `function` object nested inside a `tool_call` content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

/// One fragment of a Message. Tagged by `type` on the wire; unknown shapes
/// are rejected at decode rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        function: ToolCallFunction,
    },
    ToolResult {
        call_id: String,
        status: ToolResultStatus,
        message: String,
        output: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        ContentPart::ToolCall {
            id: id.into(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        status: ToolResultStatus,
        message: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        ContentPart::ToolResult {
            call_id: call_id.into(),
            status,
            message: message.into(),
            output: output.into(),
        }
    }

    pub fn as_tool_call_id(&self) -> Option<&str> {
        match self {
            ContentPart::ToolCall { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn as_tool_result_call_id(&self) -> Option<&str> {
        match self {
            ContentPart::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One message in the conversation. Immutable once constructed, per (I1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn assistant(content: Vec<ContentPart>) -> Self {
        Message {
            role: Role::Assistant,
            content,
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Message::assistant(vec![ContentPart::text(text)])
    }

    pub fn tool_results(parts: Vec<ContentPart>) -> Self {
        Message {
            role: Role::Tool,
            content: parts,
        }
    }

    /// Ids of every tool call this message makes.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        self.content.iter().filter_map(ContentPart::as_tool_call_id).collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_call_ids().is_empty()
    }

    /// Concatenated text of every Text content part, in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Token usage reported alongside an assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_shape_matches_spec() {
        let msg = Message::user("hi");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "hi");
    }

    #[test]
    fn tool_call_wire_shape_nests_function() {
        let part = ContentPart::tool_call("t1", "Ls", "{}");
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "tool_call");
        assert_eq!(value["id"], "t1");
        assert_eq!(value["function"]["name"], "Ls");
        assert_eq!(value["function"]["arguments"], "{}");
    }

    #[test]
    fn tool_result_wire_shape_uses_screaming_status() {
        let part = ContentPart::tool_result("t1", ToolResultStatus::Ok, "", "file1\nfile2");
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["status"], "OK");
    }

    #[test]
    fn unknown_content_part_type_rejected() {
        let json = r#"{"type":"bogus","foo":"bar"}"#;
        let result: Result<ContentPart, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn tool_call_ids_collects_only_tool_calls() {
        let msg = Message::assistant(vec![
            ContentPart::text("thinking"),
            ContentPart::tool_call("t1", "Ls", "{}"),
            ContentPart::tool_call("t2", "Cat", "{}"),
        ]);
        assert_eq!(msg.tool_call_ids(), vec!["t1", "t2"]);
    }
}
