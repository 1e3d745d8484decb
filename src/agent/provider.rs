// ABOUTME: Reference ChatProvider — echoes the latest user text back as a scripted stream.
// ABOUTME: Stands in for a real backend client (Anthropic/OpenAI/...), which is out of scope here;
// ABOUTME: the contract a concrete client has to satisfy is `llm::ChatProvider` itself.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio_util::sync::CancellationToken;

use crate::config::LlmConfig;
use crate::core::message::{Message, Role};
use crate::llm::{ChatProvider, Chunk, ChunkStream};
use crate::tools::ToolSpec;

/// Selects the configured provider. Only `"echo"` is implemented in this
/// crate; any other name errors, matching the teacher's
/// `create_client`-style unknown-provider rejection.
pub fn create_provider(config: &LlmConfig) -> anyhow::Result<Arc<dyn ChatProvider>> {
    match config.provider.as_str() {
        "echo" => Ok(Arc::new(EchoProvider)),
        other => anyhow::bail!(
            "unknown LLM provider: '{other}'. This crate ships only the 'echo' reference provider; \
             wire a real backend by implementing llm::ChatProvider."
        ),
    }
}

/// Replies with the text of the last user message, uppercased, and never
/// asks for a tool. Exists so the Loop Driver and demo CLI have something
/// to run against without external network access or API keys.
pub struct EchoProvider;

#[async_trait]
impl ChatProvider for EchoProvider {
    async fn stream(&self, history: &[Message], _tool_specs: &[ToolSpec], _cancel: CancellationToken) -> anyhow::Result<ChunkStream> {
        let last_user_text = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
            .unwrap_or_default();
        let reply = last_user_text.to_uppercase();
        let tokens = (reply.len() as u64).div_ceil(4).max(1);
        Ok(Box::pin(stream::iter(vec![Chunk::TextDelta(reply), Chunk::Usage { tokens }, Chunk::Done])))
    }
}
