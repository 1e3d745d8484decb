// ABOUTME: LLM Facade — ChatProvider contract and streaming-chunk assembly into AssistantOutput.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::bus::{Bus, Event};
use crate::core::message::{ContentPart, Message};
use crate::tools::ToolSpec;
use crate::tools::ToolCallDescriptor;

/// One increment of a model turn.
#[derive(Debug, Clone)]
pub enum Chunk {
    TextDelta(String),
    ToolCallDelta { index: usize, id: Option<String>, name: Option<String>, arguments_delta: Option<String> },
    Usage { tokens: u64 },
    Done,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Chunk> + Send>>;

/// Implemented per backend (Anthropic, OpenAI, ...). Streams chunks for one
/// model turn over the given history and tool catalog; must stop promptly
/// once `cancel` fires.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn stream(
        &self,
        history: &[Message],
        tool_specs: &[ToolSpec],
        cancel: CancellationToken,
    ) -> anyhow::Result<ChunkStream>;
}

/// A fully assembled model turn.
#[derive(Debug, Clone)]
pub struct AssistantOutput {
    pub content: Vec<ContentPart>,
    pub token_count: u64,
    pub interrupted: bool,
}

#[derive(Default)]
struct PendingToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

pub struct LlmFacade {
    provider: Arc<dyn ChatProvider>,
}

impl LlmFacade {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        LlmFacade { provider }
    }

    /// §4.4. Streams one turn and assembles it into an `AssistantOutput`,
    /// forwarding each finished ContentPart to the bus as it lands.
    pub async fn stream_turn(
        &self,
        history: &[Message],
        tool_specs: &[ToolSpec],
        cancel: CancellationToken,
        bus: &Bus,
    ) -> anyhow::Result<AssistantOutput> {
        let mut stream = self.provider.stream(history, tool_specs, cancel.clone()).await?;

        let mut content: Vec<ContentPart> = Vec::new();
        let mut pending: HashMap<usize, PendingToolCall> = HashMap::new();
        let mut pending_order: Vec<usize> = Vec::new();
        let mut current_text = String::new();
        let mut token_count: u64 = 0;
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                next = stream.next() => {
                    match next {
                        None => break,
                        Some(Chunk::Done) => break,
                        Some(Chunk::Usage { tokens }) => {
                            token_count = tokens;
                        }
                        Some(Chunk::TextDelta(delta)) => {
                            current_text.push_str(&delta);
                        }
                        Some(Chunk::ToolCallDelta { index, id, name, arguments_delta }) => {
                            if !pending.contains_key(&index) {
                                if !current_text.is_empty() {
                                    let part = ContentPart::text(std::mem::take(&mut current_text));
                                    bus.publish(Event::ContentPart(part.clone()));
                                    content.push(part);
                                }
                                pending_order.push(index);
                            }
                            let entry = pending.entry(index).or_default();
                            if let Some(id) = id {
                                match &entry.id {
                                    Some(existing) if existing != &id => {
                                        anyhow::bail!("tool call at index {index} latched a second id ({existing} -> {id})");
                                    }
                                    _ => entry.id = Some(id),
                                }
                            }
                            if let Some(name) = name {
                                match &entry.name {
                                    Some(existing) if existing != &name => {
                                        anyhow::bail!("tool call at index {index} latched a second name ({existing} -> {name})");
                                    }
                                    _ => entry.name = Some(name),
                                }
                            }
                            if let Some(delta) = arguments_delta {
                                entry.arguments.push_str(&delta);
                            }
                        }
                    }
                }
            }
        }

        if !current_text.is_empty() {
            let part = ContentPart::text(current_text);
            bus.publish(Event::ContentPart(part.clone()));
            content.push(part);
        }

        for index in pending_order {
            let call = pending.remove(&index).expect("recorded in pending_order");
            match (call.id, call.name) {
                (Some(id), Some(name)) => {
                    let part = ContentPart::tool_call(id.clone(), name.clone(), call.arguments.clone());
                    bus.publish(Event::ToolCall(ToolCallDescriptor { id, name, arguments: call.arguments }));
                    content.push(part);
                }
                _ if interrupted => {
                    // Never announced to the bus; nothing downstream needs cleanup.
                }
                _ => {
                    anyhow::bail!("tool call at index {index} never received both an id and a name");
                }
            }
        }

        Ok(AssistantOutput { content, token_count, interrupted })
    }
}
