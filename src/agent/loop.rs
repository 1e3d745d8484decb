// ABOUTME: Loop Driver (Soul) — the state machine interleaving model turns and tool dispatch.
// ABOUTME: IDLE -> APPEND_USER -> STEP_BEGIN -> LLM_STREAM -> (TOOL_DISPATCH|APPEND_ASSISTANT) -> APPEND_RESULTS -> STEP_BEGIN.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::compaction;
use crate::bus::{Bus, Event};
use crate::context::{Context, DMailBox};
use crate::core::message::{ContentPart, Message, ToolResultStatus};
use crate::llm::LlmFacade;
use crate::tools::{Registry, ToolCallDescriptor};

/// Compaction knobs, ported from the teacher's `CompactionConfig`.
#[derive(Debug, Clone)]
pub struct CompactionSettings {
    pub enabled: bool,
    pub threshold_ratio: f64,
    pub max_context_size_override: Option<u64>,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        CompactionSettings {
            enabled: true,
            threshold_ratio: compaction::COMPACTION_THRESHOLD_RATIO,
            max_context_size_override: None,
        }
    }
}

/// §4.7 `run()`'s outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Interrupted,
    MaxStepsReached,
    ProviderError(String),
}

pub struct LoopDriver {
    context: Context,
    registry: Arc<Registry>,
    facade: LlmFacade,
    bus: Arc<Bus>,
    dmail: Arc<DMailBox>,
    model: String,
    max_steps_per_run: u64,
    compaction: CompactionSettings,
    /// Taken and appended as the first history record the first time `run`
    /// finds an empty history; `None` once consumed or if none was given.
    system_prompt: Option<String>,
}

impl LoopDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: Context,
        registry: Arc<Registry>,
        facade: LlmFacade,
        bus: Arc<Bus>,
        dmail: Arc<DMailBox>,
        model: impl Into<String>,
        max_steps_per_run: u64,
        compaction: CompactionSettings,
        system_prompt: Option<String>,
    ) -> Self {
        LoopDriver {
            context,
            registry,
            facade,
            bus,
            dmail,
            model: model.into(),
            max_steps_per_run,
            compaction,
            system_prompt,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    fn needs_compaction(&self) -> bool {
        if !self.compaction.enabled {
            return false;
        }
        let limit = compaction::auto_compact_limit(&self.model, self.compaction.max_context_size_override);
        compaction::needs_compaction(self.context.token_count(), limit, self.compaction.threshold_ratio)
    }

    /// §4.7 `run`. Appends `input` as a user message, then drives turns
    /// until the model stops asking for tools, `max_steps_per_run` is hit,
    /// the run is cancelled, or the provider errors.
    pub async fn run(&mut self, input: String, cancel: CancellationToken) -> RunOutcome {
        if self.context.history().is_empty() {
            if let Some(prompt) = self.system_prompt.take() {
                if let Err(e) = self.context.append(Message::system(prompt)) {
                    return RunOutcome::ProviderError(format!("persistence error: {e}"));
                }
            }
        }
        if let Err(e) = self.context.append(Message::user(input)) {
            return RunOutcome::ProviderError(format!("persistence error: {e}"));
        }

        let mut step_number = 0u64;
        loop {
            if let Some(mail) = self.dmail.fetch().await {
                if let Err(e) = self.context.revert_to(mail.checkpoint_id) {
                    return RunOutcome::ProviderError(format!("persistence error during revert: {e}"));
                }
                if let Err(e) = self.context.append(Message::user(mail.message)) {
                    return RunOutcome::ProviderError(format!("persistence error: {e}"));
                }
            }

            if self.needs_compaction() {
                self.bus.publish(Event::CompactionBegin);
                if let Err(e) = compaction::run_compaction(&mut self.context, &self.facade, &self.bus).await {
                    tracing::warn!(error = %e, "compaction failed, continuing with uncompacted history");
                }
                self.bus.publish(Event::CompactionEnd);
            }

            step_number += 1;
            if step_number > self.max_steps_per_run {
                self.bus.publish(Event::StepInterrupted);
                return RunOutcome::MaxStepsReached;
            }
            self.bus.publish(Event::StepBegin { step_number });
            let _span = tracing::debug_span!("loop_step", step_number).entered();

            let tool_specs = self.registry.catalog();
            let output = match self
                .facade
                .stream_turn(self.context.history(), &tool_specs, cancel.clone(), &self.bus)
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!(error = %e, "provider stream failed");
                    return RunOutcome::ProviderError(e.to_string());
                }
            };

            if !output.content.is_empty() {
                if let Err(e) = self.context.append(Message::assistant(output.content.clone())) {
                    return RunOutcome::ProviderError(format!("persistence error: {e}"));
                }
            }
            if let Err(e) = self.context.update_token_count(output.token_count) {
                return RunOutcome::ProviderError(format!("persistence error: {e}"));
            }

            if output.interrupted {
                self.emit_synthetic_interrupted_results(&output.content);
                self.bus.publish(Event::StepInterrupted);
                return RunOutcome::Interrupted;
            }

            let calls: Vec<ToolCallDescriptor> = output
                .content
                .iter()
                .filter_map(|part| match part {
                    ContentPart::ToolCall { id, function } => Some(ToolCallDescriptor {
                        id: id.clone(),
                        name: function.name.clone(),
                        arguments: function.arguments.clone(),
                    }),
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                self.bus.publish(Event::StepEnd);
                if let Err(e) = self.context.checkpoint(true) {
                    return RunOutcome::ProviderError(format!("persistence error: {e}"));
                }
                return RunOutcome::Completed;
            }

            let mut result_parts = Vec::with_capacity(calls.len());
            let mut calls = calls.into_iter();
            let mut skipped_mid_batch = false;
            for call in calls.by_ref() {
                if cancel.is_cancelled() {
                    result_parts.push(Self::synthetic_interrupted_result(call.id));
                    skipped_mid_batch = true;
                    break;
                }
                let call_id = call.id.clone();
                tracing::debug!(tool = %call.name, call_id = %call_id, "dispatching tool call");
                let result = self.registry.dispatch(call).await;
                self.bus.publish(Event::ToolResult { call_id: call_id.clone(), result: result.clone() });
                result_parts.push(ContentPart::tool_result(call_id, result.status, result.message, result.output));
            }
            // (§5/I5): a cancellation mid-batch skips every remaining
            // announced-but-undispatched call rather than running it.
            if skipped_mid_batch {
                result_parts.extend(calls.map(|call| Self::synthetic_interrupted_result(call.id)));
            }
            if let Err(e) = self.context.append(Message::tool_results(result_parts)) {
                return RunOutcome::ProviderError(format!("persistence error: {e}"));
            }

            if skipped_mid_batch || cancel.is_cancelled() {
                self.bus.publish(Event::StepInterrupted);
                return RunOutcome::Interrupted;
            }
        }
    }

    fn synthetic_interrupted_result(call_id: impl Into<String>) -> ContentPart {
        ContentPart::tool_result(call_id, ToolResultStatus::Error, "interrupted", "")
    }

    /// (I5): an interrupted step must never leave an announced tool call
    /// without a matching result. Appends one synthetic ERROR result per
    /// unmatched call, if any were announced before the stream was cut.
    fn emit_synthetic_interrupted_results(&mut self, content: &[ContentPart]) {
        let call_ids: Vec<&str> = content.iter().filter_map(ContentPart::as_tool_call_id).collect();
        if call_ids.is_empty() {
            return;
        }
        let parts: Vec<ContentPart> = call_ids.into_iter().map(Self::synthetic_interrupted_result).collect();
        if let Err(e) = self.context.append(Message::tool_results(parts)) {
            tracing::error!(error = %e, "failed to persist synthetic interrupted tool results");
        }
    }
}
