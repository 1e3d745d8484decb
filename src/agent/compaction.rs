// ABOUTME: Compaction strategy — replaces the pre-checkpoint prefix of History with one summary.
// ABOUTME: Token-budget heuristics are ported near-verbatim from the teacher; the replacement
// ABOUTME: itself is new, built on Context::compact_before so it is never a no-op.

use tokio_util::sync::CancellationToken;

use crate::bus::Bus;
use crate::context::Context;
use crate::core::message::Message;
use crate::llm::LlmFacade;

pub const SUMMARY_PREFIX: &str = "[compacted summary] ";
pub const COMPACTION_THRESHOLD_RATIO: f64 = 0.9;

const SUMMARIZATION_PROMPT: &str = "Summarize the conversation so far in a few dense paragraphs. \
Preserve decisions, open questions, file paths, and anything a continuation would need. \
Do not include meta-commentary about the summarization itself.";

/// Rough token estimate: ~4 bytes per token, the same heuristic the
/// teacher used rather than pulling in a tokenizer for a budget check.
pub fn approx_token_count(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

pub fn approx_messages_tokens(messages: &[Message]) -> u64 {
    messages.iter().map(|m| approx_token_count(&m.text())).sum()
}

/// Conservative context windows per provider family; unknown models fall
/// back to the smallest of the known windows.
pub fn context_window_for_model(model: &str) -> u64 {
    if model.contains("claude") {
        200_000
    } else if model.contains("gpt-4o") || model.contains("gpt-5") {
        128_000
    } else if model.contains("gemini") {
        1_000_000
    } else {
        128_000
    }
}

pub fn auto_compact_limit(model: &str, max_context_size_override: Option<u64>) -> u64 {
    max_context_size_override.unwrap_or_else(|| context_window_for_model(model))
}

/// §4.7: trigger point is `TokenCount > max_context_size * compaction_ratio`.
pub fn needs_compaction(token_count: u64, limit: u64, ratio: f64) -> bool {
    (token_count as f64) > (limit as f64) * ratio
}

/// Summarize the prefix before the most recent checkpoint and replace it in
/// Context, via `Context::compact_before`. A no-op only when there is no
/// checkpoint yet, or its prefix is empty — both cases where there is
/// nothing to compact.
pub async fn run_compaction(context: &mut Context, facade: &LlmFacade, bus: &Bus) -> anyhow::Result<()> {
    let Some((checkpoint_id, boundary)) = context.last_checkpoint_message_boundary() else {
        return Ok(());
    };
    if boundary == 0 {
        return Ok(());
    }

    let mut request_history = context.history()[..boundary].to_vec();
    request_history.push(Message::user(SUMMARIZATION_PROMPT));

    let output = facade.stream_turn(&request_history, &[], CancellationToken::new(), bus).await?;
    let summary_text = output.content.iter().filter_map(|p| p.as_text()).collect::<Vec<_>>().join("");
    let summary_text = if summary_text.is_empty() {
        format!("{SUMMARY_PREFIX}(summary unavailable)")
    } else {
        format!("{SUMMARY_PREFIX}{summary_text}")
    };

    context.compact_before(checkpoint_id, Message::assistant_text(summary_text))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_token_count_is_roughly_chars_over_four() {
        assert_eq!(approx_token_count("abcd"), 1);
        assert_eq!(approx_token_count("abcdefgh"), 2);
        assert_eq!(approx_token_count(""), 0);
    }

    #[test]
    fn context_window_matches_known_families() {
        assert_eq!(context_window_for_model("claude-sonnet-4-5"), 200_000);
        assert_eq!(context_window_for_model("gpt-5-mini"), 128_000);
        assert_eq!(context_window_for_model("gemini-2.5-pro"), 1_000_000);
        assert_eq!(context_window_for_model("some-unknown-model"), 128_000);
    }

    #[test]
    fn needs_compaction_trips_above_threshold_ratio() {
        assert!(!needs_compaction(89_999, 100_000, COMPACTION_THRESHOLD_RATIO));
        assert!(needs_compaction(90_001, 100_000, COMPACTION_THRESHOLD_RATIO));
    }

    #[test]
    fn auto_compact_limit_prefers_override() {
        assert_eq!(auto_compact_limit("claude-sonnet-4-5", Some(50_000)), 50_000);
        assert_eq!(auto_compact_limit("claude-sonnet-4-5", None), 200_000);
    }
}
