// ABOUTME: Minimal system prompt builder — just enough for the Loop Driver's first STEP_BEGIN.
// ABOUTME: Prompt templating beyond this is out of scope; tool descriptions come from the Registry.

/// Parameters the demo CLI has on hand when it builds a system prompt.
#[derive(Debug, Clone)]
pub struct SystemPromptParams {
    pub tool_names: Vec<String>,
    pub model: String,
}

pub fn build_system_prompt(params: &SystemPromptParams) -> String {
    if params.tool_names.is_empty() {
        format!("You are an assistant running on {}. No tools are available.", params.model)
    } else {
        format!(
            "You are an assistant running on {}. Available tools: {}.",
            params.model,
            params.tool_names.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_each_tool_name() {
        let params = SystemPromptParams { tool_names: vec!["echo".into(), "ask_user".into()], model: "claude-sonnet-4-5".into() };
        let prompt = build_system_prompt(&params);
        assert!(prompt.contains("echo"));
        assert!(prompt.contains("ask_user"));
    }

    #[test]
    fn handles_no_tools() {
        let params = SystemPromptParams { tool_names: vec![], model: "claude-sonnet-4-5".into() };
        let prompt = build_system_prompt(&params);
        assert!(prompt.contains("No tools"));
    }
}
