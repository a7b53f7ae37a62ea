use converse_harness::ToolSpec;
use serde::Deserialize;
use serde_json::{Value, json};

use super::registry::ToolRegistry;

/// Name of the tool whose non-empty result ends the conversation loop.
pub const PROMPT_SUGGESTIONS_TOOL: &str = "user_prompt_suggestions";

const PROMPT_SUGGESTIONS_RESULT: &str = "User prompt suggestions tool executed successfully, user is presented with a list of prompt suggestions, to choose from.";

#[derive(Deserialize)]
struct PromptSuggestionsArgs {
    prompt_suggestions: Vec<String>,
}

pub fn prompt_suggestions_spec() -> ToolSpec {
    ToolSpec::new(
        PROMPT_SUGGESTIONS_TOOL,
        "Offer the user follow-up prompts to choose from. Call this once the answer is complete.",
        json!({
            "type": "object",
            "properties": {
                "prompt_suggestions": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Short follow-up prompts the user may send next."
                }
            },
            "required": ["prompt_suggestions"],
            "additionalProperties": false
        }),
    )
    .source("AIAnalyst")
}

pub(super) fn register_prompt_suggestions(registry: &mut ToolRegistry) {
    // The built-in schema is static and the registry is fresh.
    let _ = registry.register_fn(prompt_suggestions_spec(), |_| async {
        PROMPT_SUGGESTIONS_RESULT.to_string()
    });
}

/// Extracts the suggestions from validated arguments.
pub(crate) fn suggestions_from_args(args: &Value) -> Vec<String> {
    serde_json::from_value::<PromptSuggestionsArgs>(args.clone())
        .map(|a| a.prompt_suggestions)
        .unwrap_or_default()
}
