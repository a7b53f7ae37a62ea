use clap::Parser;
use converse_harness::{ModelOptions, ProviderKind};

/// Chat with an LLM that can call a few demo tools.
#[derive(Debug, Parser)]
#[command(name = "converse-chat", version)]
pub struct Cli {
    /// Provider family: openai, xai or anthropic.
    #[arg(long, short, default_value = "openai", value_parser = parse_provider)]
    pub provider: ProviderKind,

    /// Model name; defaults per provider.
    #[arg(long, short)]
    pub model: Option<String>,

    /// Tool source; only tools advertised for this source are exposed.
    #[arg(long, default_value = "AIAnalyst")]
    pub source: String,

    /// Pin one tool and force the model to call it.
    #[arg(long)]
    pub tool: Option<String>,

    /// Use one non-streaming request per iteration.
    #[arg(long)]
    pub no_stream: bool,

    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Overrides CONVERSE_MAX_TOOL_ITERATIONS.
    #[arg(long)]
    pub max_tool_iterations: Option<u32>,

    /// Run the calls of one turn concurrently.
    #[arg(long)]
    pub concurrent_tools: bool,

    /// Prompt to send; starts an interactive session when omitted.
    pub prompt: Vec<String>,
}

impl Cli {
    pub fn model_name(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider {
                ProviderKind::OpenAi => "gpt-4.1-mini",
                ProviderKind::XAi => "grok-3-mini",
                ProviderKind::Anthropic => "claude-sonnet-4-5",
            }
            .to_string()
        })
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions::default()
            .stream(!self.no_stream)
            .max_tokens(self.max_tokens)
    }

    pub fn one_shot_prompt(&self) -> Option<String> {
        let prompt = self.prompt.join(" ");
        (!prompt.trim().is_empty()).then_some(prompt)
    }
}

fn parse_provider(value: &str) -> Result<ProviderKind, String> {
    value.parse().map_err(|e: converse_harness::HarnessError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pick_openai_and_streaming() {
        let cli = Cli::parse_from(["converse-chat", "hello", "there"]);
        assert_eq!(cli.provider, ProviderKind::OpenAi);
        assert_eq!(cli.model_name(), "gpt-4.1-mini");
        assert!(cli.model_options().stream);
        assert_eq!(cli.one_shot_prompt().as_deref(), Some("hello there"));
    }

    #[test]
    fn provider_and_flags_parse() {
        let cli = Cli::parse_from([
            "converse-chat",
            "--provider",
            "anthropic",
            "--no-stream",
            "--tool",
            "current_time",
        ]);
        assert_eq!(cli.provider, ProviderKind::Anthropic);
        assert!(!cli.model_options().stream);
        assert_eq!(cli.tool.as_deref(), Some("current_time"));
        assert!(cli.one_shot_prompt().is_none());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["converse-chat", "--provider", "mystery"]).is_err());
    }
}
