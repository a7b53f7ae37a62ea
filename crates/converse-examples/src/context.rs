use chrono::Local;
use converse_core::ContextProvider;
use converse_harness::ToolPolicy;

/// Refreshes the system context with the local clock before every request.
pub struct ClockContext;

#[async_trait::async_trait]
impl ContextProvider for ClockContext {
    async fn context(&self, policy: &ToolPolicy) -> Vec<String> {
        vec![
            format!(
                "You are a concise assistant for the {} surface. Call user_prompt_suggestions \
                 when the user would benefit from follow-up prompts.",
                policy.source
            ),
            format!("Local time: {}", Local::now().format("%Y-%m-%d %H:%M:%S %Z")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_names_the_source() {
        let texts = ClockContext
            .context(&ToolPolicy::for_source("AIAnalyst"))
            .await;
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("AIAnalyst"));
        assert!(texts[1].starts_with("Local time: "));
    }
}
