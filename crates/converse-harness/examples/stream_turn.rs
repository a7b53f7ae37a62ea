use std::io::Write as _;

use converse_harness::prelude::*;
use converse_harness::vendors::anthropic::AnthropicProvider;
use converse_harness::vendors::openai::OpenAiProvider;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    let harness = Harness::builder()
        .register_provider(std::sync::Arc::new(OpenAiProvider::from_env()?))
        .register_provider(std::sync::Arc::new(AnthropicProvider::from_env()?))
        .build()?;

    let kind: ProviderKind = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openai".to_string())
        .parse()?;
    let model = match kind {
        ProviderKind::Anthropic => "claude-haiku-4-5",
        _ => "gpt-4.1-mini",
    };

    let request = ProviderRequest::build(
        &[
            ChatMessage::system("Reply to test harness streaming."),
            ChatMessage::user_text("Stream a greeting."),
        ],
        Vec::new(),
        ToolChoice::Auto,
        ModelRef::new(kind, model),
        ModelOptions::default(),
    )?;

    let provider = harness.provider(kind)?;
    let mut printed = 0;
    let outcome = run_turn(
        provider.as_ref(),
        request,
        &mut AbortSignal::never(),
        |snapshot| {
            let text = snapshot.text();
            if let Some(delta) = text.get(printed..) {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            printed = text.len();
        },
    )
    .await;

    match outcome {
        Ok(TurnOutcome::Completed { usage, .. }) => {
            println!();
            eprintln!(
                "usage: input={} output={} cache_read={}",
                usage.input_tokens, usage.output_tokens, usage.cache_read_tokens
            );
        }
        Ok(TurnOutcome::Cancelled { .. }) => eprintln!("cancelled"),
        Err(failure) => eprintln!("turn failed: {}", failure.error),
    }
    Ok(())
}
