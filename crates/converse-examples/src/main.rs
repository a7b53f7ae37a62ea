mod cli;
mod context;
mod tools;

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use clap::Parser as _;
use converse_core::{
    ConversationEvent, FinalResult, FinishReason, Orchestrator, OrchestratorConfig, SubmitRequest,
    ToolExecution, init_observability,
};
use converse_harness::vendors::anthropic::AnthropicProvider;
use converse_harness::vendors::openai::OpenAiProvider;
use converse_harness::{
    AbortHandle, ChatMessage, Harness, HarnessError, ModelRef, ProviderAdapter, ProviderKind,
    ToolPolicy, Usage,
};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::context::ClockContext;

fn load_env() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

/// Registers the adapter for `kind`; the others are skipped when their key is unset.
fn build_harness(kind: ProviderKind) -> Result<Harness, Box<dyn std::error::Error>> {
    let mut builder = Harness::builder();
    for candidate in [ProviderKind::OpenAi, ProviderKind::XAi, ProviderKind::Anthropic] {
        let provider: Result<Arc<dyn ProviderAdapter>, HarnessError> = match candidate {
            ProviderKind::OpenAi => OpenAiProvider::from_env().map(|p| Arc::new(p) as _),
            ProviderKind::XAi => OpenAiProvider::xai_from_env().map(|p| Arc::new(p) as _),
            ProviderKind::Anthropic => AnthropicProvider::from_env().map(|p| Arc::new(p) as _),
        };
        match provider {
            Ok(provider) => builder = builder.register_provider(provider),
            Err(e) if candidate == kind => return Err(e.into()),
            Err(e) => info!(provider = %candidate, error = %e, "provider not configured"),
        }
    }
    Ok(builder.build()?)
}

async fn submit_and_print(
    orchestrator: &Orchestrator,
    request: SubmitRequest,
) -> Result<FinalResult, Box<dyn std::error::Error>> {
    let handle = AbortHandle::new();
    let ctrl_c = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.abort();
            }
        })
    };

    let mut stream = orchestrator.submit(request, handle.signal())?;
    let mut current = 0_u32;
    let mut shown = String::new();
    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next_event().await {
        match event {
            ConversationEvent::Snapshot { iteration, message } => {
                if iteration != current {
                    if !shown.is_empty() {
                        writeln!(stdout)?;
                    }
                    current = iteration;
                    shown.clear();
                }
                let text = message.text();
                if let Some(delta) = text.strip_prefix(shown.as_str()) {
                    write!(stdout, "{delta}")?;
                    stdout.flush()?;
                    shown = text;
                }
            }
            ConversationEvent::Completed(result) => {
                // Cancellation and failure notices only appear in the final message.
                write!(stdout, "{}", unshown_tail(&shown, &result.message.text()))?;
                break;
            }
        }
    }
    ctrl_c.abort();
    let result = stream.finish().await?;
    writeln!(stdout)?;
    Ok(result)
}

/// What is left to print of the final message after `shown` was streamed.
fn unshown_tail(shown: &str, text: &str) -> String {
    match text.strip_prefix(shown) {
        Some(rest) => rest.to_string(),
        None if shown.is_empty() => text.to_string(),
        None => format!("\n{text}"),
    }
}

fn report(result: &FinalResult) {
    match &result.finish_reason {
        FinishReason::Completed => {}
        FinishReason::Suggestions => {
            println!("Suggestions:");
            for (i, suggestion) in result.suggestions.iter().enumerate() {
                println!("  {}. {suggestion}", i + 1);
            }
        }
        FinishReason::ToolIterationLimit => warn!("stopped at the tool iteration limit"),
        FinishReason::Cancelled => println!("(cancelled)"),
        FinishReason::Refused { reason } => println!("(refused: {reason})"),
        FinishReason::Failed { error } => eprintln!("request failed: {error}"),
    }
    let Usage {
        input_tokens,
        output_tokens,
        cache_read_tokens,
        cache_write_tokens,
    } = result.usage;
    let tool_turns = result
        .conversation
        .iter()
        .filter(|m| m.is_tool_result())
        .count();
    eprintln!(
        "[{} requests, {tool_turns} tool turns] input={input_tokens} output={output_tokens} cache_read={cache_read_tokens} cache_write={cache_write_tokens}",
        result.iterations
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env();
    init_observability();
    let cli = Cli::parse();

    let mut config = OrchestratorConfig::from_env();
    if let Some(max) = cli.max_tool_iterations {
        config = config.max_tool_iterations(max);
    }
    if cli.concurrent_tools {
        config = config.tool_execution(ToolExecution::Concurrent);
    }

    let orchestrator = Orchestrator::new(build_harness(cli.provider)?, tools::demo_registry()?)
        .with_config(config)
        .with_context_provider(Arc::new(ClockContext));

    let model = ModelRef::new(cli.provider, cli.model_name());
    let mut policy = ToolPolicy::for_source(cli.source.as_str());
    if let Some(tool) = &cli.tool {
        policy = policy.pin(tool.as_str());
    }
    let new_request = |history: Vec<ChatMessage>, prompt: String| {
        SubmitRequest::new(model.clone(), policy.clone())
            .history(history)
            .turn(ChatMessage::user_text(prompt))
            .options(cli.model_options())
    };

    if let Some(prompt) = cli.one_shot_prompt() {
        let result = submit_and_print(&orchestrator, new_request(Vec::new(), prompt)).await?;
        report(&result);
        return Ok(());
    }

    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt, "/quit" | "/exit") {
            break;
        }
        let result =
            submit_and_print(&orchestrator, new_request(history, prompt.to_string())).await?;
        report(&result);
        history = result.conversation;
    }
    Ok(())
}
