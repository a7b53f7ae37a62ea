use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use converse_core::{
    ABORTED_NOTICE, ContextProvider, ConversationEvent, FAILURE_NOTICE, FinishReason,
    Orchestrator, OrchestratorConfig, OrchestratorError, PROMPT_SUGGESTIONS_TOOL, SubmitRequest,
    ToolExecution, ToolRegistry,
};
use converse_harness::{
    AbortHandle, AbortSignal, ChatMessage, Harness, HarnessError, ModelRef, ProviderAdapter,
    ProviderError, ProviderKind, ProviderRequest, ProviderResponse, ProviderStreamHandle,
    StreamEvent, ToolChoice, ToolPolicy, ToolSpec, UsageReport,
};
use futures::StreamExt as _;
use futures::stream;
use serde_json::{Value, json};

#[derive(Clone)]
enum Script {
    Events(Vec<Result<StreamEvent, ProviderError>>),
    EventsThenPending(Vec<Result<StreamEvent, ProviderError>>),
}

struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    repeat: Option<Script>,
    calls: AtomicU32,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            repeat: None,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn repeating(script: Script) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            repeat: Some(script),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn request(&self, idx: usize) -> ProviderRequest {
        self.requests.lock().expect("lock")[idx].clone()
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("lock").push(req);
        let script = self
            .scripts
            .lock()
            .expect("lock")
            .pop_front()
            .or_else(|| self.repeat.clone())
            .expect("script exhausted");
        Ok(ProviderStreamHandle {
            stream: match script {
                Script::Events(events) => Box::pin(stream::iter(events)),
                Script::EventsThenPending(events) => {
                    Box::pin(stream::iter(events).chain(stream::pending()))
                }
            },
        })
    }

    async fn invoke(&self, _req: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        unreachable!("tests stream")
    }
}

fn text(t: &str) -> Result<StreamEvent, ProviderError> {
    Ok(StreamEvent::TextDelta(t.into()))
}

fn tool_call(id: &str, name: &str, args: &str) -> Vec<Result<StreamEvent, ProviderError>> {
    vec![
        Ok(StreamEvent::ToolCallStart {
            id: id.into(),
            name: name.into(),
        }),
        Ok(StreamEvent::ToolCallArgumentsDelta(args.into())),
    ]
}

fn tool_turn(calls: &[(&str, &str, &str)]) -> Script {
    let mut events = Vec::new();
    for (id, name, args) in calls {
        events.extend(tool_call(id, name, args));
    }
    events.push(Ok(StreamEvent::ToolCallsFinished));
    events.push(Ok(StreamEvent::StreamEnd));
    Script::Events(events)
}

fn reply(parts: &[&str]) -> Script {
    let mut events: Vec<_> = parts.iter().map(|p| text(p)).collect();
    events.push(Ok(StreamEvent::StreamEnd));
    Script::Events(events)
}

fn tools() -> ToolRegistry {
    let mut registry = ToolRegistry::with_builtins();
    registry
        .register_fn(
            ToolSpec::new(
                "echo",
                "Echoes a value",
                json!({"type": "object", "properties": {"value": {"type": "string"}}}),
            )
            .source("AIAnalyst"),
            |args: Value| async move { args["value"].as_str().unwrap_or("<none>").to_string() },
        )
        .expect("echo");
    registry
}

fn orchestrator(provider: Arc<ScriptedProvider>, config: OrchestratorConfig) -> Orchestrator {
    let harness = Harness::builder()
        .register_provider(provider)
        .build()
        .expect("harness");
    Orchestrator::new(harness, tools()).with_config(config)
}

fn request(prompt: &str) -> SubmitRequest {
    SubmitRequest::new(
        ModelRef::new(ProviderKind::OpenAi, "gpt-4.1"),
        ToolPolicy::for_source("AIAnalyst"),
    )
    .turn(ChatMessage::user_text(prompt))
}

#[tokio::test]
async fn plain_reply_completes_in_one_iteration() {
    let provider = ScriptedProvider::new(vec![reply(&["Hello", " world"])]);
    let orchestrator = orchestrator(provider.clone(), OrchestratorConfig::default());

    let mut stream = orchestrator
        .submit(request("hi"), AbortSignal::never())
        .expect("submit");
    let mut snapshots = Vec::new();
    let mut completed = None;
    while let Some(event) = stream.next_event().await {
        match event {
            ConversationEvent::Snapshot { iteration, message } => {
                assert_eq!(iteration, 1);
                snapshots.push(message.text());
            }
            ConversationEvent::Completed(result) => completed = Some(result),
        }
    }
    let result = completed.expect("completed event");
    assert_eq!(result.finish_reason, FinishReason::Completed);
    assert_eq!(result.message.text(), "Hello world");
    assert_eq!(result.iterations, 1);
    assert_eq!(result.conversation.len(), 2);
    assert_eq!(snapshots.first().map(String::as_str), Some("Hello"));
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.request(0).tools.len(), 2);
}

#[tokio::test]
async fn iteration_cap_limits_provider_calls() {
    let provider =
        ScriptedProvider::repeating(tool_turn(&[("c", "echo", "{\"value\":\"again\"}")]));
    let orchestrator = orchestrator(
        provider.clone(),
        OrchestratorConfig::default().max_tool_iterations(3),
    );

    let result = orchestrator
        .submit(request("loop forever"), AbortSignal::never())
        .expect("submit")
        .finish()
        .await
        .expect("final");
    assert_eq!(provider.calls(), 3);
    assert_eq!(result.iterations, 3);
    assert_eq!(result.finish_reason, FinishReason::ToolIterationLimit);
    assert!(matches!(
        result.conversation.last(),
        Some(ChatMessage::ToolResult { .. })
    ));
    assert!(result.message.has_tool_calls());
}

#[tokio::test]
async fn tool_results_keep_request_order_and_are_resubmitted() {
    for mode in [ToolExecution::Sequential, ToolExecution::Concurrent] {
        let provider = ScriptedProvider::new(vec![
            tool_turn(&[
                ("a", "echo", "{\"value\":\"1\"}"),
                ("b", "missing_tool", "{}"),
                ("c", "echo", ""),
            ]),
            reply(&["done"]),
        ]);
        let orchestrator = orchestrator(
            provider.clone(),
            OrchestratorConfig::default().tool_execution(mode),
        );
        let result = orchestrator
            .submit(request("use tools"), AbortSignal::never())
            .expect("submit")
            .finish()
            .await
            .expect("final");

        assert_eq!(result.finish_reason, FinishReason::Completed);
        assert_eq!(provider.calls(), 2);
        let second = provider.request(1);
        let Some(ChatMessage::ToolResult { results }) = second.messages.last() else {
            panic!("second request must end with tool results");
        };
        let ids: Vec<&str> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(results[0].text, "1");
        assert_eq!(results[1].text, "Unknown tool");
        assert_eq!(results[2].text, "<none>");
    }
}

#[tokio::test]
async fn non_empty_prompt_suggestions_end_the_loop() {
    let provider = ScriptedProvider::new(vec![
        tool_turn(&[(
            "s1",
            PROMPT_SUGGESTIONS_TOOL,
            "{\"prompt_suggestions\":[]}",
        )]),
        tool_turn(&[(
            "s2",
            PROMPT_SUGGESTIONS_TOOL,
            "{\"prompt_suggestions\":[\"Chart it\"]}",
        )]),
    ]);
    let orchestrator = orchestrator(provider.clone(), OrchestratorConfig::default());
    let result = orchestrator
        .submit(request("analyze"), AbortSignal::never())
        .expect("submit")
        .finish()
        .await
        .expect("final");
    assert_eq!(provider.calls(), 2);
    assert_eq!(result.finish_reason, FinishReason::Suggestions);
    assert_eq!(result.suggestions, vec!["Chart it".to_string()]);
}

#[tokio::test]
async fn cancellation_mid_stream_finalizes_partial_reply() {
    let provider = ScriptedProvider::new(vec![Script::EventsThenPending(vec![
        text("one "),
        text("two"),
    ])]);
    let orchestrator = orchestrator(provider.clone(), OrchestratorConfig::default());
    let handle = AbortHandle::new();

    let mut stream = orchestrator
        .submit(request("write a lot"), handle.signal())
        .expect("submit");
    let mut seen = 0;
    let mut finals = Vec::new();
    while let Some(event) = stream.next_event().await {
        match event {
            ConversationEvent::Snapshot { .. } => {
                seen += 1;
                if seen == 2 {
                    handle.abort();
                }
            }
            ConversationEvent::Completed(result) => finals.push(result),
        }
    }
    assert_eq!(finals.len(), 1);
    let result = &finals[0];
    assert_eq!(result.finish_reason, FinishReason::Cancelled);
    assert_eq!(result.message.text(), format!("one two\n\n{ABORTED_NOTICE}"));
    assert!(!result.message.has_tool_calls());
}

#[tokio::test]
async fn already_cancelled_submit_adds_notice_without_calling_provider() {
    let provider = ScriptedProvider::new(vec![reply(&["unused"])]);
    let orchestrator = orchestrator(provider.clone(), OrchestratorConfig::default());
    let handle = AbortHandle::new();
    handle.abort();
    let result = orchestrator
        .submit(request("hi"), handle.signal())
        .expect("submit")
        .finish()
        .await
        .expect("final");
    assert_eq!(provider.calls(), 0);
    assert_eq!(result.iterations, 0);
    assert_eq!(result.message.text(), ABORTED_NOTICE);
}

#[tokio::test]
async fn provider_failure_appends_apology_and_drops_calls() {
    let mut events = vec![text("partial")];
    events.extend(tool_call("x", "echo", "{"));
    events.push(Err(ProviderError::transport(
        ProviderKind::OpenAi,
        "connection reset",
    )));
    let provider = ScriptedProvider::new(vec![Script::Events(events)]);
    let orchestrator = orchestrator(provider, OrchestratorConfig::default());
    let result = orchestrator
        .submit(request("hi"), AbortSignal::never())
        .expect("submit")
        .finish()
        .await
        .expect("final");
    assert!(matches!(result.finish_reason, FinishReason::Failed { ref error } if error.contains("connection reset")));
    assert_eq!(result.message.text(), format!("partial\n\n{FAILURE_NOTICE}"));
    assert!(!result.message.has_tool_calls());
}

#[tokio::test]
async fn refusal_is_terminal_and_recorded() {
    let provider = ScriptedProvider::new(vec![Script::Events(vec![Ok(StreamEvent::Refusal(
        "I can't help with that.".into(),
    ))])]);
    let orchestrator = orchestrator(provider, OrchestratorConfig::default());
    let result = orchestrator
        .submit(request("bad idea"), AbortSignal::never())
        .expect("submit")
        .finish()
        .await
        .expect("final");
    assert_eq!(
        result.finish_reason,
        FinishReason::Refused {
            reason: "I can't help with that.".into()
        }
    );
    assert_eq!(result.message.text(), "I can't help with that.");
}

#[tokio::test]
async fn usage_is_summed_across_iterations() {
    let usage = |prompt, completion, cached| {
        Ok(StreamEvent::UsageUpdate(UsageReport {
            prompt_tokens: prompt,
            completion_tokens: completion,
            cache_read_tokens: cached,
            cache_write_tokens: 0,
        }))
    };
    let mut first = tool_call("a", "echo", "{}");
    first.push(usage(100, 5, 40));
    first.push(Ok(StreamEvent::StreamEnd));
    let second = vec![text("ok"), usage(120, 2, 0), Ok(StreamEvent::StreamEnd)];
    let provider = ScriptedProvider::new(vec![Script::Events(first), Script::Events(second)]);
    let orchestrator = orchestrator(provider, OrchestratorConfig::default());
    let result = orchestrator
        .submit(request("hi"), AbortSignal::never())
        .expect("submit")
        .finish()
        .await
        .expect("final");
    assert_eq!(result.usage.input_tokens, 60 + 120);
    assert_eq!(result.usage.output_tokens, 7);
    assert_eq!(result.usage.cache_read_tokens, 40);
}

struct CountingContext(AtomicU32);

#[async_trait::async_trait]
impl ContextProvider for CountingContext {
    async fn context(&self, policy: &ToolPolicy) -> Vec<String> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        vec![format!("{} context #{n}", policy.source)]
    }
}

#[tokio::test]
async fn context_is_refreshed_before_every_request() {
    let provider = ScriptedProvider::new(vec![
        tool_turn(&[("a", "echo", "{}")]),
        reply(&["done"]),
    ]);
    let orchestrator = orchestrator(provider.clone(), OrchestratorConfig::default())
        .with_context_provider(Arc::new(CountingContext(AtomicU32::new(0))));
    let submit = request("hi").history(vec![ChatMessage::system("stale")]);
    let result = orchestrator
        .submit(submit, AbortSignal::never())
        .expect("submit")
        .finish()
        .await
        .expect("final");

    let system_texts = |messages: &[ChatMessage]| -> Vec<String> {
        messages
            .iter()
            .filter_map(|m| match m {
                ChatMessage::SystemContext { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    };
    assert_eq!(
        system_texts(&provider.request(0).messages),
        vec!["AIAnalyst context #1"]
    );
    assert_eq!(
        system_texts(&provider.request(1).messages),
        vec!["AIAnalyst context #2"]
    );
    assert!(result.conversation[0].is_system_context());
}

#[tokio::test]
async fn invalid_submits_are_rejected_before_starting() {
    let provider = ScriptedProvider::new(Vec::new());
    let orchestrator = orchestrator(provider.clone(), OrchestratorConfig::default());

    let empty = SubmitRequest::new(
        ModelRef::new(ProviderKind::OpenAi, "gpt-4.1"),
        ToolPolicy::for_source("AIAnalyst"),
    );
    assert!(matches!(
        orchestrator.submit(empty, AbortSignal::never()),
        Err(OrchestratorError::Validation(_))
    ));

    let mut assistant_last = request("hi");
    assistant_last
        .turns
        .push(ChatMessage::AssistantPrompt(Default::default()));
    assert!(matches!(
        orchestrator.submit(assistant_last, AbortSignal::never()),
        Err(OrchestratorError::Validation(_))
    ));

    let mut no_model = request("hi");
    no_model.model.model = " ".into();
    assert!(matches!(
        orchestrator.submit(no_model, AbortSignal::never()),
        Err(OrchestratorError::Validation(_))
    ));

    let mut unknown = request("hi");
    unknown.model = ModelRef::new(ProviderKind::Anthropic, "claude-sonnet-4-5");
    assert!(matches!(
        orchestrator.submit(unknown, AbortSignal::never()),
        Err(OrchestratorError::Harness(HarnessError::ProviderNotFound {
            provider: ProviderKind::Anthropic
        }))
    ));
    assert_eq!(provider.calls(), 0);
}

/// Calls the forced tool whenever a tool is required, answers in text otherwise.
#[derive(Default)]
struct ChoiceFollowingProvider {
    choices: Mutex<Vec<ToolChoice>>,
}

#[async_trait::async_trait]
impl ProviderAdapter for ChoiceFollowingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        let script = match &req.tool_choice {
            ToolChoice::Required(name) => {
                tool_turn(&[("forced", name.as_str(), "{\"value\":\"pinned\"}")])
            }
            ToolChoice::Auto => reply(&["answered"]),
        };
        self.choices.lock().expect("lock").push(req.tool_choice);
        let Script::Events(events) = script else {
            unreachable!("finite scripts only")
        };
        Ok(ProviderStreamHandle {
            stream: Box::pin(stream::iter(events)),
        })
    }

    async fn invoke(&self, _req: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        unreachable!("tests stream")
    }
}

#[tokio::test]
async fn pinned_tool_is_forced_only_on_the_first_request() {
    let provider = Arc::new(ChoiceFollowingProvider::default());
    let harness = Harness::builder()
        .register_provider(provider.clone())
        .build()
        .expect("harness");
    let orchestrator = Orchestrator::new(harness, tools());
    let submit = SubmitRequest::new(
        ModelRef::new(ProviderKind::OpenAi, "gpt-4.1"),
        ToolPolicy::for_source("AIAnalyst").pin("echo"),
    )
    .turn(ChatMessage::user_text("run echo"));

    let result = orchestrator
        .submit(submit, AbortSignal::never())
        .expect("submit")
        .finish()
        .await
        .expect("final");

    assert_eq!(
        *provider.choices.lock().expect("lock"),
        vec![ToolChoice::Required("echo".into()), ToolChoice::Auto]
    );
    assert_eq!(result.finish_reason, FinishReason::Completed);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.message.text(), "answered");
    let tool_turn_idx = result.conversation.len() - 2;
    let Some(ChatMessage::ToolResult { results }) = result.conversation.get(tool_turn_idx) else {
        panic!("forced call must be answered with a tool result");
    };
    assert_eq!(results[0].text, "pinned");
}

#[tokio::test]
async fn slow_consumer_still_receives_the_completed_event() {
    let deltas: Vec<String> = (0..50).map(|i| format!("{} ", i % 10)).collect();
    let parts: Vec<&str> = deltas.iter().map(String::as_str).collect();
    let provider = ScriptedProvider::new(vec![reply(&parts)]);
    let orchestrator = orchestrator(
        provider,
        OrchestratorConfig::default().snapshot_buffer(1),
    );

    let mut stream = orchestrator
        .submit(request("stream a lot"), AbortSignal::never())
        .expect("submit");
    let mut lengths = Vec::new();
    let mut finals = Vec::new();
    loop {
        tokio::time::sleep(Duration::from_millis(2)).await;
        match stream.next_event().await {
            Some(ConversationEvent::Snapshot { message, .. }) => lengths.push(message.text().len()),
            Some(ConversationEvent::Completed(result)) => finals.push(result),
            None => break,
        }
    }

    assert_eq!(finals.len(), 1);
    let expected: String = deltas.concat();
    assert_eq!(finals[0].message.text(), expected);
    assert!(!lengths.is_empty());
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]), "{lengths:?}");
    assert!(lengths.iter().all(|len| *len <= expected.len()));
}
