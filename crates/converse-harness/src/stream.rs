use crate::usage::UsageReport;

/// Provider-normalized partial update of one streaming response.
///
/// Produced by an adapter for the duration of one request and consumed once by
/// the [`StreamAggregator`](crate::aggregator::StreamAggregator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    /// Reasoning text from models that expose it.
    ThinkingDelta(String),
    ToolCallStart {
        id: String,
        name: String,
    },
    /// Appends to the arguments of the most recent tool call.
    ToolCallArgumentsDelta(String),
    /// The provider finished emitting tool calls for this turn.
    ToolCallsFinished,
    UsageUpdate(UsageReport),
    /// The model declined to answer.
    Refusal(String),
    StreamEnd,
}
