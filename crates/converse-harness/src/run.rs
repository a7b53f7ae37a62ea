use futures::StreamExt as _;
use tracing::debug;

use crate::aggregator::StreamAggregator;
use crate::cancel::AbortSignal;
use crate::content::AssistantPrompt;
use crate::errors::ProviderError;
use crate::provider::{ProviderAdapter, ProviderRequest};
use crate::stream::StreamEvent;
use crate::usage::Usage;

/// How one provider exchange ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The provider finished; `message` is finalized.
    Completed { message: AssistantPrompt, usage: Usage },
    /// The signal fired before or during the exchange. The aggregator holds
    /// whatever partial state arrived.
    Cancelled { partial: StreamAggregator },
}

/// A failed provider exchange with the partial state seen before the failure.
#[derive(Debug)]
pub struct TurnFailure {
    pub error: ProviderError,
    pub partial: StreamAggregator,
}

/// Runs one request against `provider` and rebuilds the assistant message.
///
/// `on_snapshot` receives every intermediate snapshot in event order and the
/// finalized message last. Cancellation is raced against both the request
/// and every stream read; dropping the stream closes the HTTP response.
pub async fn run_turn<F>(
    provider: &dyn ProviderAdapter,
    request: ProviderRequest,
    signal: &mut AbortSignal,
    mut on_snapshot: F,
) -> Result<TurnOutcome, TurnFailure>
where
    F: FnMut(&AssistantPrompt),
{
    let run_id = request.run_id;
    let kind = provider.kind();
    let model = request.model.model.clone();
    let mut aggregator = StreamAggregator::new(model.clone());

    if signal.is_aborted() {
        return Ok(TurnOutcome::Cancelled {
            partial: aggregator,
        });
    }

    if !request.options.stream {
        debug!(run_id = %run_id, provider = %kind, model = %model, "invoking provider");
        let response = tokio::select! {
            _ = signal.aborted() => {
                return Ok(TurnOutcome::Cancelled { partial: aggregator });
            }
            response = provider.invoke(request) => response,
        };
        return match response {
            Ok(response) => {
                let mut aggregator = StreamAggregator::from_response(response);
                let message = aggregator.finalize();
                on_snapshot(&message);
                Ok(TurnOutcome::Completed {
                    message,
                    usage: aggregator.usage(),
                })
            }
            Err(error) => Err(TurnFailure {
                error,
                partial: aggregator,
            }),
        };
    }

    debug!(run_id = %run_id, provider = %kind, model = %model, "opening provider stream");
    let started = tokio::select! {
        _ = signal.aborted() => {
            return Ok(TurnOutcome::Cancelled { partial: aggregator });
        }
        started = provider.start_stream(request) => started,
    };
    let mut handle = match started {
        Ok(handle) => handle,
        Err(error) => {
            return Err(TurnFailure {
                error,
                partial: aggregator,
            });
        }
    };

    let mut seq = 0_u64;
    loop {
        let next = tokio::select! {
            _ = signal.aborted() => {
                debug!(run_id = %run_id, provider = %kind, seq, "stream cancelled");
                return Ok(TurnOutcome::Cancelled { partial: aggregator });
            }
            next = handle.stream.next() => next,
        };
        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(error)) => {
                return Err(TurnFailure {
                    error,
                    partial: aggregator,
                });
            }
            None => StreamEvent::StreamEnd,
        };
        seq = seq.saturating_add(1);

        let is_end = event == StreamEvent::StreamEnd;
        if let Some(snapshot) = aggregator.apply(event) {
            on_snapshot(&snapshot);
        }
        if let Some(text) = aggregator.refusal() {
            let error = ProviderError::refusal(kind, text);
            return Err(TurnFailure {
                error,
                partial: aggregator,
            });
        }
        if is_end {
            debug!(run_id = %run_id, provider = %kind, events = seq, "provider stream finished");
            let message = aggregator.finalize();
            return Ok(TurnOutcome::Completed {
                message,
                usage: aggregator.usage(),
            });
        }
    }
}
