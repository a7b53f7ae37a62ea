//! Server-sent event framing shared by the vendor adapters.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;

use crate::errors::ProviderError;
use crate::model::ProviderKind;
use crate::stream::StreamEvent;

pub(crate) type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame_bytes = self.buf[..idx].to_vec();
            self.buf.drain(..idx + delim_len);
            if let Some(frame) = parse_sse_frame(&frame_bytes) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a trailing frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_sse_frame(&rest)
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event: Option<String> = None;
    let mut data_lines: Vec<String> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start().to_string());
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

/// Turns a raw SSE body into normalized events using a vendor frame mapper.
///
/// The mapper may keep per-response state. A `StreamEnd` is appended when the
/// body ends without the vendor's own terminal marker.
pub(crate) fn event_stream<M>(
    provider: ProviderKind,
    bytes_stream: ByteStream,
    mapper: M,
) -> impl futures::Stream<Item = Result<StreamEvent, ProviderError>> + Send
where
    M: FnMut(&SseFrame) -> Result<Vec<StreamEvent>, ProviderError> + Send + 'static,
{
    struct State<M> {
        provider: ProviderKind,
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        mapper: M,
        pending: VecDeque<StreamEvent>,
        ended: bool,
        done: bool,
    }

    stream::try_unfold(
        State {
            provider,
            bytes_stream,
            decoder: SseDecoder::default(),
            mapper,
            pending: VecDeque::new(),
            ended: false,
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    if event == StreamEvent::StreamEnd {
                        state.ended = true;
                        state.pending.clear();
                    }
                    return Ok(Some((event, state)));
                }
                if state.done {
                    if !state.ended {
                        state.ended = true;
                        return Ok(Some((StreamEvent::StreamEnd, state)));
                    }
                    return Ok(None);
                }
                if state.ended {
                    state.done = true;
                    continue;
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            state.pending.extend((state.mapper)(&frame)?);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider,
                            format!("streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        if let Some(frame) = state.decoder.finish() {
                            state.pending.extend((state.mapper)(&frame)?);
                        }
                        state.done = true;
                    }
                }
            }
        },
    )
}
