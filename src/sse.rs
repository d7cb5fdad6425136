//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module turns the raw byte stream of a streamed `chat/completions` response into a
//! stream of [`ChatCompletionChunk`]s.  Events are separated by a blank line; each carries its
//! payload on one or more `data:` lines.  The service ends a reply with `data: [DONE]`.

use std::error;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_CHUNKS, STREAM_ERRORS};
use crate::types::{ApiErrorBody, ChatCompletionChunk};
use crate::{Error, Result};

/// The payload that marks the end of a reply.
const DONE_MARKER: &str = "[DONE]";

struct SseState<S> {
    stream: S,
    buffer: Vec<u8>,
    eof: bool,
    finished: bool,
    saw_finish_reason: bool,
    idle_timeout: Option<Duration>,
}

enum Frame {
    Data(String),
    Empty,
}

/// Process a stream of bytes into a stream of chat completion chunks.
///
/// The returned stream ends after the `[DONE]` marker.  It yields at most one error and then
/// ends, so a broken connection or an undecodable event is never followed by more text.  A body
/// that ends without either `[DONE]` or a chunk carrying a finish reason is reported as a
/// streaming error because the reply may have been cut short.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: error::Error + Send + Sync + 'static,
{
    process_sse_with_idle_timeout(byte_stream, None)
}

/// Like [`process_sse`], but fails with a timeout error when no bytes arrive for `idle`.
///
/// The limit applies to each gap between reads, never to the stream as a whole.
pub fn process_sse_with_idle_timeout<S, E>(
    byte_stream: S,
    idle: Option<Duration>,
) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: error::Error + Send + Sync + 'static,
{
    let state = SseState {
        stream: byte_stream,
        buffer: Vec::new(),
        eof: false,
        finished: false,
        saw_finish_reason: false,
        idle_timeout: idle,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        loop {
            // First check if we have a complete event in the buffer
            match take_event(&mut state.buffer) {
                Some(Ok(Frame::Data(data))) => match decode_data(&data) {
                    Ok(Some(chunk)) => {
                        STREAM_CHUNKS.click();
                        if chunk.finish_reason().is_some() {
                            state.saw_finish_reason = true;
                        }
                        return Some((Ok(chunk), state));
                    }
                    Ok(None) => {
                        state.finished = true;
                        return None;
                    }
                    Err(err) => {
                        STREAM_ERRORS.click();
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                },
                Some(Ok(Frame::Empty)) => continue,
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {}
            }

            if state.eof {
                state.finished = true;
                if state.saw_finish_reason {
                    return None;
                }
                STREAM_ERRORS.click();
                return Some((
                    Err(Error::streaming(
                        "stream ended before the completion signal",
                        None,
                    )),
                    state,
                ));
            }

            // Read more data
            let next = match state.idle_timeout {
                Some(idle) => match tokio::time::timeout(idle, state.stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        STREAM_ERRORS.click();
                        state.finished = true;
                        return Some((
                            Err(Error::timeout(
                                format!("no data from the stream for {:.1}s", idle.as_secs_f64()),
                                Some(idle.as_secs_f64()),
                            )),
                            state,
                        ));
                    }
                },
                None => state.stream.next().await,
            };
            match next {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state
                        .buffer
                        .extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                }
                Some(Err(e)) => {
                    STREAM_ERRORS.click();
                    state.finished = true;
                    return Some((
                        Err(Error::streaming(
                            format!("Error in HTTP stream: {e}"),
                            Some(Box::new(e)),
                        )),
                        state,
                    ));
                }
                None => {
                    state.eof = true;
                    // A final event may lack its trailing blank line.
                    if state.buffer.iter().all(u8::is_ascii_whitespace) {
                        state.buffer.clear();
                    } else {
                        state.buffer.extend_from_slice(b"\n\n");
                    }
                }
            }
        }
    })
}

/// Remove one complete event from the front of the buffer.
fn take_event(buffer: &mut Vec<u8>) -> Option<Result<Frame>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let event: Vec<u8> = buffer.drain(..end + 2).collect();
    let text = match std::str::from_utf8(&event[..end]) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };

    let mut data: Option<String> = None;
    for line in text.lines() {
        // Comments, `event:`, `id:` and `retry:` fields carry nothing we use.
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    Some(Ok(match data {
        Some(data) => Frame::Data(data),
        None => Frame::Empty,
    }))
}

/// Decode one `data:` payload.  `Ok(None)` is the end-of-reply marker.
fn decode_data(data: &str) -> Result<Option<ChatCompletionChunk>> {
    let data = data.trim();
    if data == DONE_MARKER {
        return Ok(None);
    }
    if let Ok(body) = serde_json::from_str::<ApiErrorBody>(data) {
        let detail = body.error;
        return Err(Error::api(
            500,
            detail.error_type.or(Some("stream_error".to_string())),
            detail
                .message
                .unwrap_or_else(|| "the service reported an error mid-stream".to_string()),
            None,
        ));
    }
    serde_json::from_str::<ChatCompletionChunk>(data)
        .map(Some)
        .map_err(|e| {
            Error::serialization(
                format!("Failed to parse event JSON: {e}"),
                Some(Box::new(e)),
            )
        })
}
