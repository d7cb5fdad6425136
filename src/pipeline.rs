//! The reply pipeline.
//!
//! One turn of a conversation is two steps.  [`accept_input`] sanitizes the raw text and
//! appends it to memory as a user message.  [`ReplyStream::open`] then sends all of memory to a
//! [`CompletionService`] and hands back a pull-based stream of reply fragments.  The reply is
//! buffered while it streams and only appended to memory once the service signals the end, so
//! memory never holds a partial assistant message.

use std::mem;
use std::time::Instant;

use futures::StreamExt;

use crate::client::{CompletionService, FragmentStream};
use crate::error::{Error, Result};
use crate::memory::ConversationMemory;
use crate::observability::{REPLIES_COMMITTED, REPLIES_FAILED, REPLY_DURATION, REPLY_FRAGMENTS};
use crate::sanitize::{is_blank, sanitize};
use crate::types::{ChatCompletionParams, Message};

/// Fixed decoding parameters sent with every reply request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplySettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ReplySettings {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    /// A streaming request carrying every message in `memory`.
    pub fn request(&self, memory: &ConversationMemory) -> ChatCompletionParams {
        ChatCompletionParams::new(
            self.model.clone(),
            memory.messages().to_vec(),
            self.temperature,
            self.max_tokens,
        )
        .streaming()
    }
}

/// Sanitize `raw` and append it to `memory` as a user message.
///
/// Returns `Ok(None)` without touching memory when the input is empty or whitespace.
pub fn accept_input<'a>(
    memory: &'a mut ConversationMemory,
    raw: &str,
) -> Result<Option<&'a Message>> {
    let content = sanitize(raw);
    if is_blank(&content) {
        return Ok(None);
    }
    memory.append(Message::user(content))?;
    Ok(Some(memory.last()))
}

enum ReplyState {
    Streaming(FragmentStream),
    Committed,
    Failed,
}

/// A reply being streamed into a conversation.
///
/// The stream borrows the memory mutably for its whole life, so a session has at most one reply
/// in flight.  Dropping it before the end discards the partial reply and closes the connection.
pub struct ReplyStream<'a> {
    memory: &'a mut ConversationMemory,
    state: ReplyState,
    buffer: String,
    fragments: usize,
    started: Instant,
}

impl<'a> ReplyStream<'a> {
    /// Ask `service` for a reply to everything in `memory`.
    pub async fn open<S>(
        service: &S,
        memory: &'a mut ConversationMemory,
        settings: &ReplySettings,
    ) -> Result<ReplyStream<'a>>
    where
        S: CompletionService + ?Sized,
    {
        let started = Instant::now();
        let params = settings.request(memory);
        let fragments = match service.stream_chat(params).await {
            Ok(fragments) => fragments,
            Err(err) => {
                REPLIES_FAILED.click();
                tracing::warn!(error = %err, "could not start reply");
                return Err(err);
            }
        };
        Ok(ReplyStream {
            memory,
            state: ReplyState::Streaming(fragments),
            buffer: String::new(),
            fragments: 0,
            started,
        })
    }

    /// Pull the next fragment of the reply.
    ///
    /// Returns `None` once the reply has been committed to memory or has failed.  The error that
    /// ends a failed reply is returned exactly once; nothing is committed in that case.
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        loop {
            let ReplyState::Streaming(fragments) = &mut self.state else {
                return None;
            };
            match fragments.next().await {
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    REPLY_FRAGMENTS.click();
                    self.fragments += 1;
                    self.buffer.push_str(&fragment);
                    return Some(Ok(fragment));
                }
                Some(Err(err)) => {
                    self.fail(&err);
                    return Some(Err(err));
                }
                None => return self.commit().err().map(Err),
            }
        }
    }

    /// Drain the rest of the stream and return the committed reply.
    pub async fn collect(mut self) -> Result<String> {
        while let Some(fragment) = self.next_fragment().await {
            fragment?;
        }
        if self.is_committed() {
            Ok(mem::take(&mut self.buffer))
        } else {
            Err(Error::abort("the reply was already abandoned"))
        }
    }

    /// The text received so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// True once the reply has been appended to memory.
    pub fn is_committed(&self) -> bool {
        matches!(self.state, ReplyState::Committed)
    }

    fn commit(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            let err = Error::malformed_response("the service ended the reply without any text");
            self.fail(&err);
            return Err(err);
        }
        if let Err(err) = self.memory.append(Message::assistant(self.buffer.clone())) {
            self.fail(&err);
            return Err(err);
        }
        self.state = ReplyState::Committed;
        REPLIES_COMMITTED.click();
        REPLY_DURATION.add(self.started.elapsed().as_secs_f64());
        tracing::debug!(
            fragments = self.fragments,
            bytes = self.buffer.len(),
            "reply committed"
        );
        Ok(())
    }

    fn fail(&mut self, err: &Error) {
        self.state = ReplyState::Failed;
        REPLIES_FAILED.click();
        tracing::warn!(
            error = %err,
            kind = %err.kind(),
            discarded_bytes = self.buffer.len(),
            "reply failed"
        );
    }
}

impl Drop for ReplyStream<'_> {
    fn drop(&mut self) {
        if let ReplyState::Streaming(_) = self.state {
            REPLIES_FAILED.click();
            tracing::info!(
                discarded_bytes = self.buffer.len(),
                "reply abandoned before completion"
            );
        }
    }
}
