//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! memory and drives one streamed reply at a time.

use std::fmt;
use std::time::Duration;

use crate::Error;
use crate::chat::config::ChatConfig;
use crate::client::{CompletionService, OpenAi};
use crate::error::Result;
use crate::memory::ConversationMemory;
use crate::pipeline::{ReplyStream, accept_input};
use crate::render::Renderer;

/// A chat session that manages conversation state and API interactions.
///
/// The session owns its memory outright; it is created with the session and dropped with it.
pub struct ChatSession<S: CompletionService = OpenAi> {
    service: S,
    config: ChatConfig,
    memory: ConversationMemory,
    replies: u64,
    failures: u64,
    interruptions: u64,
}

/// How often a reply in flight checks the renderer's interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Resolves once the renderer asks to stop.
async fn wait_for_interrupt(renderer: &dyn Renderer) {
    while !renderer.should_interrupt() {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// The number of messages in the conversation, including the system message.
    pub message_count: usize,
    /// Replies that streamed to completion.
    pub replies: u64,
    /// Replies that failed to open or broke off.
    pub failures: u64,
    /// Replies stopped by the user.
    pub interruptions: u64,
    /// The maximum tokens per response.
    pub max_tokens: u32,
    /// The sampling temperature.
    pub temperature: f32,
    /// The system prompt.
    pub system_prompt: String,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session Statistics:")?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Messages: {}", self.message_count)?;
        writeln!(f, "  Replies: {}", self.replies)?;
        writeln!(f, "  Failed replies: {}", self.failures)?;
        write!(f, "  Interrupted replies: {}", self.interruptions)
    }
}

impl ChatSession<OpenAi> {
    /// Creates a new chat session with the given client and configuration.
    pub fn new(client: OpenAi, config: ChatConfig) -> Result<Self> {
        Self::with_service(client, config)
    }
}

impl<S: CompletionService> ChatSession<S> {
    /// Creates a new chat session backed by any completion service.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the configured system prompt is blank.
    pub fn with_service(service: S, config: ChatConfig) -> Result<Self> {
        let memory = ConversationMemory::new(config.system_prompt.clone())?;
        Ok(Self {
            service,
            config,
            memory,
            replies: 0,
            failures: 0,
            interruptions: 0,
        })
    }

    /// Sends a user message and streams the reply to the renderer.
    ///
    /// Returns `Ok(None)` when the input is blank; nothing is sent in that case.  On success the
    /// full reply has been appended to memory and is returned.  On failure the error has been
    /// shown through the renderer, the user's message stays in memory, and no partial reply is
    /// kept.  Stopping a reply through [`Renderer::should_interrupt`] returns an abort error.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply could not be started, broke off, or was interrupted.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<Option<String>> {
        let Some(message) = accept_input(&mut self.memory, user_input)? else {
            tracing::debug!("ignoring blank input");
            return Ok(None);
        };
        renderer.print_user(message);

        let settings = self.config.reply_settings();
        let opened = tokio::select! {
            biased;
            _ = wait_for_interrupt(&*renderer) => None,
            opened = ReplyStream::open(&self.service, &mut self.memory, &settings) => Some(opened),
        };
        let mut reply = match opened {
            Some(Ok(reply)) => reply,
            Some(Err(err)) => {
                self.failures += 1;
                renderer.print_error(&err.to_string());
                return Err(err);
            }
            None => return Err(Self::interrupted(&mut self.interruptions, renderer)),
        };

        renderer.start_response();
        loop {
            let fragment = tokio::select! {
                biased;
                _ = wait_for_interrupt(&*renderer) => None,
                fragment = reply.next_fragment() => Some(fragment),
            };
            match fragment {
                Some(Some(Ok(text))) => {
                    renderer.print_text(&text);
                    if renderer.should_interrupt() {
                        drop(reply);
                        return Err(Self::interrupted(&mut self.interruptions, renderer));
                    }
                }
                Some(Some(Err(err))) => {
                    self.failures += 1;
                    renderer.print_error(&err.to_string());
                    return Err(err);
                }
                Some(None) => break,
                None => {
                    drop(reply);
                    return Err(Self::interrupted(&mut self.interruptions, renderer));
                }
            }
        }

        let text = reply.text().to_string();
        drop(reply);
        self.replies += 1;
        renderer.finish_response();
        Ok(Some(text))
    }

    fn interrupted(interruptions: &mut u64, renderer: &mut dyn Renderer) -> Error {
        tracing::debug!("reply interrupted");
        *interruptions += 1;
        renderer.print_interrupted();
        Error::abort("reply interrupted by the user")
    }

    /// Prints the whole conversation, system message first.
    pub fn render_history(&self, renderer: &mut dyn Renderer) {
        renderer.print_history(self.memory.messages());
    }

    /// The conversation so far.
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.memory.len()
    }

    /// Returns the current model.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns a snapshot of session statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.config.model.clone(),
            message_count: self.memory.len(),
            replies: self.replies,
            failures: self.failures,
            interruptions: self.interruptions,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system_prompt: self.config.system_prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedService;
    use crate::types::{Message, Role};
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingRenderer {
        events: Vec<String>,
        interrupt_after: Option<usize>,
        interrupt_at: Option<Instant>,
        fragments: usize,
    }

    impl Renderer for RecordingRenderer {
        fn print_message(&mut self, message: &Message) {
            self.events
                .push(format!("message {}: {}", message.role(), message.content()));
        }

        fn print_user(&mut self, message: &Message) {
            self.events.push(format!("user: {}", message.content()));
        }

        fn start_response(&mut self) {
            self.events.push("start".to_string());
        }

        fn print_text(&mut self, text: &str) {
            self.fragments += 1;
            self.events.push(format!("text: {text}"));
        }

        fn finish_response(&mut self) {
            self.events.push("finish".to_string());
        }

        fn print_error(&mut self, error: &str) {
            self.events.push(format!("error: {error}"));
        }

        fn print_info(&mut self, info: &str) {
            self.events.push(format!("info: {info}"));
        }

        fn print_interrupted(&mut self) {
            self.events.push("interrupted".to_string());
        }

        fn should_interrupt(&self) -> bool {
            self.interrupt_after.is_some_and(|n| self.fragments >= n)
                || self.interrupt_at.is_some_and(|at| Instant::now() >= at)
        }
    }

    fn session(service: ScriptedService) -> ChatSession<ScriptedService> {
        let config = ChatConfig::new().with_system_prompt("Speak in koans.");
        ChatSession::with_service(service, config).unwrap()
    }

    #[test]
    fn new_session_holds_the_system_message() {
        let session = session(ScriptedService::new());
        assert_eq!(session.message_count(), 1);
        assert_eq!(
            session.memory().system_message(),
            &Message::system("Speak in koans.")
        );
        assert_eq!(session.model(), "gpt-4o-mini");
    }

    #[test]
    fn blank_system_prompt_is_rejected() {
        let config = ChatConfig::new().with_system_prompt("");
        let result = ChatSession::with_service(ScriptedService::new(), config);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn streamed_reply_reaches_renderer_and_memory() {
        let mut session = session(ScriptedService::new().reply(&["Ask ", "the ", "sky."]));
        let mut renderer = RecordingRenderer::default();
        let reply = session
            .send_streaming("Why is the sky blue?", &mut renderer)
            .await
            .unwrap();

        assert_eq!(reply.as_deref(), Some("Ask the sky."));
        assert_eq!(
            renderer.events,
            vec![
                "user: Why is the sky blue?",
                "start",
                "text: Ask ",
                "text: the ",
                "text: sky.",
                "finish",
            ]
        );
        assert_eq!(session.message_count(), 3);
        assert_eq!(session.memory().last(), &Message::assistant("Ask the sky."));
        assert_eq!(session.stats().replies, 1);
    }

    #[tokio::test]
    async fn request_uses_configured_parameters() {
        let mut session = session(ScriptedService::new().reply(&["ok"]));
        let mut renderer = RecordingRenderer::default();
        session.send_streaming("hi", &mut renderer).await.unwrap();

        let requests = session.service.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].stream);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].temperature, 0.8);
        assert_eq!(requests[0].max_tokens, 8000);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut session = session(ScriptedService::new());
        let mut renderer = RecordingRenderer::default();
        assert_eq!(session.send_streaming("  ", &mut renderer).await.unwrap(), None);
        assert!(renderer.events.is_empty());
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.service.calls(), 0);
    }

    #[tokio::test]
    async fn markup_is_escaped_before_storage() {
        let mut session = session(ScriptedService::new().reply(&["Hm."]));
        let mut renderer = RecordingRenderer::default();
        session.send_streaming("<script>", &mut renderer).await.unwrap();
        assert_eq!(session.memory().turns()[0], Message::user("&lt;script&gt;"));
        assert_eq!(renderer.events[0], "user: &lt;script&gt;");
    }

    #[tokio::test]
    async fn failure_is_reported_and_session_continues() {
        let service = ScriptedService::new()
            .reply_then_fail(&["partial"], Error::connection("connection reset", None))
            .reply(&["Again."]);
        let mut session = session(service);
        let mut renderer = RecordingRenderer::default();

        let err = session
            .send_streaming("first", &mut renderer)
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(renderer.events.last().unwrap(), "error: Connection error: connection reset");
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.memory().last().role(), Role::User);

        let reply = session.send_streaming("second", &mut renderer).await.unwrap();
        assert_eq!(reply.as_deref(), Some("Again."));
        assert_eq!(session.message_count(), 4);

        let stats = session.stats();
        assert_eq!(stats.replies, 1);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn open_failure_is_reported() {
        let service = ScriptedService::new().fail_to_open(Error::authentication("bad key"));
        let mut session = session(service);
        let mut renderer = RecordingRenderer::default();
        let err = session.send_streaming("hi", &mut renderer).await.unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(
            renderer.events,
            vec!["user: hi", "error: Authentication error: bad key"]
        );
    }

    #[tokio::test]
    async fn interrupt_stops_the_reply_without_committing() {
        let mut session = session(ScriptedService::new().reply(&["one ", "two ", "three"]));
        let mut renderer = RecordingRenderer {
            interrupt_after: Some(1),
            ..RecordingRenderer::default()
        };
        let err = session.send_streaming("count", &mut renderer).await.unwrap_err();
        assert!(err.is_abort());
        assert_eq!(
            renderer.events,
            vec!["user: count", "start", "text: one ", "interrupted"]
        );
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.stats().interruptions, 1);
    }

    #[test]
    fn history_renders_every_message() {
        let session = session(ScriptedService::new());
        let mut renderer = RecordingRenderer::default();
        session.render_history(&mut renderer);
        assert_eq!(renderer.events, vec!["message system: Speak in koans."]);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_reaches_a_stalled_reply() {
        let mut session = session(ScriptedService::new().reply_then_stall(&["Listen "]));
        let mut renderer = RecordingRenderer {
            interrupt_at: Some(Instant::now() + Duration::from_secs(2)),
            ..RecordingRenderer::default()
        };
        let err = session.send_streaming("to what?", &mut renderer).await.unwrap_err();
        assert!(err.is_abort());
        assert_eq!(
            renderer.events,
            vec!["user: to what?", "start", "text: Listen ", "interrupted"]
        );
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.stats().interruptions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_reaches_a_reply_that_never_opens() {
        let mut session = session(ScriptedService::new().never_open().reply(&["Here."]));
        let mut renderer = RecordingRenderer {
            interrupt_at: Some(Instant::now() + Duration::from_secs(1)),
            ..RecordingRenderer::default()
        };
        let err = session.send_streaming("anyone?", &mut renderer).await.unwrap_err();
        assert!(err.is_abort());
        assert_eq!(renderer.events, vec!["user: anyone?", "interrupted"]);
        let stats = session.stats();
        assert_eq!(stats.interruptions, 1);
        assert_eq!(stats.failures, 0);

        renderer.interrupt_at = None;
        let reply = session.send_streaming("again", &mut renderer).await.unwrap();
        assert_eq!(reply.as_deref(), Some("Here."));
        assert_eq!(session.message_count(), 4);
    }

    #[tokio::test]
    async fn stats_display_counts_outcomes() {
        let service = ScriptedService::new()
            .reply(&["Yes."])
            .fail_to_open(Error::authentication("bad key"));
        let mut session = session(service);
        let mut renderer = RecordingRenderer::default();
        session.send_streaming("one", &mut renderer).await.unwrap();
        session.send_streaming("two", &mut renderer).await.unwrap_err();
        assert_eq!(
            session.stats().to_string(),
            "Session Statistics:\n  Model: gpt-4o-mini\n  Messages: 4\n  Replies: 1\n  Failed replies: 1\n  Interrupted replies: 0"
        );
    }
}
