//! Conversation memory.
//!
//! The memory is the ordered log of every message in one chat session and is sent in full as
//! the model's context on each turn.  It starts with exactly one system message and only ever
//! grows at the end: messages are never reordered, edited, or removed.  There is no limit on
//! its length; a conversation that outgrows the model's context window is rejected by the
//! service, not trimmed here.

use crate::error::{Error, Result};
use crate::types::{Message, Role};

/// The ordered, append-only message log of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMemory {
    messages: Vec<Message>,
}

impl ConversationMemory {
    /// Creates memory seeded with the system instruction.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the instruction is blank.
    pub fn new(system_prompt: impl Into<String>) -> Result<Self> {
        let system_prompt = system_prompt.into();
        if system_prompt.trim().is_empty() {
            return Err(Error::validation(
                "the system prompt must not be empty",
                Some("system_prompt".to_string()),
            ));
        }
        Ok(Self {
            messages: vec![Message::system(system_prompt)],
        })
    }

    /// Creates memory in `slot` unless it already holds some, and returns it.
    ///
    /// This is the entry point for callers that keep a session's memory in a long-lived slot
    /// and cannot tell whether it was set up yet.  Calling this again on the same slot leaves
    /// the existing conversation untouched, and the prompt passed later is ignored.
    /// [`ChatSession`](crate::chat::ChatSession) owns its memory outright and uses
    /// [`ConversationMemory::new`] instead.
    ///
    /// # Examples
    ///
    /// ```
    /// # use bothichatva::{ConversationMemory, Message};
    /// let mut slot = None;
    /// ConversationMemory::initialize(&mut slot, "Answer in koans.")?
    ///     .append(Message::user("Where is the moon?"))?;
    ///
    /// let memory = ConversationMemory::initialize(&mut slot, "Answer plainly.")?;
    /// assert_eq!(memory.len(), 2);
    /// assert_eq!(memory.system_message(), &Message::system("Answer in koans."));
    /// # Ok::<(), bothichatva::Error>(())
    /// ```
    pub fn initialize(
        slot: &mut Option<ConversationMemory>,
        system_prompt: impl Into<String>,
    ) -> Result<&mut ConversationMemory> {
        let memory = match slot.take() {
            Some(memory) => memory,
            None => Self::new(system_prompt)?,
        };
        Ok(slot.insert(memory))
    }

    /// Appends a user or assistant message.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty content or a second system message.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if message.role() == Role::System {
            return Err(Error::validation(
                "the conversation already has its system message",
                Some("role".to_string()),
            ));
        }
        if message.content().is_empty() {
            return Err(Error::validation(
                format!("{} message must not be empty", message.role()),
                Some("content".to_string()),
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Every message, system message first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The system message at index 0.
    pub fn system_message(&self) -> &Message {
        &self.messages[0]
    }

    /// The user and assistant messages in the order they were produced.
    pub fn turns(&self) -> &[Message] {
        &self.messages[1..]
    }

    /// The most recent message.
    pub fn last(&self) -> &Message {
        // the system message is never removed
        &self.messages[self.messages.len() - 1]
    }

    /// The number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the system message is always present.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "You are a patient guide.";

    #[test]
    fn new_memory_holds_only_the_system_message() {
        let memory = ConversationMemory::new(PROMPT).unwrap();
        assert_eq!(memory.len(), 1);
        assert!(!memory.is_empty());
        assert_eq!(memory.system_message(), &Message::system(PROMPT));
        assert_eq!(memory.last(), &Message::system(PROMPT));
        assert_eq!(memory.turns().len(), 0);
    }

    #[test]
    fn blank_system_prompt_rejected() {
        let err = ConversationMemory::new("  ").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut slot = None;
        ConversationMemory::initialize(&mut slot, PROMPT)
            .unwrap()
            .append(Message::user("hello"))
            .unwrap();

        let memory = ConversationMemory::initialize(&mut slot, "a different prompt").unwrap();
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.system_message().content(), PROMPT);
    }

    #[test]
    fn append_preserves_order() {
        let mut memory = ConversationMemory::new(PROMPT).unwrap();
        memory.append(Message::user("one")).unwrap();
        memory.append(Message::assistant("two")).unwrap();
        memory.append(Message::user("three")).unwrap();

        let contents: Vec<&str> = memory.messages().iter().map(Message::content).collect();
        assert_eq!(contents, vec![PROMPT, "one", "two", "three"]);
        assert_eq!(memory.turns().len(), 3);
        assert_eq!(memory.last(), &Message::user("three"));
    }

    #[test]
    fn append_rejects_system_and_empty_messages() {
        let mut memory = ConversationMemory::new(PROMPT).unwrap();
        assert!(memory.append(Message::system("again")).unwrap_err().is_validation());
        assert!(memory.append(Message::assistant("")).unwrap_err().is_validation());
        assert_eq!(memory.len(), 1);
    }
}
