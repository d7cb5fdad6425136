// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod sanitize;
pub mod sse;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports
pub use client::{CompletionService, FragmentStream, OpenAi};
pub use error::{Error, ErrorKind, Result};
pub use memory::ConversationMemory;
pub use observability::register_biometrics;
pub use pipeline::{ReplySettings, ReplyStream, accept_input};
pub use render::{PlainTextRenderer, Renderer};
pub use retry::RetryConfig;
pub use sanitize::{sanitize, unescape};
pub use types::*;
