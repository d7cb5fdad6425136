//! Chat application module for interactive conversations.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! conversation memory and reply pipeline. It supports:
//!
//! - Streaming replies with real-time display
//! - Slash commands for inspecting the session
//! - Configurable model, system prompt, and retry policy
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Conversation ownership and one reply at a time
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, ChatConfig, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};
pub use session::{ChatSession, SessionStats};
