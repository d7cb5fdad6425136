//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::fmt;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::OpenAi;
use crate::error::Result;
use crate::pipeline::ReplySettings;
use crate::retry::RetryConfig;

/// Default model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Default maximum tokens per reply.
pub const DEFAULT_MAX_TOKENS: u32 = 8000;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The instruction every conversation starts with.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a benevolent and helpful master bothichatva, \
a person who is able to reach nirvana but delays doing so out of compassion in order to save \
suffering beings. They often ask you both philosophical and earthly questions. You will answer \
the being in the language that they ask you, but always in a koan riddle format. The human \
being needs to study and interpret its true meaning by themselves.";

/// Command-line arguments for the bothichatva tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gpt-4o-mini)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 8000)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Root URL of an OpenAI-compatible API.
    #[arrrg(optional, "API base URL (default: https://api.openai.com/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Retries after a failed request.
    #[arrrg(optional, "Retries after a failed request (default: 3)", "N")]
    pub max_retries: Option<u32>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Log requests and stream handling to stderr.
    #[arrrg(flag, "Enable debug logging")]
    pub debug: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: String,

    /// The system message the conversation starts with.
    pub system_prompt: String,

    /// Sampling temperature sent with every request.
    pub temperature: f32,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// API root; `None` uses the hosted service.
    pub base_url: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Retry policy for opening a reply stream.
    pub retry: RetryConfig,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether debug logging is on.
    pub debug: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-4o-mini
    /// - Temperature: 0.8
    /// - Max tokens: 8000
    /// - Timeout: 60 seconds, 3 retries
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            use_color: true,
            debug: false,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Points the client at another OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The decoding parameters for each reply.
    pub fn reply_settings(&self) -> ReplySettings {
        ReplySettings::new(self.model.clone(), self.temperature, self.max_tokens)
    }

    /// Builds a client from the environment's credentials and this configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `OPENAI_API_KEY` is missing or the base URL is invalid.
    pub fn client(&self) -> Result<OpenAi> {
        Ok(
            OpenAi::with_options(None, self.base_url.clone(), Some(self.timeout))?
                .with_retry_config(self.retry.clone()),
        )
    }
}

impl fmt::Display for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current Configuration:")?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Max tokens: {}", self.max_tokens)?;
        writeln!(f, "  Temperature: {:.2}", self.temperature)?;
        writeln!(
            f,
            "  Base URL: {}",
            self.base_url.as_deref().unwrap_or("(default)")
        )?;
        writeln!(f, "  Timeout: {}s", self.timeout.as_secs())?;
        writeln!(
            f,
            "  Retries: {} (cooldown {:.1}s, backoff x{})",
            self.retry.max_retries,
            self.retry.cooldown.as_secs_f64(),
            self.retry.backoff
        )?;
        write!(f, "  System prompt: {}", self.system_prompt)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        let retry = match args.max_retries {
            Some(max_retries) => defaults.retry.clone().with_max_retries(max_retries),
            None => defaults.retry.clone(),
        };
        ChatConfig {
            model: args
                .model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.model.clone()),
            system_prompt: args
                .system
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.system_prompt.clone()),
            max_tokens: args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            base_url: args.base_url,
            timeout: args.timeout.map(Duration::from_secs).unwrap_or(DEFAULT_TIMEOUT),
            retry,
            use_color: !args.no_color,
            debug: args.debug,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.8);
        assert_eq!(config.max_tokens, 8000);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.cooldown, Duration::from_secs(2));
        assert_eq!(config.retry.backoff, 1.5);
        assert!(config.system_prompt.contains("koan riddle"));
        assert!(config.base_url.is_none());
        assert!(config.use_color);
        assert!(!config.debug);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from(ChatArgs::default());
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("gpt-4o".to_string()),
            system: Some("You are terse.".to_string()),
            max_tokens: Some(256),
            base_url: Some("http://localhost:8080/v1/".to_string()),
            max_retries: Some(0),
            timeout: Some(5),
            debug: true,
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.system_prompt, "You are terse.");
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1/"));
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.debug);
        assert!(!config.use_color);
    }

    #[test]
    fn blank_system_prompt_falls_back() {
        let args = ChatArgs {
            system: Some("   ".to_string()),
            ..ChatArgs::default()
        };
        assert_eq!(ChatConfig::from(args).system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_model("gpt-4o")
            .with_system_prompt("Test prompt")
            .with_temperature(0.2)
            .with_max_tokens(2048)
            .with_base_url("http://127.0.0.1:9/")
            .with_timeout(Duration::from_secs(1))
            .with_retry(RetryConfig::disabled())
            .without_color();

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.system_prompt, "Test prompt");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.base_url.as_deref(), Some("http://127.0.0.1:9/"));
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.retry.max_retries, 0);
        assert!(!config.use_color);

        let settings = config.reply_settings();
        assert_eq!(settings, ReplySettings::new("gpt-4o", 0.2, 2048));
    }

    #[test]
    fn config_displays_every_setting() {
        let config = ChatConfig::new()
            .with_system_prompt("Be brief.")
            .with_base_url("http://127.0.0.1:9/v1/");
        assert_eq!(
            config.to_string(),
            "Current Configuration:\n  Model: gpt-4o-mini\n  Max tokens: 8000\n  \
             Temperature: 0.80\n  Base URL: http://127.0.0.1:9/v1/\n  Timeout: 60s\n  \
             Retries: 3 (cooldown 2.0s, backoff x1.5)\n  System prompt: Be brief."
        );
    }
}
