//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the API.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Print the conversation so far.
    History,

    /// Display session statistics (message count, replies, failures).
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// A known command used wrongly, with the message to show.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input names a known command, or `None` if it should be
/// treated as a regular message.  Input that merely starts with `/`, such as a path, goes to
/// the model.
///
/// # Examples
///
/// ```
/// # use bothichatva::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/history").is_some());
/// assert!(parse_command("What is the sound of one hand?").is_none());
/// assert!(parse_command("/etc/hosts is what?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "history" => ChatCommand::History,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => return None,
    };

    if let Some(argument) = argument {
        return Some(ChatCommand::Invalid(format!(
            "/{command} takes no argument (got {argument:?})"
        )));
    }
    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /history               Show the conversation so far
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat
Anything else, including other text starting with /, is sent to the model. Ctrl+C stops a reply, Ctrl+D exits."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/QUIT"), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/status"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn known_command_with_argument_is_invalid() {
        assert!(matches!(
            parse_command("/quit now"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("no argument")
        ));
        assert!(matches!(
            parse_command("/history all"),
            Some(ChatCommand::Invalid(msg)) if msg.starts_with("/history")
        ));
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello"), None);
        assert_eq!(parse_command("what does a/b mean?"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn slash_text_goes_to_the_model() {
        assert_eq!(parse_command("/etc/hosts is what?"), None);
        assert_eq!(parse_command("/model gpt-4o"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command("/ why"), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/history"));
        assert!(help.contains("/stats"));
        assert!(help.contains("/config"));
    }
}
