//! Output rendering for the chat front-end.
//!
//! The [`Renderer`] trait is the boundary between a chat session and whatever displays it.  A
//! session hands it the history when it starts, the user's message once it has been appended,
//! the reply text as it streams, and error text when a reply fails.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::sanitize::unescape;
use crate::types::{Message, Role};

/// ANSI escape code for dim text (used for the system message).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for yellow text (used for informational lines).
const ANSI_YELLOW: &str = "\x1b[33m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording output in tests
pub trait Renderer: Send {
    /// Print the whole conversation, e.g. when a session starts.
    fn print_history(&mut self, messages: &[Message]) {
        for message in messages {
            self.print_message(message);
        }
    }

    /// Print one complete message.
    fn print_message(&mut self, message: &Message);

    /// Called once the user's message has been appended to memory.
    fn print_user(&mut self, message: &Message);

    /// Called before the first fragment of a reply.
    fn start_response(&mut self) {}

    /// Print a chunk of reply text.
    ///
    /// This is called incrementally as fragments arrive from the service.
    fn print_text(&mut self, text: &str);

    /// Called when a reply is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer writes directly to stdout (errors to stderr).  Escaped markup in stored
/// messages is shown as the characters the user typed.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn label(&self, role: Role) -> String {
        let name = match role {
            Role::System => "System",
            Role::User => "You",
            Role::Assistant => "Bodhisattva",
        };
        if !self.use_color {
            return format!("{name}:");
        }
        let color = match role {
            Role::System => ANSI_DIM,
            Role::User => ANSI_GREEN,
            Role::Assistant => ANSI_CYAN,
        };
        format!("{ANSI_BOLD}{color}{name}:{ANSI_RESET}")
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_message(&mut self, message: &Message) {
        let label = self.label(message.role());
        let content = unescape(message.content());
        if self.use_color && message.role() == Role::System {
            println!("{label} {ANSI_DIM}{content}{ANSI_RESET}\n");
        } else {
            println!("{label} {content}\n");
        }
        self.flush();
    }

    fn print_user(&mut self, _: &Message) {
        // The line editor has already echoed what was typed.
    }

    fn start_response(&mut self) {
        let label = self.label(Role::Assistant);
        println!("{label}");
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn finish_response(&mut self) {
        println!("\n");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        if self.use_color {
            eprintln!("\n{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("\nError: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        if self.use_color {
            println!("{ANSI_YELLOW}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
    }

    fn print_interrupted(&mut self) {
        println!("\n[interrupted]");
        self.flush();
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
        assert!(!renderer.should_interrupt());
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
        assert_eq!(renderer.label(Role::User), "You:");
        assert_eq!(renderer.label(Role::Assistant), "Bodhisattva:");
    }

    #[test]
    fn labels_are_colored() {
        let renderer = PlainTextRenderer::new();
        let label = renderer.label(Role::User);
        assert!(label.starts_with(ANSI_BOLD));
        assert!(label.ends_with(ANSI_RESET));
    }

    #[test]
    fn interrupt_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let renderer = PlainTextRenderer::with_color(false).with_interrupt(flag.clone());
        assert!(!renderer.should_interrupt());
        flag.store(true, Ordering::Relaxed);
        assert!(renderer.should_interrupt());
    }
}
