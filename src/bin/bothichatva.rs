//! Interactive chat with a koan-speaking bodhisattva.
//!
//! This binary provides a streaming REPL interface to an OpenAI-compatible
//! chat-completion API.  The conversation lives only as long as the process.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings (needs OPENAI_API_KEY)
//! bothichatva
//!
//! # Specify a model
//! bothichatva --model gpt-4o
//!
//! # Set a different system prompt
//! bothichatva --system "You are a helpful coding assistant"
//!
//! # Disable colors (useful for piping output)
//! bothichatva --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/history` - Show the conversation so far
//! - `/stats` - Show session statistics
//! - `/config` - Show current configuration
//! - `/quit` - Exit the application

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use bothichatva::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};

/// Main entry point for the bothichatva application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("bothichatva [OPTIONS]");
    let config = ChatConfig::from(args);
    init_logging(config.debug);

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut renderer =
        PlainTextRenderer::with_color(config.use_color).with_interrupt(interrupted.clone());

    // Credentials are checked before anything interactive starts.
    let client = match config.client() {
        Ok(client) => client,
        Err(err) => {
            renderer.print_error(&err.to_string());
            process::exit(1);
        }
    };
    let mut session = match ChatSession::new(client, config) {
        Ok(session) => session,
        Err(err) => {
            renderer.print_error(&err.to_string());
            process::exit(1);
        }
    };
    let mut rl = DefaultEditor::new()?;

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    renderer.print_info(&format!("Bothichatva (model: {})", session.model()));
    renderer.print_info("Type /help for commands, /quit to exit\n");
    session.render_history(&mut renderer);

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            print_block(&mut renderer, help_text());
                        }
                        ChatCommand::History => {
                            session.render_history(&mut renderer);
                        }
                        ChatCommand::Stats => {
                            print_block(&mut renderer, &session.stats().to_string());
                        }
                        ChatCommand::ShowConfig => {
                            print_block(&mut renderer, &session.config().to_string());
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - errors have already been shown by the session
                if let Err(err) = session.send_streaming(line, &mut renderer).await
                    && !err.is_abort()
                {
                    tracing::debug!(error = %err, "reply failed");
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

/// Log to stderr.  `RUST_LOG` wins over `--debug`.
fn init_logging(debug: bool) {
    let default = if debug { "warn,bothichatva=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Show a multi-line block through the renderer, indented under the prompt.
fn print_block(renderer: &mut dyn Renderer, text: &str) {
    for line in text.lines() {
        renderer.print_info(&format!("    {line}"));
    }
}
