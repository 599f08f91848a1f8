//! Built-in console commands
//!
//! Anything starting with `/` is a command; everything else is sent as a
//! chat message.

use colored::*;

/// Console command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Show the local conversation, optionally only the last n messages
    History { limit: Option<usize> },
    /// Replace local messages with the server's history
    Reconcile,
    Status,
    Clear,
    Exit,
    Unknown { input: String },
}

/// Check if input is a console command
pub fn is_command(input: &str) -> bool {
    input.trim_start().starts_with('/')
}

/// Command parser and help text
#[derive(Debug, Default)]
pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        CommandHandler
    }

    /// Parse input string into a command
    pub fn parse(&self, input: &str) -> Command {
        let trimmed = input.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Unknown {
                input: input.to_string(),
            };
        };

        let parts: Vec<&str> = rest.split_whitespace().collect();
        let Some(name) = parts.first() else {
            return Command::Unknown {
                input: input.to_string(),
            };
        };

        match name.to_lowercase().as_str() {
            "help" | "h" => Command::Help,
            "exit" | "quit" | "q" => Command::Exit,
            "history" => Command::History {
                limit: parts.get(1).and_then(|s| s.parse().ok()),
            },
            "reconcile" | "sync" => Command::Reconcile,
            "status" => Command::Status,
            "clear" | "cls" => Command::Clear,
            _ => Command::Unknown {
                input: input.to_string(),
            },
        }
    }

    /// Display help information
    pub fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        let commands = [
            ("/help, /h", "Show this help message"),
            ("/history [n]", "Show the conversation (last n messages)"),
            ("/reconcile, /sync", "Reload messages from the server"),
            ("/status", "Show target and stream state"),
            ("/clear, /cls", "Clear screen"),
            ("/exit, /quit, /q", "Exit the console"),
        ];

        for (cmd, desc) in commands {
            println!("  {:<22} {}", cmd.green(), desc);
        }
        println!("\nCtrl-C while a reply is streaming stops that reply.\n");
    }
}
