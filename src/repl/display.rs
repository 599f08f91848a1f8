//! Display manager for the chat console
//!
//! Renders streamed replies incrementally, plus a spinner while the request
//! is connecting.

use crate::types::{ChatMessage, Role, SessionTarget};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::{self, Write};
use std::time::Duration;

/// Part of `content` not yet printed
///
/// Deltas carry the whole reply so far, so only the tail past `printed`
/// bytes is new. Falls back to the whole content if it no longer extends
/// what was printed.
pub fn unseen_suffix(content: &str, printed: usize) -> &str {
    content.get(printed..).unwrap_or(content)
}

/// Display manager for console UI
pub struct DisplayManager {
    spinner: Option<ProgressBar>,
    printed: usize,
    show_progress: bool,
    update_interval: Duration,
}

impl DisplayManager {
    pub fn new(show_progress: bool) -> Self {
        DisplayManager {
            spinner: None,
            printed: 0,
            show_progress,
            update_interval: Duration::from_millis(100),
        }
    }

    /// Show welcome banner
    pub fn show_banner(&self, version: &str, target: &SessionTarget) {
        let width = 60;
        println!("\n{}", "=".repeat(width).cyan());
        println!("{}", format!("  chatstream {}", version).bold().cyan());
        println!("{}", format!("  Talking to {}", target).dimmed());
        println!("{}\n", "=".repeat(width).cyan());
        println!(
            "Type a message (or {} for commands, {} to quit)\n",
            "/help".green(),
            "/exit".green()
        );
    }

    /// Spinner shown until the first delta arrives
    pub fn start_connecting(&mut self, target: &SessionTarget) {
        self.finish_current();
        self.printed = 0;
        if !self.show_progress {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Waiting for {}...", target));
        spinner.enable_steady_tick(self.update_interval);
        self.spinner = Some(spinner);
    }

    /// Clear the spinner if one is running
    pub fn finish_current(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print the new part of a growing reply
    pub fn show_delta(&mut self, content: &str) {
        self.finish_current();
        if content.len() < self.printed || !content.is_char_boundary(self.printed) {
            println!();
            self.printed = 0;
        }
        print!("{}", unseen_suffix(content, self.printed));
        let _ = io::stdout().flush();
        self.printed = content.len();
    }

    /// End the reply line after completion
    pub fn end_reply(&mut self, metadata: Option<&Value>, show_metadata: bool) {
        self.finish_current();
        if self.printed > 0 {
            println!();
        }
        if show_metadata {
            if let Some(metadata) = metadata {
                println!("{} {}", "metadata:".dimmed(), metadata.to_string().dimmed());
            }
        }
        self.printed = 0;
    }

    /// Report a failed reply; partial text stays on screen
    pub fn show_failure(&mut self, reason: &str) {
        self.finish_current();
        if self.printed > 0 {
            println!();
            println!("{} {}", "✗ Reply interrupted:".red().bold(), reason.red());
        } else {
            println!("{} {}", "✗".red().bold(), reason.red());
        }
        self.printed = 0;
    }

    /// Report a reply stopped by the user
    pub fn show_cancelled(&mut self) {
        self.finish_current();
        if self.printed > 0 {
            println!();
        }
        println!("{}", "(cancelled)".yellow());
        self.printed = 0;
    }

    /// Print one history message
    pub fn show_message(&self, message: &ChatMessage) {
        let label = match message.role {
            Role::User => "you".green().bold(),
            Role::Assistant => "assistant".cyan().bold(),
        };
        println!(
            "{} {} {}",
            message.created_at.format("%H:%M").to_string().dimmed(),
            label,
            message.content
        );
    }

    /// Display error message
    pub fn show_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error.red());
    }

    /// Display warning message
    pub fn show_warning(&self, warning: &str) {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    /// Display info message
    pub fn show_info(&self, info: &str) {
        println!("{} {}", "Info:".cyan(), info);
    }

    /// Clear screen
    pub fn clear_screen(&self) {
        print!("\x1B[2J\x1B[1;1H");
        let _ = io::stdout().flush();
    }
}
