//! Command-line argument parsing for chatstream
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use crate::types::SessionTarget;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chatstream - stream chat replies from a generation backend
#[derive(Parser, Debug)]
#[command(name = "chatstream")]
#[command(version)]
#[command(about = "Stream chat replies from an event-stream generation backend", long_about = None)]
pub struct Args {
    /// Backend base URL (overrides the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Bearer token (overrides the token file)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only the reply and errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Conversation a command talks to
#[derive(clap::Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// Knowledge-base chat session id
    #[arg(long)]
    pub session: Option<String>,

    /// Database-design task id
    #[arg(long)]
    pub task: Option<String>,
}

impl TargetArgs {
    pub fn target(&self) -> SessionTarget {
        match (&self.session, &self.task) {
            (_, Some(task)) => SessionTarget::Task(task.clone()),
            (Some(session), None) => SessionTarget::Session(session.clone()),
            // clap enforces exactly one of the two
            (None, None) => SessionTarget::Session(String::new()),
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat console
    Chat {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Send one message and print the streamed reply
    Send {
        #[command(flatten)]
        target: TargetArgs,

        /// Message text
        #[arg(value_name = "MESSAGE")]
        message: String,
    },

    /// Print the server-recorded history of a session
    History {
        /// Session id
        #[arg(value_name = "SESSION")]
        session: String,
    },

    /// Display current configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Parse the config-file spelling
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "quiet" => Some(Verbosity::Quiet),
            "normal" => Some(Verbosity::Normal),
            "verbose" => Some(Verbosity::Verbose),
            "very_verbose" => Some(Verbosity::VeryVerbose),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Check if should show the connecting spinner
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show stream summaries
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}
