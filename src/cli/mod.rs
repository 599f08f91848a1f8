//! CLI module for chatstream
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, TargetArgs, Verbosity};
