//! Log output setup
//!
//! Logs go to stderr so that streamed replies on stdout stay clean.

use crate::cli::Verbosity;
use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity level
pub fn filter_for(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "chatstream=info,warn",
        Verbosity::VeryVerbose => "chatstream=debug,info",
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the verbosity flags. Calling this twice is
/// harmless; the second call is ignored.
pub fn init(verbosity: Verbosity, color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(verbosity == Verbosity::VeryVerbose)
        .try_init();
}
