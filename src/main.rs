//! chatstream - CLI entry point

use anyhow::{bail, Context, Result};
use chatstream::auth::{FileTokenStore, StaticToken, TokenProvider};
use chatstream::cli::{Args, Commands, Verbosity};
use chatstream::config::Config;
use chatstream::history::HistoryClient;
use chatstream::repl::{self, ChatRepl, DisplayManager};
use chatstream::streaming::{HttpTransport, StreamState, StreamingChatClient};
use chatstream::{logging, SessionTarget};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.clone()).context("loading configuration")?;
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
        config.validate()?;
    }

    let verbosity = effective_verbosity(&args, &config);
    if !config.telemetry.color_output {
        colored::control::set_override(false);
    }
    logging::init(verbosity, config.telemetry.color_output);

    match &args.command {
        Commands::Chat { target } => run_chat(&args, &config, target.target(), verbosity).await,
        Commands::Send { target, message } => {
            run_send(&args, &config, target.target(), message, verbosity).await
        }
        Commands::History { session } => show_history(&args, &config, session).await,
        Commands::Config { save } => {
            if *save {
                save_config(&args, &config)?;
            }
            show_config(&config, verbosity)
        }
    }
}

/// Flags win over the configured default
fn effective_verbosity(args: &Args, config: &Config) -> Verbosity {
    if args.quiet || args.verbose > 0 {
        args.verbosity()
    } else {
        Verbosity::from_name(&config.telemetry.default_verbosity).unwrap_or(Verbosity::Normal)
    }
}

fn token_provider(args: &Args, config: &Config) -> Arc<dyn TokenProvider> {
    match &args.token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(FileTokenStore::new(config.token_file())),
    }
}

fn build_client(config: &Config, tokens: Arc<dyn TokenProvider>) -> Result<StreamingChatClient> {
    let transport =
        HttpTransport::with_connect_timeout(config.endpoints(), tokens, config.connect_timeout())?;

    Ok(StreamingChatClient::new(transport)
        .with_policy(config.stream.concurrency)
        .with_event_map(config.event_map()?))
}

fn build_history(config: &Config, tokens: Arc<dyn TokenProvider>) -> Result<HistoryClient> {
    Ok(HistoryClient::with_path(
        &config.api.base_url,
        &config.api.history_path,
        tokens,
    )?)
}

async fn run_chat(
    args: &Args,
    config: &Config,
    target: SessionTarget,
    verbosity: Verbosity,
) -> Result<()> {
    let tokens = token_provider(args, config);
    let client = build_client(config, Arc::clone(&tokens))?;
    let history = build_history(config, tokens)?;

    let mut console = ChatRepl::new(
        client,
        history,
        target,
        verbosity,
        repl::default_history_file(),
    )?;
    console.run().await
}

async fn run_send(
    args: &Args,
    config: &Config,
    target: SessionTarget,
    message: &str,
    verbosity: Verbosity,
) -> Result<()> {
    let client = build_client(config, token_provider(args, config))?;
    let handle = client.send(target, message)?;

    let mut display = DisplayManager::new(verbosity.show_progress());
    match repl::render_stream(handle, None, &mut display, verbosity).await {
        StreamState::Completed => Ok(()),
        StreamState::Cancelled => bail!("reply cancelled"),
        state => bail!("reply ended in state {}", state),
    }
}

async fn show_history(args: &Args, config: &Config, session: &str) -> Result<()> {
    let history = build_history(config, token_provider(args, config))?;
    let messages = history.fetch(session).await?;

    let display = DisplayManager::new(false);
    if messages.is_empty() {
        display.show_info(&format!("Session {} has no messages", session));
    }
    for message in &messages {
        display.show_message(message);
    }
    Ok(())
}

/// Persist the effective configuration to `--config` or the default file
fn save_config(args: &Args, config: &Config) -> Result<()> {
    let Some(path) = args.config.clone().or_else(Config::default_path) else {
        bail!("no config file location; pass --config");
    };
    config
        .save(&path)
        .with_context(|| format!("saving configuration to {}", path.display()))?;
    println!("{} {}", "Saved configuration to".green(), path.display());
    Ok(())
}

fn show_config(config: &Config, verbosity: Verbosity) -> Result<()> {
    println!("{}", "chatstream configuration".bold().cyan());
    match Config::default_path() {
        Some(path) => println!("{} {}\n", "Default file:".dimmed(), path.display()),
        None => println!(),
    }

    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    println!("{}", rendered);
    println!("{} {}", "Effective verbosity:".dimmed(), verbosity.as_str());
    Ok(())
}
