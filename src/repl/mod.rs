//! Interactive chat console
//!
//! Reads messages with rustyline, streams each reply to the terminal, and
//! keeps a `Conversation` in step with the notifications. Ctrl-C while a reply
//! is streaming cancels that reply only; the console keeps running.

pub mod commands;
pub mod display;
pub mod input;

use anyhow::Result;
use std::future::Future;
use std::path::PathBuf;

use crate::cli::Verbosity;
use crate::history::HistoryClient;
use crate::repl::commands::{is_command, Command, CommandHandler};
use crate::repl::input::{Input, InputHandler};
use crate::streaming::{Notification, StreamHandle, StreamState, StreamingChatClient};
use crate::types::{Conversation, SessionTarget};

pub use crate::repl::display::DisplayManager;

/// Default console history file
pub fn default_history_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chatstream").join("history"))
}

/// Run `work` unless `interrupt` resolves first
///
/// Returns `None` when interrupted; `work` is dropped at that point.
pub async fn until_interrupted<F, I>(work: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        output = work => Some(output),
        _ = interrupt => None,
    }
}

/// Resolves on Ctrl-C
///
/// The SIGINT handler stays installed for the life of the process, so every
/// long wait in the console must race against this.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Print a stream to the terminal until it ends
///
/// Applies every notification to `conversation` when one is given. If the
/// stream ends without the conversation seeing its terminal notification,
/// the exchange is abandoned so the next `begin` is not refused. Returns the
/// final stream state.
pub async fn render_stream(
    mut handle: StreamHandle,
    mut conversation: Option<&mut Conversation>,
    display: &mut DisplayManager,
    verbosity: Verbosity,
) -> StreamState {
    display.start_connecting(handle.target());

    loop {
        let notification = match until_interrupted(handle.next(), ctrl_c()).await {
            Some(Some(notification)) => notification,
            Some(None) => break,
            None => {
                handle.cancel();
                break;
            }
        };

        if let Some(conversation) = conversation.as_deref_mut() {
            if let Err(err) = conversation.apply(&notification) {
                tracing::warn!(error = %err, "conversation rejected notification");
            }
        }

        match &notification {
            Notification::Delta { content } => display.show_delta(content),
            Notification::Completed { metadata } => {
                display.end_reply(metadata.as_ref(), verbosity.show_events())
            }
            Notification::Failed(err) => display.show_failure(&err.reason()),
        }
    }

    // A cancel racing the terminal notification leaves the exchange open
    if let Some(conversation) = conversation {
        if conversation.is_pending() {
            conversation.abandon();
        }
    }

    let state = handle.state();
    if state == StreamState::Cancelled {
        display.show_cancelled();
    } else {
        display.finish_current();
    }

    handle.join().await;
    state
}

/// Chat console bound to one session or task
pub struct ChatRepl {
    client: StreamingChatClient,
    history: HistoryClient,
    conversation: Conversation,
    input: InputHandler,
    commands: CommandHandler,
    display: DisplayManager,
    verbosity: Verbosity,
}

impl ChatRepl {
    pub fn new(
        client: StreamingChatClient,
        history: HistoryClient,
        target: SessionTarget,
        verbosity: Verbosity,
        history_file: Option<PathBuf>,
    ) -> Result<Self> {
        let mut input = match history_file {
            Some(path) => InputHandler::with_history(path)?,
            None => InputHandler::new()?,
        };
        input.set_prompt(format!("{}> ", target.id()));

        Ok(ChatRepl {
            client,
            history,
            conversation: Conversation::new(target),
            input,
            commands: CommandHandler::new(),
            display: DisplayManager::new(verbosity.show_progress()),
            verbosity,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run until `/exit` or Ctrl-D
    pub async fn run(&mut self) -> Result<()> {
        if self.verbosity != Verbosity::Quiet {
            self.display
                .show_banner(env!("CARGO_PKG_VERSION"), self.conversation.target());
        }
        self.reconcile(false).await;

        loop {
            let line = match self.input.read_line()? {
                Input::Line(line) => line,
                Input::Interrupted => continue,
                Input::Eof => break,
            };

            if line.is_empty() {
                continue;
            }

            if is_command(&line) {
                let command = self.commands.parse(&line);
                if !self.execute(command).await {
                    break;
                }
                continue;
            }

            self.exchange(&line).await;
        }

        if let Err(err) = self.input.save_history() {
            tracing::warn!(error = %err, "could not save input history");
        }
        Ok(())
    }

    /// Send one message and stream its reply
    async fn exchange(&mut self, text: &str) {
        if let Err(err) = self.conversation.begin(text) {
            self.display.show_error(&err.reason());
            return;
        }

        let handle = match self
            .client
            .send(self.conversation.target().clone(), text)
        {
            Ok(handle) => handle,
            Err(err) => {
                self.conversation.abandon();
                self.display.show_error(&err.reason());
                return;
            }
        };

        let state = render_stream(
            handle,
            Some(&mut self.conversation),
            &mut self.display,
            self.verbosity,
        )
        .await;

        if state == StreamState::Completed {
            self.reconcile(false).await;
        }
    }

    /// Execute a command; returns false to leave the console
    async fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Help => self.commands.show_help(),
            Command::History { limit } => {
                let messages = self.conversation.messages();
                let skip = limit.map_or(0, |n| messages.len().saturating_sub(n));
                if messages.is_empty() {
                    self.display.show_info("No messages yet");
                }
                for message in &messages[skip..] {
                    self.display.show_message(message);
                }
            }
            Command::Reconcile => self.reconcile(true).await,
            Command::Status => {
                let target = self.conversation.target();
                self.display.show_info(&format!(
                    "{} | {} messages | streaming: {}",
                    target,
                    self.conversation.messages().len(),
                    self.client.is_streaming(target)
                ));
                if let Some(reason) = self.conversation.last_error() {
                    self.display.show_warning(&format!("last reply failed: {}", reason));
                }
            }
            Command::Clear => self.display.clear_screen(),
            Command::Exit => return false,
            Command::Unknown { input } => {
                self.display
                    .show_error(&format!("Unknown command: {} (try /help)", input));
            }
        }
        true
    }

    /// Replace local messages with the server's history
    ///
    /// Tasks have no history endpoint; `explicit` reports that instead of
    /// staying silent. Ctrl-C abandons the fetch and leaves the local
    /// messages as they are.
    async fn reconcile(&mut self, explicit: bool) {
        let target = self.conversation.target().clone();
        let SessionTarget::Session(session_id) = &target else {
            if explicit {
                self.display
                    .show_warning("Task conversations have no server history");
            }
            return;
        };

        let Some(fetched) = until_interrupted(self.history.fetch(session_id), ctrl_c()).await else {
            self.display.show_warning("History load interrupted");
            return;
        };

        match fetched {
            Ok(messages) => match self.conversation.reconcile(messages) {
                Ok(replaced) => {
                    tracing::debug!(session = %session_id, replaced, "reconciled conversation");
                    if explicit {
                        self.display.show_info(&format!(
                            "Loaded {} messages from the server",
                            self.conversation.messages().len()
                        ));
                    }
                }
                Err(err) => self.display.show_warning(&err.reason()),
            },
            Err(err) => self
                .display
                .show_warning(&format!("Could not load history: {}", err.reason())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{pending, ready};

    #[tokio::test]
    async fn test_until_interrupted_returns_work_output() {
        assert_eq!(until_interrupted(ready(7), pending()).await, Some(7));
    }

    #[tokio::test]
    async fn test_until_interrupted_stops_pending_work() {
        let interrupted = until_interrupted(pending::<u32>(), ready(())).await;
        assert_eq!(interrupted, None);
    }

    #[tokio::test]
    async fn test_interrupted_history_fetch_leaves_messages() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let history =
            HistoryClient::new(&server.uri(), std::sync::Arc::new(crate::auth::NoToken)).unwrap();
        let fetched = until_interrupted(
            history.fetch("s1"),
            tokio::time::sleep(std::time::Duration::from_millis(50)),
        )
        .await;
        assert!(fetched.is_none());
    }
}
