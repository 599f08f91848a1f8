//! Input handler for the chat console using rustyline
//!
//! Provides readline editing with a persistent history file.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::History;
use rustyline::DefaultEditor;
use std::path::PathBuf;

/// One read from the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Trimmed line, possibly empty
    Line(String),
    /// Ctrl-C at the prompt
    Interrupted,
    /// Ctrl-D
    Eof,
}

/// Input handler managing the readline interface and history
pub struct InputHandler {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
    prompt: String,
}

impl InputHandler {
    /// Create new input handler without history persistence
    pub fn new() -> Result<Self> {
        Ok(InputHandler {
            editor: DefaultEditor::new()?,
            history_path: None,
            prompt: "> ".to_string(),
        })
    }

    /// Create input handler with persistent history
    ///
    /// History file: ~/.chatstream/history
    pub fn with_history(history_file: PathBuf) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;

        if history_file.exists() {
            if let Err(err) = editor.load_history(&history_file) {
                tracing::warn!(path = %history_file.display(), error = %err, "could not load input history");
            }
        }

        Ok(InputHandler {
            editor,
            history_path: Some(history_file),
            prompt: "> ".to_string(),
        })
    }

    /// Set custom prompt
    pub fn set_prompt(&mut self, prompt: String) {
        self.prompt = prompt;
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Read a line of input from the user
    pub fn read_line(&mut self) -> Result<Input> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = self.editor.add_history_entry(trimmed);
                }
                Ok(Input::Line(trimmed.to_string()))
            }
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(err) => Err(anyhow::anyhow!("Readline error: {}", err)),
        }
    }

    /// Save history to disk
    pub fn save_history(&mut self) -> Result<()> {
        if let Some(ref path) = self.history_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.editor.save_history(path)?;
        }
        Ok(())
    }

    /// Get history size
    pub fn history_len(&self) -> usize {
        self.editor.history().len()
    }
}
