//! Terminal line editing with task completion (rustyline).

use std::io;
use std::path::PathBuf;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};

use super::LineReader;
use crate::completion::CompletionIndex;

/// Tab completion backed by the discovered tasks.
pub struct TaskHelper {
    index: CompletionIndex,
}

impl TaskHelper {
    pub fn new(index: CompletionIndex) -> Self {
        Self { index }
    }
}

impl Completer for TaskHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let Some(completion) = self.index.complete(line, pos) else {
            return Ok((pos, Vec::new()));
        };

        let pairs = completion
            .candidates
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();
        Ok((completion.start, pairs))
    }
}

impl Hinter for TaskHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for TaskHelper {}

impl Validator for TaskHelper {}

impl Helper for TaskHelper {}

/// Interactive reader on the controlling terminal.
///
/// History is kept in memory for the session and, when a history file is given,
/// loaded at start and written back when the reader is dropped.
pub struct EditorReader {
    editor: Editor<TaskHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl EditorReader {
    pub fn new(index: CompletionIndex, history_file: Option<PathBuf>) -> rustyline::Result<Self> {
        let config = Config::builder()
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .build();
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(TaskHelper::new(index)));

        if let Some(path) = history_file.as_deref().filter(|path| path.exists()) {
            if let Err(e) = editor.load_history(path) {
                tracing::warn!("Failed to load history from {}: {}", path.display(), e);
            }
        }

        Ok(Self {
            editor,
            history_file,
        })
    }

    /// Add a submitted line to history unless it is blank.
    fn record(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if let Err(e) = self.editor.add_history_entry(line) {
            tracing::warn!("Failed to record history: {}", e);
        }
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        loop {
            // The editor blocks on the terminal; keep it off the async worker's budget.
            let result = tokio::task::block_in_place(|| self.editor.readline(prompt));
            match result {
                Ok(line) => {
                    self.record(&line);
                    return Ok(Some(line));
                }
                // Ctrl-C drops the line being edited.
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(None),
                Err(ReadlineError::Io(e)) => return Err(e),
                Err(e) => return Err(io::Error::other(e.to_string())),
            }
        }
    }
}

impl Drop for EditorReader {
    fn drop(&mut self) {
        let Some(path) = self.history_file.as_deref() else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }
        if let Err(e) = self.editor.save_history(path) {
            tracing::warn!("Failed to save history to {}: {}", path.display(), e);
        }
    }
}
