//! The interactive read-build loop.
//!
//! Each line the user submits becomes exactly one build on the shared engine
//! connection. The loop does not read the next line until that build has
//! finished, and a failed build is reported and then forgotten. The loop ends
//! at end of input, or when the connection or the output stream breaks.

mod editor;

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

pub use editor::{EditorReader, TaskHelper};

use crate::engine::{BuildEngine, EngineError};
use crate::error::ShellError;
use crate::models::*;

/// Source of input lines.
pub trait LineReader {
    /// Show `prompt` and read one line. `Ok(None)` means input is exhausted.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// One line of input split into build arguments.
///
/// Tokens are separated by runs of whitespace; a blank line has no tokens and
/// asks the engine for its default tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    pub fn parse(line: &str) -> Self {
        Self {
            tokens: line.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_blank(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }
}

/// Prompt shown for `project` for the whole session.
pub fn prompt_for(project: &ProjectNode) -> String {
    format!("{}  > ", project.name)
}

/// Counts reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub invocations: usize,
    pub failures: usize,
}

/// The interactive loop over one engine connection.
pub struct Shell<R> {
    reader: R,
    prompt: String,
    template: BuildRequest,
}

impl<R: LineReader> Shell<R> {
    /// `template` carries the startup arguments every build shares; its task list
    /// is replaced by each submitted line.
    pub fn new(reader: R, prompt: String, template: BuildRequest) -> Self {
        Self {
            reader,
            prompt,
            template,
        }
    }

    /// Build request for one submitted line.
    pub fn request_for(&self, command: CommandLine) -> BuildRequest {
        BuildRequest {
            tasks: command.into_tokens(),
            ..self.template.clone()
        }
    }

    /// Read and run lines until input is exhausted.
    ///
    /// Build output goes to `out`; failure reports go to `diag`.
    pub async fn run<E, W, D>(
        &mut self,
        engine: &mut E,
        out: &mut W,
        diag: &mut D,
    ) -> Result<LoopSummary, ShellError>
    where
        E: BuildEngine,
        W: AsyncWrite + Send + Unpin,
        D: AsyncWrite + Unpin,
    {
        let mut summary = LoopSummary::default();

        while let Some(line) = self
            .reader
            .read_line(&self.prompt)
            .map_err(ShellError::Input)?
        {
            let command = CommandLine::parse(&line);
            if command.is_blank() {
                tracing::debug!("Blank line, running default tasks");
            }
            let request = self.request_for(command);
            tracing::debug!(tasks = ?request.tasks, "Running build");
            summary.invocations += 1;

            match engine.run_build(&request, out).await {
                Ok(InvocationOutcome::Completed) => {}
                Ok(InvocationOutcome::Failed(failure)) => {
                    summary.failures += 1;
                    report_failure(diag, &failure).await?;
                }
                Err(EngineError::Sink(e)) => return Err(ShellError::Output(e)),
                Err(e) if e.is_transport() => return Err(ShellError::ConnectionLost(e)),
                Err(e) => {
                    summary.failures += 1;
                    report_failure(diag, &BuildFailure::new(e.to_string())).await?;
                }
            }
        }

        tracing::debug!(
            invocations = summary.invocations,
            failures = summary.failures,
            "Input exhausted"
        );
        Ok(summary)
    }
}

async fn report_failure<D: AsyncWrite + Unpin>(
    diag: &mut D,
    failure: &BuildFailure,
) -> io::Result<()> {
    let report = format!("Build failed with an exception\n{}\n", failure);
    diag.write_all(report.as_bytes()).await?;
    diag.flush().await
}
