//! One interactive session over one engine connection.
//!
//! Startup prints the banner, fetches the project model, discovers tasks and then
//! hands over to the [`Shell`] loop. Whatever happens after the connection was
//! opened, it is closed exactly once before [`run`] returns.

use std::collections::HashSet;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::completion::CompletionIndex;
use crate::discovery::discover_tasks;
use crate::engine::BuildEngine;
use crate::error::ShellError;
use crate::models::BuildRequest;
use crate::shell::{prompt_for, LineReader, LoopSummary, Shell};

/// Settings shared by every build in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Build arguments given at startup, without duplicates.
    pub arguments: Vec<String>,
    pub jvm_arguments: Vec<String>,
    pub color_output: bool,
}

impl SessionOptions {
    pub fn new(arguments: Vec<String>, jvm_arguments: Vec<String>, color_output: bool) -> Self {
        Self {
            arguments: dedup_arguments(arguments),
            jvm_arguments,
            color_output,
        }
    }

    fn build_template(&self) -> BuildRequest {
        BuildRequest {
            arguments: self.arguments.clone(),
            tasks: Vec::new(),
            jvm_arguments: self.jvm_arguments.clone(),
            color_output: self.color_output,
        }
    }
}

/// Drop repeated arguments, keeping the first occurrence of each.
pub fn dedup_arguments(arguments: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    arguments
        .into_iter()
        .filter(|arg| seen.insert(arg.clone()))
        .collect()
}

/// Run a session on `engine`, which must already be connected.
///
/// `make_reader` receives the completion index once tasks are discovered and
/// returns the line source for the loop. Banner and build output go to `out`,
/// failure reports to `diag`.
pub async fn run<E, R, F, W, D>(
    mut engine: E,
    options: &SessionOptions,
    make_reader: F,
    out: &mut W,
    diag: &mut D,
) -> Result<LoopSummary, ShellError>
where
    E: BuildEngine,
    R: LineReader,
    F: FnOnce(CompletionIndex) -> Result<R, ShellError>,
    W: AsyncWrite + Send + Unpin,
    D: AsyncWrite + Unpin,
{
    let result = drive(&mut engine, options, make_reader, out, diag).await;
    let closed = engine.close().await.map_err(ShellError::Close);

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            if let Err(close_error) = &closed {
                tracing::warn!("{}", close_error);
            }
            return Err(e);
        }
    };
    closed?;
    tracing::info!(
        invocations = summary.invocations,
        failures = summary.failures,
        "Session finished"
    );
    Ok(summary)
}

async fn drive<E, R, F, W, D>(
    engine: &mut E,
    options: &SessionOptions,
    make_reader: F,
    out: &mut W,
    diag: &mut D,
) -> Result<LoopSummary, ShellError>
where
    E: BuildEngine,
    R: LineReader,
    F: FnOnce(CompletionIndex) -> Result<R, ShellError>,
    W: AsyncWrite + Send + Unpin,
    D: AsyncWrite + Unpin,
{
    let environment = engine
        .describe_environment()
        .await
        .map_err(ShellError::Environment)?;

    let mut banner = String::new();
    banner.push_str(&format!("Connected to Gradle {}\n", environment.engine_version));
    banner.push_str(&format!("Java {}\n", environment.runtime_home.display()));
    banner.push_str(&format!(
        "JVM arguments {}\n",
        format_list(&environment.runtime_arguments)
    ));
    banner.push_str("Fetching task list (this may take a few seconds)...\n");
    banner.push_str(&format!("Arguments: {}\n", format_list(&options.arguments)));
    write_flush(out, &banner).await?;

    let project = engine
        .fetch_project(&options.arguments)
        .await
        .map_err(ShellError::ModelFetch)?;

    let discovery = discover_tasks(&project);
    write_flush(out, &format!("{}\n", discovery)).await?;

    let reader = make_reader(CompletionIndex::new(discovery.namespace))?;
    let mut shell = Shell::new(reader, prompt_for(&project), options.build_template());
    shell.run(engine, out, diag).await
}

async fn write_flush<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}

fn format_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}
