//! Persistent client for the build engine.
//!
//! The engine runs as one child process for the whole session and speaks
//! line-delimited JSON-RPC over its stdin/stdout. Requests are strictly
//! sequential: every method takes `&mut self`, so a second request can never be
//! issued while one is still waiting for its response.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};

use super::protocol::{
    methods, ClientInfo, FetchModelParams, Incoming, InitializeParams, Message, OutputChunk,
    Request, RpcError,
};
use super::{find_build_root, BuildEngine};
use crate::models::*;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Engine client errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No build found in {} or any parent directory", .0.display())]
    NoBuildRoot(PathBuf),

    #[error("No build engine command configured")]
    NoEngineCommand,

    #[error("Build engine `{program}` not found: {reason}")]
    EngineNotFound { program: String, reason: String },

    #[error("Failed to start build engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build engine closed the connection")]
    Disconnected,

    #[error("I/O error talking to build engine: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed engine message: {0}")]
    Protocol(String),

    #[error("Failed to write build output: {0}")]
    Sink(#[source] std::io::Error),

    #[error("Engine error {code}: {message}")]
    Remote { code: i64, message: String },
}

impl EngineError {
    /// Whether the connection can no longer be trusted after this error.
    ///
    /// [`EngineError::Sink`] is not one: the engine is fine, the local output is not.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Io(_) | Self::Protocol(_))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<RpcError> for EngineError {
    fn from(e: RpcError) -> Self {
        Self::Remote {
            code: e.code,
            message: e.diagnostic(),
        }
    }
}

/// The single connection to a running build engine.
pub struct EngineConnection {
    project_dir: PathBuf,
    writer: BoxedWriter,
    reader: Lines<BufReader<BoxedReader>>,
    child: Option<Child>,
    next_id: u64,
}

impl EngineConnection {
    /// Start the engine for `project_dir` and complete the handshake.
    ///
    /// `command` is the engine program followed by its arguments. The child is
    /// killed if the connection is dropped without [`BuildEngine::close`].
    pub async fn connect(
        command: &[String],
        project_dir: &Path,
        installation: Option<&Path>,
    ) -> Result<Self, EngineError> {
        let build_root = find_build_root(project_dir)
            .ok_or_else(|| EngineError::NoBuildRoot(project_dir.to_path_buf()))?;
        tracing::debug!(build_root = %build_root.display(), "Found build root");

        let (program, args) = command.split_first().ok_or(EngineError::NoEngineCommand)?;
        let resolved = which::which(program).map_err(|e| EngineError::EngineNotFound {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(engine = %resolved.display(), "Starting build engine");
        let mut child = Command::new(&resolved)
            .args(args)
            .current_dir(project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(EngineError::Disconnected)?;

        let mut connection = Self::new(project_dir, Box::new(stdout), Box::new(stdin));
        connection.child = Some(child);
        connection.initialize(installation).await?;
        Ok(connection)
    }

    /// Connect over an already-open transport and complete the handshake.
    pub async fn from_transport<R, W>(
        reader: R,
        writer: W,
        project_dir: &Path,
        installation: Option<&Path>,
    ) -> Result<Self, EngineError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut connection = Self::new(project_dir, Box::new(reader), Box::new(writer));
        connection.initialize(installation).await?;
        Ok(connection)
    }

    fn new(project_dir: &Path, reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            writer,
            reader: BufReader::new(reader).lines(),
            child: None,
            next_id: 0,
        }
    }

    async fn initialize(&mut self, installation: Option<&Path>) -> Result<(), EngineError> {
        let project_dir = self.project_dir.clone();
        let params = InitializeParams {
            project_dir: &project_dir,
            installation,
            client: ClientInfo::default(),
        };
        let _: Value = self.call(methods::INITIALIZE, Some(params)).await?;
        tracing::debug!(project_dir = %project_dir.display(), "Engine handshake complete");
        Ok(())
    }

    /// Write one request line. Returns its id.
    async fn send<P: Serialize>(
        &mut self,
        method: &str,
        params: Option<P>,
    ) -> Result<u64, EngineError> {
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&Request::new(id, method, params))?;
        line.push('\n');

        tracing::debug!(id, method, "Engine request");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(id)
    }

    /// Read the next meaningful message, skipping blank lines.
    async fn receive(&mut self) -> Result<Message, EngineError> {
        loop {
            let line = self
                .reader
                .next_line()
                .await?
                .ok_or(EngineError::Disconnected)?;
            if line.trim().is_empty() {
                continue;
            }

            let incoming: Incoming = serde_json::from_str(&line)?;
            return incoming.into_message().ok_or_else(|| {
                EngineError::Protocol(format!("neither a response nor a notification: {}", line))
            });
        }
    }

    /// One request/response round-trip.
    async fn call<P: Serialize, T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<P>,
    ) -> Result<T, EngineError> {
        let id = self.send(method, params).await?;
        loop {
            match self.receive().await? {
                Message::Response {
                    id: response_id,
                    outcome,
                } if response_id == id => return Ok(serde_json::from_value(outcome?)?),
                Message::Response {
                    id: response_id, ..
                } => return Err(unexpected_response(id, response_id)),
                Message::Notification { method, .. } => {
                    tracing::debug!(method = %method, "Ignoring notification outside a build");
                }
            }
        }
    }
}

fn unexpected_response(expected: u64, got: u64) -> EngineError {
    EngineError::Protocol(format!("expected response {}, got {}", expected, got))
}

/// Interpret a notification as a chunk of build output, if it is one.
fn parse_output(method: String, params: Value) -> Option<OutputChunk> {
    if method != methods::BUILD_OUTPUT {
        tracing::debug!(method = %method, "Ignoring engine notification");
        return None;
    }
    match serde_json::from_value(params) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::warn!("Malformed build output notification: {}", e);
            None
        }
    }
}

#[async_trait]
impl BuildEngine for EngineConnection {
    async fn describe_environment(&mut self) -> Result<BuildEnvironment, EngineError> {
        self.call(methods::DESCRIBE_ENVIRONMENT, None::<()>).await
    }

    async fn fetch_project(&mut self, arguments: &[String]) -> Result<ProjectNode, EngineError> {
        self.call(methods::FETCH_MODEL, Some(FetchModelParams { arguments }))
            .await
    }

    async fn run_build(
        &mut self,
        request: &BuildRequest,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<InvocationOutcome, EngineError> {
        let id = self.send(methods::RUN_BUILD, Some(request)).await?;

        // Output is forwarded line by line as it arrives, not after the build ends.
        loop {
            match self.receive().await? {
                Message::Notification { method, params } => {
                    if let Some(chunk) = parse_output(method, params) {
                        tracing::trace!(
                            stream = chunk.stream.as_str(),
                            bytes = chunk.text.len(),
                            "Build output"
                        );
                        sink.write_all(chunk.text.as_bytes())
                            .await
                            .map_err(EngineError::Sink)?;
                        sink.flush().await.map_err(EngineError::Sink)?;
                    }
                }
                Message::Response {
                    id: response_id,
                    outcome,
                } if response_id == id => {
                    return Ok(match outcome {
                        Ok(_) => InvocationOutcome::Completed,
                        Err(error) if error.is_build_failure() => {
                            tracing::debug!("Build reported failure");
                            InvocationOutcome::Failed(BuildFailure::new(error.diagnostic()))
                        }
                        Err(error) => {
                            tracing::warn!(code = error.code, "Engine rejected build request");
                            InvocationOutcome::Failed(BuildFailure::new(error.diagnostic()))
                        }
                    });
                }
                Message::Response {
                    id: response_id, ..
                } => return Err(unexpected_response(id, response_id)),
            }
        }
    }

    async fn close(mut self) -> Result<(), EngineError> {
        let shutdown = self
            .call::<(), Value>(methods::SHUTDOWN, None)
            .await
            .map(|_| ());

        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!("Engine stdin already closed: {}", e);
        }

        if let Some(mut child) = self.child.take() {
            if shutdown.is_err() {
                if let Err(e) = child.start_kill() {
                    tracing::debug!("Build engine already gone: {}", e);
                }
            }
            let status = child.wait().await?;
            tracing::info!(%status, "Build engine exited");
        }

        shutdown
    }
}
