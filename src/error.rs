use thiserror::Error;

use crate::engine::EngineError;

/// Errors that end an interactive session.
///
/// A failed build is not one of them; see [`crate::models::InvocationOutcome`].
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Could not connect to the build engine: {0}")]
    Connection(#[source] EngineError),

    #[error("Could not describe the build environment: {0}")]
    Environment(#[source] EngineError),

    #[error("Could not fetch the project model: {0}")]
    ModelFetch(#[source] EngineError),

    #[error("Lost connection to the build engine: {0}")]
    ConnectionLost(#[source] EngineError),

    #[error("Failed to close the build engine connection: {0}")]
    Close(#[source] EngineError),

    #[error("Failed to write build output: {0}")]
    Output(#[source] std::io::Error),

    #[error("Failed to read input: {0}")]
    Input(#[source] std::io::Error),

    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}
