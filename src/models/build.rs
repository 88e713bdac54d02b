use std::fmt;

use serde::{Deserialize, Serialize};

/// A single build invocation.
///
/// `arguments` are the startup-time build arguments shared by every invocation;
/// `tasks` come from the line the user typed. An empty task list asks the engine
/// to run its default tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub arguments: Vec<String>,
    pub tasks: Vec<String>,
    #[serde(default)]
    pub jvm_arguments: Vec<String>,
    #[serde(default)]
    pub color_output: bool,
}

/// Which engine stream a chunk of build output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// A build the engine ran and reported as failed.
///
/// The connection that produced it is still usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub diagnostic: String,
}

impl BuildFailure {
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
        }
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostic)
    }
}

/// How one build invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The build ran to completion; its output has already been flushed.
    Completed,
    Failed(BuildFailure),
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}
