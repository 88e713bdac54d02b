//! Connection to the build engine.

mod client;
pub mod protocol;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWrite;

pub use client::{EngineConnection, EngineError};

use crate::models::*;

/// Settings files that mark the root of a multi-project build.
const SETTINGS_FILES: &[&str] = &["settings.gradle", "settings.gradle.kts"];

/// Build scripts that make a directory a single-project build on their own.
const BUILD_FILES: &[&str] = &["build.gradle", "build.gradle.kts"];

/// Operations the shell needs from an open engine connection.
///
/// Every operation takes `&mut self`: a connection serves one request at a time.
#[async_trait]
pub trait BuildEngine: Send {
    /// Engine version and runtime details, for the startup banner.
    async fn describe_environment(&mut self) -> Result<BuildEnvironment, EngineError>;

    /// Fetch the project hierarchy, configured with the same `arguments` builds will use.
    async fn fetch_project(&mut self, arguments: &[String]) -> Result<ProjectNode, EngineError>;

    /// Run one build, writing its stdout and stderr to `sink` as they are produced.
    ///
    /// A build the engine ran and reported as failed is `Ok(InvocationOutcome::Failed)`;
    /// `Err` means the connection itself broke.
    async fn run_build(
        &mut self,
        request: &BuildRequest,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<InvocationOutcome, EngineError>;

    /// Release the connection.
    async fn close(self) -> Result<(), EngineError>
    where
        Self: Sized;
}

/// Find the build that `dir` belongs to.
///
/// The nearest directory at or above `dir` with a settings file wins. Failing
/// that, `dir` itself counts if it has a build script.
pub fn find_build_root(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .find(|d| has_any(d, SETTINGS_FILES))
        .or_else(|| has_any(dir, BUILD_FILES).then_some(dir))
        .map(Path::to_path_buf)
}

fn has_any(dir: &Path, names: &[&str]) -> bool {
    names.iter().any(|name| dir.join(name).is_file())
}
