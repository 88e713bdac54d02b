//! Domain models for the build shell.
//!
//! # Core Concepts
//!
//! - [`ProjectNode`]: One project in the build's hierarchy, as reported by the engine.
//!   The root has no parent; every other node names its parent by path.
//! - [`TaskRecord`]: An invokable task exposed by a project (short name plus full path).
//! - [`BuildEnvironment`]: What the engine reports about itself, shown once at startup.
//! - [`BuildRequest`]: Everything a single build invocation sends to the engine.
//! - [`InvocationOutcome`]: How one build ended. A failed build is an outcome, not an error.

mod build;
mod environment;
mod project;

pub use build::*;
pub use environment::*;
pub use project::*;
