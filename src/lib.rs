//! Interactive shell over a single, long-lived build engine connection.
//!
//! The binary opens one [`engine::EngineConnection`], discovers the project's
//! tasks once, and then turns every line typed at the prompt into a build on that
//! same connection. See [`session::run`] for the lifecycle and [`shell::Shell`] for
//! the loop.

pub mod completion;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod models;
pub mod session;
pub mod shell;

pub use error::ShellError;
