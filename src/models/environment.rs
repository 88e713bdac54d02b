use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Engine and runtime details reported by the build engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub engine_version: String,
    /// Home directory of the runtime the engine runs builds on (the JDK).
    pub runtime_home: PathBuf,
    #[serde(default)]
    pub runtime_arguments: Vec<String>,
}
