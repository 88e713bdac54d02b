use serde::{Deserialize, Serialize};

/// A project in the build hierarchy.
///
/// Fetched once per session right after the connection opens and read-only from
/// then on. Children and tasks keep the order the engine reported them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectNode {
    /// Display name, used for the prompt.
    pub name: String,
    /// Identifying path (`:` for the root, `:app`, `:libs:core`, ...).
    pub path: String,
    /// Path of the parent project. `None` only for the root.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub children: Vec<ProjectNode>,
}

impl ProjectNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A task exposed by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Short name, e.g. `build`.
    pub name: String,
    /// Fully qualified path, e.g. `:app:build`.
    pub path: String,
}
