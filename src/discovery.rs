//! Task discovery over a fetched project hierarchy.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;

use crate::models::ProjectNode;

/// The flattened set of task identifiers used for completion.
///
/// Root project tasks are stored by short name; tasks of every other project are
/// stored by their fully qualified path, so same-named tasks in different
/// sub-projects never collide. Iteration is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskNamespace {
    tokens: BTreeSet<String>,
}

impl TaskNamespace {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Tokens starting with `prefix`, in sorted order.
    pub fn starting_with<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.tokens
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |token| token.starts_with(prefix))
            .map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TaskNamespace {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of walking a project hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub namespace: TaskNamespace,
    pub project_count: usize,
}

impl fmt::Display for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found {} tasks in {} projects.",
            self.namespace.len(),
            self.project_count
        )
    }
}

/// Walk `root` and every descendant once, parent before children.
pub fn discover_tasks(root: &ProjectNode) -> Discovery {
    let mut tokens = BTreeSet::new();
    let project_count = collect(root, &mut tokens);
    Discovery {
        namespace: TaskNamespace { tokens },
        project_count,
    }
}

/// Insert `node`'s task identifiers, then its children's. Returns the number of
/// projects visited.
fn collect(node: &ProjectNode, tokens: &mut BTreeSet<String>) -> usize {
    for task in &node.tasks {
        let token = if node.is_root() { &task.name } else { &task.path };
        tokens.insert(token.clone());
    }

    1 + node
        .children
        .iter()
        .map(|child| collect(child, tokens))
        .sum::<usize>()
}
