//! Prefix completion over the discovered task namespace.

use crate::discovery::TaskNamespace;

/// Leading character that addresses a task by path.
pub const TASK_SEPARATOR: char = ':';

/// Candidates for the word being completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Byte offset in the line where the candidates replace the typed word.
    pub start: usize,
    pub candidates: Vec<String>,
}

/// Immutable completion index built once from discovery.
#[derive(Debug, Clone, Default)]
pub struct CompletionIndex {
    namespace: TaskNamespace,
}

impl CompletionIndex {
    pub fn new(namespace: TaskNamespace) -> Self {
        Self { namespace }
    }

    /// Complete the whitespace-delimited word that ends at `pos`.
    ///
    /// A word typed without the leading separator that matches nothing as-is is
    /// retried as `:word`, so `app:b` completes to `:app:build`. Returns `None`
    /// when no task matches either way.
    pub fn complete(&self, line: &str, pos: usize) -> Option<Completion> {
        let pos = floor_char_boundary(line, pos.min(line.len()));
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map(|i| i + line[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let word = &line[start..pos];

        let mut candidates = self.matches(word);
        if candidates.is_empty() && !word.starts_with(TASK_SEPARATOR) {
            candidates = self.matches(&format!("{}{}", TASK_SEPARATOR, word));
        }

        if candidates.is_empty() {
            None
        } else {
            Some(Completion { start, candidates })
        }
    }

    fn matches(&self, prefix: &str) -> Vec<String> {
        self.namespace
            .starting_with(prefix)
            .map(str::to_string)
            .collect()
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
