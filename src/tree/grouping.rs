//! Runtime check that rows sharing a parent id arrive contiguously.

use std::collections::HashSet;

use crate::error::{MergeError, MergeResult};

/// Remembers parent ids the tree has moved past.
///
/// An id is retired once the tree has finished with it: an ancestor row
/// skipped while searching for a match, or a parent whose reduction rows
/// have all been consumed. Seeing a retired id again means the upstream
/// stream was not grouped by that column.
#[derive(Debug)]
pub struct GroupingGuard {
    stream: String,
    column: String,
    retired: HashSet<String>,
}

impl GroupingGuard {
    pub fn new(stream: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            column: column.into(),
            retired: HashSet::new(),
        }
    }

    pub fn retire(&mut self, value: &str) {
        if !self.retired.contains(value) {
            self.retired.insert(value.to_string());
        }
    }

    /// Fail if `value` was already retired.
    pub fn check(&self, value: &str) -> MergeResult<()> {
        if self.retired.contains(value) {
            return Err(MergeError::GroupingViolation {
                stream: self.stream.clone(),
                column: self.column.clone(),
                value: value.to_string(),
            });
        }
        Ok(())
    }
}
