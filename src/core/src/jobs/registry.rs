//! Shared status table.
//!
//! Jobs publish their own entry; the manager and sibling jobs only read.
//! Every access goes through one mutex and holds it for a single write or a
//! bounded read.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;

use super::JobStatus;

/// The last state a job published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedStatus {
    pub status: JobStatus,
    pub exit_code: Option<i32>,
}

impl PublishedStatus {
    pub fn new(status: JobStatus, exit_code: Option<i32>) -> Self {
        Self { status, exit_code }
    }

    /// Only a completed job with a zero exit code unblocks its dependents.
    pub fn satisfies_dependency(&self) -> bool {
        self.status == JobStatus::Completed && self.exit_code == Some(0)
    }

    /// Terminal with a non-zero exit code, or terminal through retry exhaustion.
    pub fn is_error(&self) -> bool {
        match self.status {
            JobStatus::Completed => self.exit_code != Some(0),
            JobStatus::RetryOut => true,
            JobStatus::Ready | JobStatus::Running => false,
        }
    }
}

/// Identifier → last published state.
#[derive(Debug, Default)]
pub struct StatusBoard {
    entries: Mutex<HashMap<String, PublishedStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, id: &str, status: PublishedStatus) {
        self.entries.lock().insert(id.to_string(), status);
    }

    pub fn get(&self, id: &str) -> Option<PublishedStatus> {
        self.entries.lock().get(id).copied()
    }

    /// True iff every listed identifier is published as satisfying a dependency.
    pub fn all_satisfied<'a, I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let entries = self.entries.lock();
        ids.into_iter()
            .all(|id| entries.get(id).map_or(false, PublishedStatus::satisfies_dependency))
    }

    pub fn any<F>(&self, predicate: F) -> bool
    where
        F: Fn(&PublishedStatus) -> bool,
    {
        self.entries.lock().values().any(predicate)
    }

    pub fn all<F>(&self, predicate: F) -> bool
    where
        F: Fn(&PublishedStatus) -> bool,
    {
        self.entries.lock().values().all(predicate)
    }

    pub fn snapshot(&self) -> HashMap<String, PublishedStatus> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_satisfaction() {
        assert!(PublishedStatus::new(JobStatus::Completed, Some(0)).satisfies_dependency());
        assert!(!PublishedStatus::new(JobStatus::Completed, Some(1)).satisfies_dependency());
        assert!(!PublishedStatus::new(JobStatus::RetryOut, None).satisfies_dependency());
        assert!(!PublishedStatus::new(JobStatus::Running, None).satisfies_dependency());
    }

    #[test]
    fn test_error_classification() {
        assert!(PublishedStatus::new(JobStatus::Completed, Some(2)).is_error());
        assert!(PublishedStatus::new(JobStatus::RetryOut, None).is_error());
        assert!(!PublishedStatus::new(JobStatus::Completed, Some(0)).is_error());
        assert!(!PublishedStatus::new(JobStatus::Ready, None).is_error());
    }

    #[test]
    fn test_all_satisfied() {
        let board = StatusBoard::new();
        board.publish("a", PublishedStatus::new(JobStatus::Completed, Some(0)));
        board.publish("b", PublishedStatus::new(JobStatus::Running, None));

        let a = vec!["a".to_string()];
        let ab = vec!["a".to_string(), "b".to_string()];
        let missing = vec!["zzz".to_string()];

        assert!(board.all_satisfied(&a));
        assert!(!board.all_satisfied(&ab));
        assert!(!board.all_satisfied(&missing));
        assert!(board.all_satisfied(&Vec::new()));

        board.publish("b", PublishedStatus::new(JobStatus::Completed, Some(0)));
        assert!(board.all_satisfied(&ab));
    }

    #[test]
    fn test_clear() {
        let board = StatusBoard::new();
        board.publish("a", PublishedStatus::new(JobStatus::Ready, None));
        assert_eq!(board.len(), 1);
        board.clear();
        assert!(board.is_empty());
        assert!(board.get("a").is_none());
    }
}
