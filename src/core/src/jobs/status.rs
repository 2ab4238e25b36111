//! Job lifecycle states and the transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a job.
///
/// `Ready → Running → {Completed | RetryOut}`. A job never re-enters `Ready`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting to be started (possibly blocked on dependencies)
    #[default]
    Ready,
    /// An execution context is attempting the command
    Running,
    /// An attempt ran to completion; the exit code is recorded
    Completed,
    /// Every attempt was cancelled by timeout; no exit code exists
    RetryOut,
}

impl JobStatus {
    /// Check if transition to another status is valid.
    pub fn can_transition_to(&self, target: &JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, target),
            (Ready, Running) | (Running, Completed) | (Running, RetryOut)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::RetryOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::RetryOut => "RetryOut",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
