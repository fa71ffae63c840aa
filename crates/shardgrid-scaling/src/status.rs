//! Scaling job lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a scaling job.
///
/// ```text
/// PREPARING ──► RUNNING ──► SUCCEEDED
///     │            │
///     │            ├──────► FAILED
///     ├────────────┼──────► FAILED
///     └────────────┴──────► STOPPED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Preparing,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Stopped)
    }

    /// Whether `next` is a forward move from this status.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Preparing, Running)
                | (Preparing, Failed)
                | (Preparing, Stopped)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Stopped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Preparing => "PREPARING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
