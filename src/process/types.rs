/*!
 * Process Types
 * Lifecycle state and per-slice outcomes of cooperatively scheduled processes
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Created, not yet adopted by a runner
    NotStarted,
    /// Receives a time slice every round
    Running,
    /// Skipped by rounds until resumed
    Paused,
    /// Stopped from outside; never scheduled again
    Terminated,
    /// Finished its work
    Succeeded,
    /// Gave up, or panicked inside a slice
    Failed,
}

impl ProcessStatus {
    /// Running or paused
    #[inline]
    pub fn is_alive(self) -> bool {
        matches!(self, ProcessStatus::Running | ProcessStatus::Paused)
    }

    /// Reached a state it can never leave
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessStatus::Terminated | ProcessStatus::Succeeded | ProcessStatus::Failed
        )
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessStatus::NotStarted => "not_started",
            ProcessStatus::Running => "running",
            ProcessStatus::Paused => "paused",
            ProcessStatus::Terminated => "terminated",
            ProcessStatus::Succeeded => "succeeded",
            ProcessStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a process reports at the end of one time slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStep {
    /// More work left; schedule again next round
    Continue,
    Succeeded,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(ProcessStatus::Paused.is_alive());
        assert!(!ProcessStatus::NotStarted.is_alive());
        assert!(ProcessStatus::Failed.is_terminal());
        assert!(!ProcessStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ProcessStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
    }
}
