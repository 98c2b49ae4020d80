/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::data_structures::InlineString;
use crate::pool::PoolState;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scheduler errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SchedulerError {
    #[error("Mailbox of runner '{runner}' is full ({capacity} messages)")]
    #[diagnostic(
        code(scheduler::mailbox_full),
        help("The runner has not drained its mailbox yet. Retry later or drop the message.")
    )]
    MailboxFull { runner: InlineString, capacity: usize },

    #[error("Worker pool queue is full ({0} tasks)")]
    #[diagnostic(
        code(scheduler::queue_full),
        help("Too many tasks waiting for a worker. Wait for tasks to complete.")
    )]
    QueueFull(usize),

    #[error("Worker pool is not accepting tasks (state: {0:?})")]
    #[diagnostic(
        code(scheduler::pool_not_accepting),
        help("The pool has been shut down. Create a new pool to submit more work.")
    )]
    PoolNotAccepting(PoolState),

    #[error("Runner '{runner}' rejected entity: {reason}")]
    #[diagnostic(
        code(scheduler::rejected),
        help("The runner is full or lacks a capability the entity requires.")
    )]
    Rejected {
        runner: InlineString,
        reason: InlineString,
    },

    #[error("No runner accepts entity {0}")]
    #[diagnostic(
        code(scheduler::no_runner),
        help("Create a runner whose capability mask covers the entity's mask.")
    )]
    NoRunnerAccepts(InlineString),

    #[error("Entity not found: {0}")]
    #[diagnostic(
        code(scheduler::not_found),
        help("The entity may have finished and been reclaimed, or was never queued.")
    )]
    NotFound(InlineString),

    #[error("Failed to spawn thread: {0}")]
    #[diagnostic(
        code(scheduler::thread_spawn),
        help("The OS refused to create a thread. Check thread limits and available memory.")
    )]
    ThreadSpawn(InlineString),

    #[error("Runner '{0}' is not running")]
    #[diagnostic(
        code(scheduler::not_running),
        help("Start the runner before waiting on it.")
    )]
    NotRunning(InlineString),

    #[error("Runner thread '{0}' panicked")]
    #[diagnostic(
        code(scheduler::runner_panicked),
        help("A hosted entity panicked inside the runner loop. Inspect the logs.")
    )]
    RunnerPanicked(InlineString),

    #[error("Timed out: {0}")]
    #[diagnostic(
        code(scheduler::timeout),
        help("The operation did not complete in time. Check system load.")
    )]
    Timeout(InlineString),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("'{field}' must be greater than zero")]
    #[diagnostic(
        code(config::zero_value),
        help("Queue capacities, worker counts and entity limits must be at least 1.")
    )]
    ZeroValue { field: InlineString },

    #[error("'{field}' is {value}, maximum is {max}")]
    #[diagnostic(code(config::out_of_range))]
    OutOfRange {
        field: InlineString,
        value: u64,
        max: u64,
    },

    #[error("Invalid value for {key}: '{value}'")]
    #[diagnostic(
        code(config::invalid_value),
        help("Numeric settings accept decimal values; masks also accept 0x-prefixed hex.")
    )]
    InvalidValue { key: InlineString, value: InlineString },

    #[error("Malformed configuration: {0}")]
    #[diagnostic(code(config::malformed))]
    Malformed(InlineString),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Malformed(err.to_string().into())
    }
}

/// Result type for scheduler operations
pub type SchedResult<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_error_serialization() {
        let error = SchedulerError::MailboxFull {
            runner: "io".into(),
            capacity: 16,
        };
        let json = serde_json::to_string(&error).unwrap();
        let deserialized: SchedulerError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, deserialized);
    }

    #[test]
    fn test_pool_error_display() {
        let error = SchedulerError::PoolNotAccepting(PoolState::Stopped);
        assert_eq!(
            error.to_string(),
            "Worker pool is not accepting tasks (state: Stopped)"
        );
    }

    #[test]
    fn test_config_error_wraps() {
        let error: SchedulerError = ConfigError::ZeroValue {
            field: "worker_count".into(),
        }
        .into();
        assert!(matches!(error, SchedulerError::Config(_)));
        assert!(error.to_string().contains("worker_count"));
    }

    #[test]
    fn test_config_error_from_json() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let config_err: ConfigError = err.into();
        assert!(matches!(config_err, ConfigError::Malformed(_)));
    }
}
