/*!
 * Limits and Defaults
 *
 * Centralized location for construction-time defaults and error codes.
 * Grouped by component so the config layer and the components agree.
 */

use std::time::Duration;

// =============================================================================
// MAILBOX / DOUBLE-BUFFERED QUEUE
// =============================================================================

/// Default mailbox capacity per region (messages)
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Mailbox capacity for task runners
pub const TASK_RUNNER_QUEUE_CAPACITY: usize = 16;

/// Upper bound accepted by the config layer for any queue capacity
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

// =============================================================================
// WORKER POOL
// =============================================================================

/// Default number of worker threads
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Upper bound on worker threads
pub const MAX_WORKER_COUNT: usize = 1024;

/// Worker thread name prefix (`<prefix>-<index>`)
pub const WORKER_THREAD_PREFIX: &str = "cothread-worker";

// =============================================================================
// COOPERATIVE RUNNERS
// =============================================================================

/// Default maximum number of entities hosted by one process runner
pub const DEFAULT_MAX_ENTITIES: usize = 32;

/// Default capability mask of a runner (accepts everything)
pub const DEFAULT_CAPABILITY_MASK: u32 = u32::MAX;

/// Default base time slice handed to each entity per round
pub const DEFAULT_TIME_SLICE: Duration = Duration::from_millis(1);

/// Longest slice a single entity may request in one round
pub const MAX_TIME_SLICE: Duration = Duration::from_secs(1);

/// How long `start()` waits for a runner thread to report that it is running
pub const RUNNER_START_TIMEOUT: Duration = Duration::from_secs(5);

/// How long dropping a runner keeps retrying its stop message before it
/// detaches the thread
pub const RUNNER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum number of runners held by a manager
pub const DEFAULT_MAX_RUNNERS: usize = 8;

// =============================================================================
// TASKS
// =============================================================================

/// Default task / process priority
pub const DEFAULT_PRIORITY: u32 = 1;

/// Error code recorded when a task reports failure with code 0
pub const UNSPECIFIED_TASK_ERROR: i32 = -1;

/// Error code recorded when a task panics inside `run`
pub const TASK_PANICKED: i32 = -2;
