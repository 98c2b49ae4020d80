/*!
 * cothread
 * Concurrency and scheduling core: a double-buffered mailbox, a worker
 * pool with completion handles, and cooperative mailbox-driven runners
 */

pub mod context;
pub mod core;
pub mod monitoring;
pub mod pool;
pub mod process;
pub mod scheduler;
pub mod task;

// Re-exports
pub use context::SchedulerContext;
pub use crate::core::errors::{ConfigError, SchedResult, SchedulerError};
pub use crate::core::sync::{DoubleBufferedQueue, NativeThread, QueueWriter, SwapOutcome, ThreadError, ThreadHandle};
pub use crate::core::types::{hash_name, CapabilityMask, ErrorCode, NameHash, Priority, StatusCode};
pub use crate::core::{InlineString, Pid, SchedulerConfig};
pub use monitoring::init_tracing;
pub use pool::{PoolState, PoolStatsSnapshot, WorkerPool};
pub use process::{Process, ProcessEntry, ProcessStatus, ProcessStep};
pub use scheduler::{
    ControlMessage, ProcessManager, ProcessRunner, RunnerConfig, RunnerStatsSnapshot,
    RunnerStatus, TaskRunner,
};
pub use task::{Completion, FnTask, Task, TaskFailure, TaskOptions};
