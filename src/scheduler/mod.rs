/*!
 * Cooperative Scheduler
 *
 * Runners that multiplex many entities onto one dedicated thread each,
 * controlled entirely through a double-buffered mailbox.
 *
 * # Architecture
 *
 * - `ProcessRunner`: long-lived, time-sliced processes with pause, resume,
 *   terminate and capability-based admission
 * - `TaskRunner`: one-shot tasks run in FIFO order with completion handles
 * - `ProcessManager`: named runners, routing by admission and by host
 *
 * Within one runner entities never run concurrently; only entities on
 * different runners do.
 */

mod handle;
mod manager;
mod message;
mod process_runner;
mod run_loop;
mod stats;
mod task_runner;
mod types;

pub use manager::ProcessManager;
pub use message::{ControlMessage, TaskMessage};
pub use process_runner::ProcessRunner;
pub use stats::{RunnerStats, RunnerStatsSnapshot};
pub use task_runner::TaskRunner;
pub use types::{RunnerConfig, RunnerStatus};
