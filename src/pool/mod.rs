/*!
 * Worker Pool
 *
 * Fixed set of OS threads executing submitted one-shot tasks.
 *
 * # Architecture
 *
 * - One shared FIFO (a `flume` channel) feeds every worker; any idle worker
 *   takes the next job, so at most `worker_count` tasks execute at once
 * - `submit` never blocks: it enqueues and returns a `Completion`
 * - `shutdown` is graceful: already queued tasks run before workers exit
 *
 * # Lifecycle
 *
 * `Started -> Stopping -> Stopped`. Only `Started` accepts submissions.
 */

mod stats;
mod worker;

pub use stats::{PoolStats, PoolStatsSnapshot};

use crate::core::config::SchedulerConfig;
use crate::core::errors::{ConfigError, SchedResult, SchedulerError};
use crate::core::limits::MAX_WORKER_COUNT;
use crate::core::sync::NativeThread;
use crate::core::types::StatusCode;
use crate::task::{Completion, FnTask, Job, Task, TaskFailure};
use flume::{Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pool lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PoolState {
    Started = 0,
    Stopping = 1,
    Stopped = 2,
}

impl PoolState {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PoolState::Started,
            1 => PoolState::Stopping,
            _ => PoolState::Stopped,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Started => write!(f, "started"),
            PoolState::Stopping => write!(f, "stopping"),
            PoolState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Fixed-size worker pool
pub struct WorkerPool {
    state: AtomicU8,
    sender: RwLock<Option<Sender<Job>>>,
    workers: Mutex<Vec<NativeThread>>,
    worker_count: usize,
    queue_capacity: Option<usize>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Pool with an unbounded FIFO
    pub fn new(worker_count: usize) -> SchedResult<Self> {
        Self::with_queue_capacity(worker_count, None)
    }

    pub fn from_config(config: &SchedulerConfig) -> SchedResult<Self> {
        config.validate()?;
        Self::with_queue_capacity(config.worker_count, config.pool_queue_capacity)
    }

    /// Pool whose FIFO holds at most `queue_capacity` waiting tasks
    pub fn with_queue_capacity(
        worker_count: usize,
        queue_capacity: Option<usize>,
    ) -> SchedResult<Self> {
        if worker_count == 0 {
            return Err(ConfigError::ZeroValue {
                field: "worker_count".into(),
            }
            .into());
        }
        if worker_count > MAX_WORKER_COUNT {
            return Err(ConfigError::OutOfRange {
                field: "worker_count".into(),
                value: worker_count as u64,
                max: MAX_WORKER_COUNT as u64,
            }
            .into());
        }

        let (sender, receiver) = match queue_capacity {
            Some(cap) => flume::bounded(cap),
            None => flume::unbounded(),
        };

        let pool = Self {
            state: AtomicU8::new(PoolState::Started as u8),
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(Vec::with_capacity(worker_count)),
            worker_count,
            queue_capacity,
            stats: Arc::new(PoolStats::new()),
        };

        for index in 0..worker_count {
            let worker = worker::spawn_worker(index, receiver.clone(), Arc::clone(&pool.stats))?;
            pool.workers.lock().push(worker);
        }

        info!(workers = worker_count, queue_capacity = ?queue_capacity, "Worker pool started");
        Ok(pool)
    }

    /// Queue `task` at the FIFO tail and wake one idle worker
    ///
    /// # Performance
    /// Hot path - shared lock plus one channel send, never blocks
    pub fn submit<T: Task>(&self, task: T) -> SchedResult<Completion<T>> {
        let guard = self.sender.read();
        let sender = match guard.as_ref() {
            Some(sender) if self.state() == PoolState::Started => sender,
            _ => return Err(SchedulerError::PoolNotAccepting(self.state())),
        };

        let (job, completion) = Job::new(task);
        match sender.try_send(job) {
            Ok(()) => {
                self.stats.inc_submitted();
                Ok(completion)
            }
            Err(TrySendError::Full(job)) => {
                warn!(task = job.name(), "Worker pool queue full");
                Err(SchedulerError::QueueFull(self.queue_capacity.unwrap_or_default()))
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(SchedulerError::PoolNotAccepting(self.state()))
            }
        }
    }

    /// Submit a closure as a task
    pub fn submit_fn<F>(&self, func: F) -> SchedResult<Completion<FnTask<F>>>
    where
        F: FnOnce() -> Result<StatusCode, TaskFailure> + Send + 'static,
    {
        self.submit(FnTask::new(func))
    }

    /// Stop accepting work, let workers drain the FIFO, and join them
    ///
    /// A second call logs a warning and does nothing.
    pub fn shutdown(&self) {
        if self
            .state
            .compare_exchange(
                PoolState::Started as u8,
                PoolState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            warn!(state = %self.state(), "Worker pool already shut down");
            return;
        }

        info!(queued = self.queued(), "Worker pool stopping");
        drop(self.sender.write().take());

        let workers = mem::take(&mut *self.workers.lock());
        for worker in workers {
            let name = worker.name().to_owned();
            match worker.join() {
                Ok(()) => debug!(worker = %name, "Worker joined"),
                Err(e) => error!(worker = %name, error = %e, "Worker join failed"),
            }
        }

        self.state.store(PoolState::Stopped as u8, Ordering::Release);
        info!("Worker pool stopped");
    }

    #[inline]
    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Tasks waiting in the FIFO
    pub fn queued(&self) -> usize {
        self.sender.read().as_ref().map_or(0, |s| s.len())
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.state() == PoolState::Started {
            self.shutdown();
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("state", &self.state())
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(SchedulerError::Config(ConfigError::ZeroValue { .. }))
        ));
    }

    #[test]
    fn test_submit_after_shutdown_refused() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        assert_eq!(pool.state(), PoolState::Stopped);
        assert!(matches!(
            pool.submit_fn(|| Ok(0)),
            Err(SchedulerError::PoolNotAccepting(PoolState::Stopped))
        ));
    }

    #[test]
    fn test_double_shutdown_is_noop() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_bounded_queue_reports_full() {
        let pool = WorkerPool::with_queue_capacity(1, Some(1)).unwrap();
        let (gate_tx, gate_rx) = flume::bounded::<()>(0);
        let (started_tx, started_rx) = flume::bounded::<()>(1);

        let blocker = pool
            .submit_fn(move || {
                started_tx.send(()).ok();
                gate_rx.recv().ok();
                Ok(0)
            })
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let queued = pool.submit_fn(|| Ok(0)).unwrap();
        assert!(matches!(
            pool.submit_fn(|| Ok(0)),
            Err(SchedulerError::QueueFull(1))
        ));

        gate_tx.send(()).unwrap();
        assert!(blocker.wait_for_result());
        assert!(queued.wait_for_result());
    }
}
