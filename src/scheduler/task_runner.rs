/*!
 * Task Runner
 *
 * Cooperative runner for one-shot tasks: a dedicated thread executing
 * queued tasks in FIFO order, one per loop iteration, applying mailbox
 * messages between tasks. Shares the mailbox protocol and status machine
 * of `ProcessRunner`.
 *
 * Admission has no population limit; a task is refused only if the runner's
 * mask lacks a capability the task declares in its options.
 */

use super::handle::{RunnerCore, RunnerThread};
use super::message::TaskMessage;
use super::stats::RunnerStatsSnapshot;
use super::types::{RunnerConfig, RunnerStatus};
use crate::core::data_structures::InlineString;
use crate::core::errors::{ConfigError, SchedResult, SchedulerError};
use crate::core::sync::{DoubleBufferedQueue, QueueWriter, SwapOutcome};
use crate::core::types::CapabilityMask;
use crate::task::{Completion, Job, Task};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

struct TaskLoop {
    core: Arc<RunnerCore>,
    mailbox: DoubleBufferedQueue<TaskMessage>,
    tasks: VecDeque<Job>,
}

impl TaskLoop {
    fn run(mut self) -> RunnerStatus {
        let core = Arc::clone(&self.core);
        core.set_status(RunnerStatus::Running);
        info!("Task runner loop started");

        while core.status() == RunnerStatus::Running {
            match self.tasks.pop_front() {
                Some(job) => self.execute(job),
                None => {
                    core.set_status(RunnerStatus::Waiting);
                    trace!("Runner idle");
                    while !self.mailbox.wait_for_writes(None) {}
                    core.set_status(RunnerStatus::Running);
                }
            }
            self.apply_messages();
        }

        self.finish()
    }

    fn execute(&mut self, job: Job) {
        self.core.stats.inc_rounds();
        let name = job.name().to_owned();
        trace!(task = %name, priority = job.priority(), "Executing task");
        match catch_unwind(AssertUnwindSafe(|| job.execute())) {
            Ok(outcome) if !outcome.is_success() => {
                debug!(task = %name, error = outcome.error, "Task finished with error");
            }
            Ok(_) => {}
            Err(_) => error!(task = %name, "Task hook panicked; completion detached"),
        }
        self.core.stats.inc_slices();
        self.core.stats.add_reclaimed(1);
    }

    fn apply_messages(&mut self) {
        if let SwapOutcome::Pending(unread) = self.mailbox.swap() {
            warn!(unread, "Mailbox read side not drained before swap");
        }
        while let Some(message) = self.mailbox.pop() {
            self.core.mark_applied();
            match message {
                TaskMessage::QueueTask(job) => {
                    self.core.stats.inc_started();
                    self.tasks.push_back(job);
                }
                TaskMessage::StopRunner => {
                    info!("Stop requested; finishing after this task");
                    self.core.set_status(RunnerStatus::WillFinish);
                }
            }
            self.core.stats.inc_messages();
        }
        self.core.stats.set_population(self.tasks.len(), 0);
    }

    /// Unrun tasks are dropped, which detaches their completions
    fn finish(mut self) -> RunnerStatus {
        let dropped = self.tasks.len() + self.mailbox.erase_all();
        self.tasks.clear();
        self.core.stats.set_population(0, 0);
        self.core.set_status(RunnerStatus::Finished);
        info!(dropped, "Task runner finished");
        RunnerStatus::Finished
    }
}

/// Handle on a cooperative task runner
pub struct TaskRunner {
    core: Arc<RunnerCore>,
    accepted_mask: CapabilityMask,
    limits: Result<(), ConfigError>,
    mailbox: QueueWriter<TaskMessage>,
    pending: Mutex<Option<TaskLoop>>,
    thread: RunnerThread,
}

impl TaskRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let limits = config.validate();
        let core = Arc::new(RunnerCore::new(config.name));
        let mailbox = DoubleBufferedQueue::new(config.queue_capacity);
        let writer = mailbox.writer();
        Self {
            core: Arc::clone(&core),
            accepted_mask: config.accepted_mask,
            limits,
            mailbox: writer,
            pending: Mutex::new(Some(TaskLoop {
                core,
                mailbox,
                tasks: VecDeque::new(),
            })),
            thread: RunnerThread::default(),
        }
    }

    /// Spawn the runner thread; a second call warns and does nothing
    pub fn start(&self) -> SchedResult<()> {
        if let Err(e) = &self.limits {
            error!(runner = %self.name(), error = %e, "Invalid runner limits");
            self.core.set_status(RunnerStatus::FailedToStart);
            return Err(e.clone().into());
        }
        let Some(task_loop) = self.pending.lock().take() else {
            warn!(runner = %self.name(), "Task runner already started");
            return Ok(());
        };
        self.thread.launch(&self.core, move || task_loop.run())?;
        info!(runner = %self.name(), "Task runner started");
        Ok(())
    }

    /// True if the runner offers every capability `task` declares
    pub fn accepts<T: Task>(&self, task: &T) -> bool {
        self.accepted_mask.satisfies(task.options().mask)
    }

    /// Post `task` to the runner; returns its completion handle
    pub fn queue<T: Task>(&self, task: T) -> SchedResult<Completion<T>> {
        self.core.ensure_accepting()?;
        if !self.accepts(&task) {
            warn!(runner = %self.name(), task = task.name(), mask = %task.options().mask, "Task needs capabilities the runner lacks");
            return Err(SchedulerError::Rejected {
                runner: self.core.name().clone(),
                reason: "runner lacks required capabilities".into(),
            });
        }
        let (job, completion) = Job::new(task);
        let mailbox = &self.mailbox;
        self.core
            .track_post(|| mailbox.push(TaskMessage::QueueTask(job)))
            .map_err(|message| {
                warn!(runner = %self.name(), rejected = ?message, "Mailbox full; task not queued");
                self.mailbox_full()
            })?;
        Ok(completion)
    }

    /// Ask the runner to finish after the task it is running
    pub fn quit(&self) -> SchedResult<()> {
        self.core.ensure_accepting()?;
        let mailbox = &self.mailbox;
        self.core
            .track_post(|| mailbox.push(TaskMessage::StopRunner))
            .map_err(|_| self.mailbox_full())
    }

    fn mailbox_full(&self) -> SchedulerError {
        SchedulerError::MailboxFull {
            runner: self.core.name().clone(),
            capacity: self.mailbox.capacity(),
        }
    }

    pub fn join(&self) -> SchedResult<RunnerStatus> {
        self.thread.join(&self.core)
    }

    pub fn shutdown(&self) -> SchedResult<RunnerStatus> {
        self.quit()?;
        self.join()
    }

    /// Block until every posted task has run and the mailbox is drained
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.core.wait_until_idle(timeout)
    }

    #[inline]
    pub fn name(&self) -> &InlineString {
        self.core.name()
    }

    #[inline]
    pub fn status(&self) -> RunnerStatus {
        self.core.status()
    }

    #[inline]
    pub fn accepted_mask(&self) -> CapabilityMask {
        self.accepted_mask
    }

    pub fn stats(&self) -> RunnerStatsSnapshot {
        self.core.stats.snapshot()
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        let mailbox = &self.mailbox;
        let core = &self.core;
        self.thread.stop_and_join(core, || {
            core.track_post(|| mailbox.push(TaskMessage::StopRunner))
                .is_ok()
        });
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("name", self.name())
            .field("status", &self.status())
            .field("mask", &self.accepted_mask)
            .finish()
    }
}
