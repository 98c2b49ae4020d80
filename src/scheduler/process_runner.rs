/*!
 * Process Runner
 *
 * Cooperative scheduler multiplexing many long-lived processes onto one
 * dedicated thread. The public API only posts messages into the runner's
 * mailbox; the runner thread applies them between rounds.
 *
 * # Admission
 *
 * A process is accepted only if the runner hosts fewer than `max_entities`
 * processes (counting ones still in flight in the mailbox) and the runner's
 * mask holds every capability bit the process declares.
 */

use super::handle::{RunnerCore, RunnerThread};
use super::message::ControlMessage;
use super::run_loop::RunLoop;
use super::stats::RunnerStatsSnapshot;
use super::types::{RunnerConfig, RunnerStatus};
use crate::core::data_structures::InlineString;
use crate::core::errors::{ConfigError, SchedResult, SchedulerError};
use crate::core::id::Pid;
use crate::core::sync::{DoubleBufferedQueue, QueueWriter};
use crate::core::types::{hash_name, CapabilityMask, NameHash};
use crate::process::ProcessEntry;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// State shared between a process runner's handle and its thread
pub(crate) struct ProcessShared {
    pub(crate) core: Arc<RunnerCore>,
    pub(crate) accepted_mask: CapabilityMask,
    pub(crate) max_entities: usize,
    /// Processes queued or hosted, until reclaimed
    pub(crate) admitted: AtomicUsize,
    /// PID -> name hash of every process queued or hosted
    pub(crate) directory: DashMap<Pid, NameHash, RandomState>,
}

/// Why a runner refuses a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    Full,
    MissingCapabilities,
}

impl Refusal {
    fn reason(self) -> &'static str {
        match self {
            Refusal::Full => "runner is full",
            Refusal::MissingCapabilities => "runner lacks required capabilities",
        }
    }
}

/// A refused offer hands the process back when it can
pub(crate) type Refused = (SchedulerError, Option<ProcessEntry>);

/// Handle on a cooperative process runner
pub struct ProcessRunner {
    shared: Arc<ProcessShared>,
    /// Outcome of validating the construction limits; `start()` reports it
    limits: Result<(), ConfigError>,
    mailbox: QueueWriter<ControlMessage>,
    pending: Mutex<Option<RunLoop>>,
    thread: RunnerThread,
}

impl ProcessRunner {
    /// Build a runner; no thread exists until `start()`
    pub fn new(config: RunnerConfig) -> Self {
        let limits = config.validate();
        let core = Arc::new(RunnerCore::new(config.name));
        let shared = Arc::new(ProcessShared {
            core,
            accepted_mask: config.accepted_mask,
            max_entities: config.max_entities,
            admitted: AtomicUsize::new(0),
            directory: DashMap::with_hasher(RandomState::new()),
        });
        let mailbox = DoubleBufferedQueue::new(config.queue_capacity);
        let writer = mailbox.writer();
        let run_loop = RunLoop::new(
            Arc::clone(&shared),
            mailbox,
            config.time_slice,
            config.max_entities,
        );

        Self {
            shared,
            limits,
            mailbox: writer,
            pending: Mutex::new(Some(run_loop)),
            thread: RunnerThread::default(),
        }
    }

    /// Spawn the runner thread and wait for it to report `Running`
    ///
    /// Starting an already started runner logs a warning and does nothing.
    /// A zero mailbox capacity or entity limit fails with a config error and
    /// leaves the runner in `FailedToStart`.
    pub fn start(&self) -> SchedResult<()> {
        if let Err(e) = &self.limits {
            error!(runner = %self.name(), error = %e, "Invalid runner limits");
            self.shared.core.set_status(RunnerStatus::FailedToStart);
            return Err(e.clone().into());
        }
        let Some(run_loop) = self.pending.lock().take() else {
            warn!(runner = %self.name(), "Process runner already started");
            return Ok(());
        };
        self.thread
            .launch(&self.shared.core, move || run_loop.run())?;
        info!(
            runner = %self.name(),
            max_entities = self.shared.max_entities,
            mask = %self.shared.accepted_mask,
            "Process runner started"
        );
        Ok(())
    }

    /// True if `entry` would currently be admitted
    pub fn accepts(&self, entry: &ProcessEntry) -> bool {
        self.refusal(entry).is_none()
    }

    fn refusal(&self, entry: &ProcessEntry) -> Option<Refusal> {
        if !self.shared.accepted_mask.satisfies(entry.mask()) {
            return Some(Refusal::MissingCapabilities);
        }
        if self.shared.admitted.load(Ordering::Acquire) >= self.shared.max_entities {
            return Some(Refusal::Full);
        }
        None
    }

    fn reject(&self, refusal: Refusal) -> SchedulerError {
        SchedulerError::Rejected {
            runner: self.shared.core.name().clone(),
            reason: refusal.reason().into(),
        }
    }

    /// Hand a process to the runner; returns its PID
    pub fn queue(&self, entry: ProcessEntry) -> SchedResult<Pid> {
        self.offer(entry).map_err(|(error, _)| error)
    }

    /// `queue`, returning the process alongside the error when refused
    pub(crate) fn offer(&self, entry: ProcessEntry) -> Result<Pid, Refused> {
        if let Err(e) = self.shared.core.ensure_accepting() {
            return Err((e, Some(entry)));
        }
        if let Some(Refusal::MissingCapabilities) = self.refusal(&entry) {
            return Err((self.reject(Refusal::MissingCapabilities), Some(entry)));
        }

        let max = self.shared.max_entities;
        let reserved = self
            .shared
            .admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            });
        if reserved.is_err() {
            return Err((self.reject(Refusal::Full), Some(entry)));
        }

        let pid = entry.pid();
        let name_hash = entry.name_hash();
        self.shared.directory.insert(pid, name_hash);

        let mailbox = &self.mailbox;
        let pushed = self
            .shared
            .core
            .track_post(|| mailbox.push(ControlMessage::QueueEntity(entry)));
        if let Err(message) = pushed {
            self.shared.directory.remove(&pid);
            self.shared.admitted.fetch_sub(1, Ordering::AcqRel);
            warn!(runner = %self.name(), kind = message.kind(), pid = %pid, "Mailbox full; process not queued");
            let returned = match message {
                ControlMessage::QueueEntity(entry) => Some(entry),
                _ => None,
            };
            return Err((self.mailbox_full(), returned));
        }

        debug!(runner = %self.name(), pid = %pid, "Process queued");
        Ok(pid)
    }

    pub fn pause(&self, pid: Pid) -> SchedResult<()> {
        self.post(ControlMessage::PauseByPid(pid))
    }

    pub fn pause_named(&self, name: &str) -> SchedResult<()> {
        self.post(ControlMessage::PauseByName(hash_name(name)))
    }

    pub fn resume(&self, pid: Pid) -> SchedResult<()> {
        self.post(ControlMessage::ResumeByPid(pid))
    }

    pub fn resume_named(&self, name: &str) -> SchedResult<()> {
        self.post(ControlMessage::ResumeByName(hash_name(name)))
    }

    pub fn terminate(&self, pid: Pid) -> SchedResult<()> {
        self.post(ControlMessage::TerminateByPid(pid))
    }

    pub fn terminate_named(&self, name: &str) -> SchedResult<()> {
        self.post(ControlMessage::TerminateByName(hash_name(name)))
    }

    pub fn terminate_all(&self) -> SchedResult<()> {
        self.post(ControlMessage::TerminateAll)
    }

    /// Ask the runner to finish after its current round
    pub fn quit(&self) -> SchedResult<()> {
        self.post(ControlMessage::StopRunner)
    }

    fn post(&self, message: ControlMessage) -> SchedResult<()> {
        self.shared.core.ensure_accepting()?;
        let mailbox = &self.mailbox;
        self.shared
            .core
            .track_post(|| mailbox.push(message))
            .map_err(|message| {
                warn!(runner = %self.name(), kind = message.kind(), "Mailbox full; message dropped");
                self.mailbox_full()
            })
    }

    fn mailbox_full(&self) -> SchedulerError {
        SchedulerError::MailboxFull {
            runner: self.shared.core.name().clone(),
            capacity: self.mailbox.capacity(),
        }
    }

    /// Queued or hosted by this runner and not yet reclaimed
    pub fn has_process(&self, pid: Pid) -> bool {
        self.shared.directory.contains_key(&pid)
    }

    pub fn has_process_named(&self, name: &str) -> bool {
        let hash = hash_name(name);
        self.shared
            .directory
            .iter()
            .any(|entry| *entry.value() == hash)
    }

    /// Wait for the runner thread to exit
    pub fn join(&self) -> SchedResult<RunnerStatus> {
        self.thread.join(&self.shared.core)
    }

    /// `quit()` then `join()`
    pub fn shutdown(&self) -> SchedResult<RunnerStatus> {
        self.quit()?;
        self.join()
    }

    /// Block until the runner reaches `status`; false on timeout
    pub fn wait_for_status(&self, status: RunnerStatus, timeout: Duration) -> bool {
        self.shared
            .core
            .wait_for_status(|s| s == status, timeout)
            .is_some()
    }

    /// Block until the runner has nothing runnable and has applied every
    /// message posted so far (or has ended); false on timeout
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.shared.core.wait_until_idle(timeout)
    }

    #[inline]
    pub fn name(&self) -> &InlineString {
        self.shared.core.name()
    }

    #[inline]
    pub fn name_hash(&self) -> NameHash {
        self.shared.core.name_hash()
    }

    #[inline]
    pub fn status(&self) -> RunnerStatus {
        self.shared.core.status()
    }

    #[inline]
    pub fn accepted_mask(&self) -> CapabilityMask {
        self.shared.accepted_mask
    }

    #[inline]
    pub fn max_entities(&self) -> usize {
        self.shared.max_entities
    }

    /// Processes queued or hosted, until reclaimed
    pub fn admitted(&self) -> usize {
        self.shared.admitted.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.admitted() >= self.shared.max_entities
    }

    pub fn stats(&self) -> RunnerStatsSnapshot {
        self.shared.core.stats.snapshot()
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        let mailbox = &self.mailbox;
        let core = &self.shared.core;
        self.thread.stop_and_join(core, || {
            core.track_post(|| mailbox.push(ControlMessage::StopRunner))
                .is_ok()
        });
    }
}

impl fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("name", self.name())
            .field("status", &self.status())
            .field("admitted", &self.admitted())
            .field("max_entities", &self.shared.max_entities)
            .field("mask", &self.shared.accepted_mask)
            .finish()
    }
}
