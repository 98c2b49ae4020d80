/*!
 * Runner Handles
 *
 * State every runner shares between its own thread and the threads that
 * control it: identity, lifecycle status with a wait/notify signal,
 * statistics, and the joinable thread slot.
 */

use super::stats::RunnerStats;
use super::types::RunnerStatus;
use crate::core::data_structures::InlineString;
use crate::core::errors::{SchedResult, SchedulerError};
use crate::core::limits::{RUNNER_START_TIMEOUT, RUNNER_STOP_TIMEOUT};
use crate::core::sync::NativeThread;
use crate::core::types::{hash_name, NameHash};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info_span, warn};

/// Identity, status and counters of one runner
pub(crate) struct RunnerCore {
    name: InlineString,
    name_hash: NameHash,
    status: AtomicU8,
    status_lock: Mutex<()>,
    status_changed: Condvar,
    /// Messages that entered the mailbox
    posted: AtomicU64,
    /// Messages the loop has applied
    applied: AtomicU64,
    pub(crate) stats: RunnerStats,
}

impl RunnerCore {
    pub(crate) fn new(name: InlineString) -> Self {
        let name_hash = hash_name(&name);
        Self {
            name,
            name_hash,
            status: AtomicU8::new(RunnerStatus::NotStarted as u8),
            status_lock: Mutex::new(()),
            status_changed: Condvar::new(),
            posted: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            stats: RunnerStats::new(),
        }
    }

    #[inline]
    pub(crate) fn name(&self) -> &InlineString {
        &self.name
    }

    #[inline]
    pub(crate) fn name_hash(&self) -> NameHash {
        self.name_hash
    }

    #[inline]
    pub(crate) fn status(&self) -> RunnerStatus {
        RunnerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: RunnerStatus) {
        let _guard = self.status_lock.lock();
        self.status.store(status as u8, Ordering::Release);
        self.status_changed.notify_all();
    }

    /// Block until `accept(status)` holds; `None` if `timeout` elapsed first
    pub(crate) fn wait_for_status<F>(&self, accept: F, timeout: Duration) -> Option<RunnerStatus>
    where
        F: Fn(RunnerStatus) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut guard = self.status_lock.lock();
        loop {
            let status = self.status();
            if accept(status) {
                return Some(status);
            }
            if self
                .status_changed
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                let status = self.status();
                return accept(status).then_some(status);
            }
        }
    }

    /// Push one message through `push`, counting it as posted first so an
    /// idle wait never sees it applied before it was counted
    pub(crate) fn track_post<T, P>(&self, push: P) -> Result<(), T>
    where
        P: FnOnce() -> Result<(), T>,
    {
        self.posted.fetch_add(1, Ordering::AcqRel);
        push().map_err(|message| {
            let _guard = self.status_lock.lock();
            self.posted.fetch_sub(1, Ordering::AcqRel);
            self.status_changed.notify_all();
            message
        })
    }

    /// Called by the loop for every message it takes out of the mailbox
    #[inline]
    pub(crate) fn mark_applied(&self) {
        self.applied.fetch_add(1, Ordering::AcqRel);
    }

    /// Every posted message has been applied
    #[inline]
    pub(crate) fn mailbox_settled(&self) -> bool {
        self.applied.load(Ordering::Acquire) >= self.posted.load(Ordering::Acquire)
    }

    /// Block until the loop is waiting with every posted message applied,
    /// or has ended
    pub(crate) fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.wait_for_status(
            |s| s.is_ended() || (s == RunnerStatus::Waiting && self.mailbox_settled()),
            timeout,
        )
        .is_some()
    }

    /// Reject control posts once the loop can no longer apply them
    pub(crate) fn ensure_accepting(&self) -> SchedResult<()> {
        if self.status().is_ended() {
            return Err(SchedulerError::NotRunning(self.name.clone()));
        }
        Ok(())
    }
}

/// Joinable slot for a runner's dedicated thread
#[derive(Default)]
pub(crate) struct RunnerThread {
    slot: Mutex<Option<NativeThread<RunnerStatus>>>,
}

impl RunnerThread {
    /// Spawn `body` and wait until it reports that it left `NotStarted`
    pub(crate) fn launch<F>(&self, core: &Arc<RunnerCore>, body: F) -> SchedResult<()>
    where
        F: FnOnce() -> RunnerStatus + Send + 'static,
    {
        let thread_core = Arc::clone(core);
        let spawned = NativeThread::start(format!("runner-{}", core.name()), move || {
            let span = info_span!("runner", name = %thread_core.name());
            let _entered = span.enter();
            match catch_unwind(AssertUnwindSafe(body)) {
                Ok(status) => status,
                Err(_) => {
                    error!("Runner loop panicked");
                    thread_core.set_status(RunnerStatus::Terminated);
                    RunnerStatus::Terminated
                }
            }
        });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                core.set_status(RunnerStatus::FailedToStart);
                return Err(e.into());
            }
        };
        *self.slot.lock() = Some(thread);

        match core.wait_for_status(|s| s != RunnerStatus::NotStarted, RUNNER_START_TIMEOUT) {
            Some(_) => Ok(()),
            None => Err(SchedulerError::Timeout(
                format!("runner '{}' did not start", core.name()).into(),
            )),
        }
    }

    /// Wait for the runner thread to exit and return its final status
    pub(crate) fn join(&self, core: &RunnerCore) -> SchedResult<RunnerStatus> {
        let thread = self
            .slot
            .lock()
            .take()
            .ok_or_else(|| SchedulerError::NotRunning(core.name().clone()))?;
        match thread.join() {
            Ok(status) => Ok(status),
            Err(e) => {
                core.set_status(RunnerStatus::Terminated);
                Err(e.into())
            }
        }
    }

    pub(crate) fn is_launched(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Post a stop through `post` until it lands or the thread is gone, then
    /// join. Gives up after `RUNNER_STOP_TIMEOUT` and detaches the thread.
    pub(crate) fn stop_and_join<P>(&self, core: &RunnerCore, post: P)
    where
        P: FnMut() -> bool,
    {
        self.stop_and_join_within(core, post, RUNNER_STOP_TIMEOUT);
    }

    fn stop_and_join_within<P>(&self, core: &RunnerCore, mut post: P, timeout: Duration)
    where
        P: FnMut() -> bool,
    {
        if !self.is_launched() {
            return;
        }
        let deadline = Instant::now() + timeout;
        while !post() {
            if core.status().is_ended() {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    runner = %core.name(),
                    status = %core.status(),
                    "Stop message never landed; detaching runner thread"
                );
                // dropping the handle detaches the thread
                drop(self.slot.lock().take());
                return;
            }
            std::thread::yield_now();
        }
        if let Err(e) = self.join(core) {
            warn!(runner = %core.name(), error = %e, "Runner did not stop cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_idle_requires_applied_posts() {
        let core = RunnerCore::new("idle".into());
        core.set_status(RunnerStatus::Waiting);
        assert!(core.wait_until_idle(Duration::from_millis(10)));

        assert_eq!(core.track_post(|| Ok::<(), ()>(())), Ok(()));
        assert!(!core.wait_until_idle(Duration::from_millis(20)));

        core.mark_applied();
        assert!(core.wait_until_idle(Duration::from_millis(10)));

        assert_eq!(core.track_post(|| Err::<(), u8>(7)), Err(7));
        assert!(core.mailbox_settled());
    }

    #[test]
    fn test_stop_gives_up_when_post_never_lands() {
        let core = Arc::new(RunnerCore::new("stuck".into()));
        let thread = RunnerThread::default();
        let (release_tx, release_rx) = flume::bounded::<()>(1);
        let body_core = Arc::clone(&core);
        thread
            .launch(&core, move || {
                body_core.set_status(RunnerStatus::Waiting);
                let _ = release_rx.recv();
                body_core.set_status(RunnerStatus::Finished);
                RunnerStatus::Finished
            })
            .unwrap();

        let started = Instant::now();
        thread.stop_and_join_within(&core, || false, Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!thread.is_launched());

        release_tx.send(()).unwrap();
        assert!(core
            .wait_for_status(|s| s == RunnerStatus::Finished, Duration::from_secs(5))
            .is_some());
    }
}
