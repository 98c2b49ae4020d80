/*!
 * Process Run Loop
 *
 * Body of a process runner's dedicated thread. Owns the active and removed
 * collections outright; every other thread reaches them only through the
 * mailbox.
 *
 * # Rounds
 *
 * 1. Reclaim entities removed during the previous round (an idle runner
 *    reclaims them before it blocks)
 * 2. Give every `Running` entity one slice, in queue order
 * 3. Settle entities that reached a terminal state through their hook;
 *    those asked to be removed are tombstoned and extracted after the scan
 *
 * Between rounds the mailbox is swapped and every message applied in FIFO
 * order. With nothing runnable the thread blocks on the mailbox instead.
 */

use super::message::ControlMessage;
use super::process_runner::ProcessShared;
use super::types::RunnerStatus;
use crate::core::id::Pid;
use crate::core::sync::{DoubleBufferedQueue, SwapOutcome};
use crate::core::types::NameHash;
use crate::process::{ProcessEntry, ProcessStatus};
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

struct Slot {
    entry: ProcessEntry,
    /// Terminal hook already ran
    settled: bool,
    /// Leaves the active list once the current scan ends
    tombstoned: bool,
}

impl Slot {
    fn new(entry: ProcessEntry) -> Self {
        Self {
            entry,
            settled: false,
            tombstoned: false,
        }
    }

    #[inline]
    fn needs_round(&self) -> bool {
        if self.tombstoned {
            return false;
        }
        let status = self.entry.status();
        status == ProcessStatus::Running || (status.is_terminal() && !self.settled)
    }
}

pub(crate) struct RunLoop {
    shared: Arc<ProcessShared>,
    mailbox: DoubleBufferedQueue<ControlMessage>,
    active: Vec<Slot>,
    removed: Vec<ProcessEntry>,
    pause_count: usize,
    time_slice: Duration,
}

impl RunLoop {
    pub(crate) fn new(
        shared: Arc<ProcessShared>,
        mailbox: DoubleBufferedQueue<ControlMessage>,
        time_slice: Duration,
        max_entities: usize,
    ) -> Self {
        Self {
            shared,
            mailbox,
            active: Vec::with_capacity(max_entities),
            removed: Vec::with_capacity(max_entities),
            pause_count: 0,
            time_slice,
        }
    }

    pub(crate) fn run(mut self) -> RunnerStatus {
        let shared = Arc::clone(&self.shared);
        shared.core.set_status(RunnerStatus::Running);
        info!(time_slice_us = self.time_slice.as_micros() as u64, "Process runner loop started");

        while shared.core.status() == RunnerStatus::Running {
            if self.has_runnable() {
                self.run_round();
            } else {
                self.wait_for_messages();
            }
            self.apply_messages();
        }

        self.finish()
    }

    fn has_runnable(&self) -> bool {
        self.active.iter().any(Slot::needs_round)
    }

    fn wait_for_messages(&mut self) {
        self.reclaim();
        self.publish_population();
        self.shared.core.set_status(RunnerStatus::Waiting);
        trace!("Runner idle");
        while !self.mailbox.wait_for_writes(None) {}
        self.shared.core.set_status(RunnerStatus::Running);
    }

    fn run_round(&mut self) {
        self.reclaim();

        let shared = &self.shared;
        let base = self.time_slice;
        shared.core.stats.inc_rounds();

        for slot in self.active.iter_mut() {
            if slot.tombstoned {
                continue;
            }

            if slot.entry.status() == ProcessStatus::Running {
                let slice = slot.entry.requested_slice(base);
                let entry = &mut slot.entry;
                let ran = catch_unwind(AssertUnwindSafe(|| entry.run_slice(slice)));
                shared.core.stats.inc_slices();
                if ran.is_err() {
                    error!(pid = %slot.entry.pid(), name = slot.entry.name(), "Process panicked during slice");
                    slot.entry.set_status(ProcessStatus::Failed);
                }
            }

            if slot.entry.status().is_terminal() && !slot.settled {
                slot.settled = true;
                slot.tombstoned = settle(&mut slot.entry);
            }
        }

        self.extract_tombstoned();
    }

    /// Move tombstoned slots to the removed list, adopting children of
    /// processes that succeeded
    fn extract_tombstoned(&mut self) {
        if !self.active.iter().any(|slot| slot.tombstoned) {
            return;
        }

        let (dead, live): (Vec<Slot>, Vec<Slot>) = mem::take(&mut self.active)
            .into_iter()
            .partition(|slot| slot.tombstoned);
        self.active = live;

        for slot in dead {
            let mut entry = slot.entry;
            if entry.status() == ProcessStatus::Succeeded {
                if let Some(child) = entry.take_child() {
                    self.adopt_child(child);
                }
            }
            self.removed.push(entry);
        }
        self.publish_population();
    }

    fn adopt_child(&mut self, child: ProcessEntry) {
        if !self.shared.accepted_mask.satisfies(child.mask()) {
            warn!(
                pid = %child.pid(),
                parent = ?child.parent_pid(),
                mask = %child.mask(),
                "Runner lacks capabilities for child process; dropping it"
            );
            return;
        }
        self.shared.admitted.fetch_add(1, Ordering::AcqRel);
        debug!(pid = %child.pid(), parent = ?child.parent_pid(), "Adopting child process");
        self.start_entity(child);
    }

    fn reclaim(&mut self) {
        if self.removed.is_empty() {
            return;
        }
        let count = self.removed.len();
        for entry in self.removed.drain(..) {
            self.shared.directory.remove(&entry.pid());
            trace!(pid = %entry.pid(), status = %entry.status(), "Reclaimed process");
        }
        self.shared.admitted.fetch_sub(count, Ordering::AcqRel);
        self.shared.core.stats.add_reclaimed(count as u64);
    }

    fn apply_messages(&mut self) {
        if let SwapOutcome::Pending(unread) = self.mailbox.swap() {
            warn!(unread, "Mailbox read side not drained before swap");
        }
        while let Some(message) = self.mailbox.pop() {
            self.apply(message);
            self.shared.core.mark_applied();
            self.shared.core.stats.inc_messages();
        }
        self.publish_population();
    }

    fn apply(&mut self, message: ControlMessage) {
        trace!(kind = message.kind(), "Applying control message");
        match message {
            ControlMessage::QueueEntity(entry) => self.start_entity(entry),
            ControlMessage::PauseByPid(pid) => {
                let index = self.find_by_pid(pid);
                self.pause(index);
            }
            ControlMessage::PauseByName(hash) => {
                let index = self.find_by_name(hash);
                self.pause(index);
            }
            ControlMessage::ResumeByPid(pid) => {
                let index = self.find_by_pid(pid);
                self.resume(index);
            }
            ControlMessage::ResumeByName(hash) => {
                let index = self.find_by_name(hash);
                self.resume(index);
            }
            ControlMessage::TerminateByPid(pid) => {
                let index = self.find_by_pid(pid);
                self.terminate(index);
            }
            ControlMessage::TerminateByName(hash) => {
                let index = self.find_by_name(hash);
                self.terminate(index);
            }
            ControlMessage::TerminateAll => {
                let count = self.terminate_active();
                info!(count, "Terminated all processes");
            }
            ControlMessage::StopRunner => {
                info!("Stop requested; finishing after this round");
                self.shared.core.set_status(RunnerStatus::WillFinish);
            }
        }
    }

    fn start_entity(&mut self, mut entry: ProcessEntry) {
        entry.set_status(ProcessStatus::Running);
        self.shared.directory.insert(entry.pid(), entry.name_hash());
        entry.process_mut().on_start();
        self.shared.core.stats.inc_started();
        debug!(pid = %entry.pid(), name = entry.name(), priority = entry.priority(), "Process started");
        self.active.push(Slot::new(entry));
    }

    fn find_by_pid(&self, pid: Pid) -> Option<usize> {
        let found = self
            .active
            .iter()
            .position(|slot| !slot.tombstoned && slot.entry.pid() == pid);
        if found.is_none() {
            debug!(pid = %pid, "No active process with pid");
        }
        found
    }

    fn find_by_name(&self, hash: NameHash) -> Option<usize> {
        let found = self
            .active
            .iter()
            .position(|slot| !slot.tombstoned && slot.entry.name_hash() == hash);
        if found.is_none() {
            debug!(name_hash = hash, "No active process with name");
        }
        found
    }

    fn pause(&mut self, index: Option<usize>) {
        let Some(slot) = index.and_then(|i| self.active.get_mut(i)) else {
            return;
        };
        if slot.entry.status() == ProcessStatus::Running {
            slot.entry.set_status(ProcessStatus::Paused);
            slot.entry.process_mut().on_pause();
            self.pause_count += 1;
            debug!(pid = %slot.entry.pid(), paused = self.pause_count, "Process paused");
        }
    }

    fn resume(&mut self, index: Option<usize>) {
        let Some(slot) = index.and_then(|i| self.active.get_mut(i)) else {
            return;
        };
        if slot.entry.status() == ProcessStatus::Paused {
            slot.entry.set_status(ProcessStatus::Running);
            slot.entry.process_mut().on_resume();
            self.pause_count = self.pause_count.saturating_sub(1);
            debug!(pid = %slot.entry.pid(), paused = self.pause_count, "Process resumed");
        }
    }

    /// Marks the process terminated; its termination hook runs next round
    fn terminate(&mut self, index: Option<usize>) {
        let Some(slot) = index.and_then(|i| self.active.get_mut(i)) else {
            return;
        };
        let status = slot.entry.status();
        if status == ProcessStatus::Paused {
            self.pause_count = self.pause_count.saturating_sub(1);
        }
        if status.is_alive() {
            slot.entry.set_status(ProcessStatus::Terminated);
            debug!(pid = %slot.entry.pid(), "Process terminated");
        }
    }

    /// Terminate every active process, run pending termination hooks and move
    /// them all to the removed list
    fn terminate_active(&mut self) -> usize {
        let count = self.active.len();
        for mut slot in mem::take(&mut self.active) {
            if slot.entry.status().is_alive() {
                slot.entry.set_status(ProcessStatus::Terminated);
            }
            if !slot.settled {
                let _ = slot.entry.process_mut().on_termination();
            }
            self.removed.push(slot.entry);
        }
        self.pause_count = 0;
        count
    }

    fn publish_population(&self) {
        self.shared
            .core
            .stats
            .set_population(self.active.len(), self.pause_count);
    }

    fn finish(mut self) -> RunnerStatus {
        let terminated = self.terminate_active();
        self.reclaim();
        let unapplied = self.mailbox.erase_all();
        self.shared.directory.clear();
        self.publish_population();

        self.shared.core.set_status(RunnerStatus::Finished);
        info!(terminated, unapplied, "Process runner finished");
        RunnerStatus::Finished
    }
}

/// Run the hook matching a terminal status; true means "remove me"
fn settle(entry: &mut ProcessEntry) -> bool {
    let status = entry.status();
    let remove = match status {
        ProcessStatus::Succeeded => entry.process_mut().on_success(),
        ProcessStatus::Terminated => entry.process_mut().on_termination(),
        ProcessStatus::Failed => entry.process_mut().on_failure(),
        _ => false,
    };
    debug!(pid = %entry.pid(), status = %status, remove, "Process settled");
    remove
}
