/*!
 * Process Entries
 * A boxed process plus the identity and scheduling data a runner needs
 */

use super::traits::Process;
use super::types::{ProcessStatus, ProcessStep};
use crate::core::data_structures::InlineString;
use crate::core::id::{next_pid, Pid};
use crate::core::limits::{DEFAULT_PRIORITY, MAX_TIME_SLICE};
use crate::core::types::{hash_name, CapabilityMask, NameHash, Priority};
use std::fmt;
use std::time::Duration;

/// Process ready to be queued on a runner
///
/// PIDs come from the crate-wide sequence and are unique for the lifetime of
/// the program. Names need not be unique; by-name control messages act on
/// the first match.
pub struct ProcessEntry {
    pid: Pid,
    name: InlineString,
    name_hash: NameHash,
    mask: CapabilityMask,
    priority: Priority,
    priority_modifier: u32,
    status: ProcessStatus,
    parent: Option<Pid>,
    child: Option<Box<ProcessEntry>>,
    process: Box<dyn Process>,
}

impl ProcessEntry {
    pub fn new(name: impl Into<InlineString>, process: impl Process) -> Self {
        let name = name.into();
        let name_hash = hash_name(&name);
        Self {
            pid: next_pid(),
            name,
            name_hash,
            mask: CapabilityMask::NONE,
            priority: DEFAULT_PRIORITY,
            priority_modifier: 1,
            status: ProcessStatus::NotStarted,
            parent: None,
            child: None,
            process: Box::new(process),
        }
    }

    /// Capabilities a runner must provide to host this process
    #[must_use]
    pub fn with_mask(mut self, mask: CapabilityMask) -> Self {
        self.mask = mask;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority.max(1);
        self
    }

    #[must_use]
    pub fn with_priority_modifier(mut self, modifier: u32) -> Self {
        self.priority_modifier = modifier.max(1);
        self
    }

    /// Queue `child` on the same runner once this process succeeds
    #[must_use]
    pub fn with_child(mut self, mut child: ProcessEntry) -> Self {
        child.parent = Some(self.pid);
        self.child = Some(Box::new(child));
        self
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn name_hash(&self) -> NameHash {
        self.name_hash
    }

    #[inline]
    pub fn mask(&self) -> CapabilityMask {
        self.mask
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[inline]
    pub fn priority_modifier(&self) -> u32 {
        self.priority_modifier
    }

    #[inline]
    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    #[inline]
    pub fn parent_pid(&self) -> Option<Pid> {
        self.parent
    }

    pub fn child(&self) -> Option<&ProcessEntry> {
        self.child.as_deref()
    }

    pub fn has_child(&self) -> bool {
        self.child.is_some()
    }

    /// Slice for one round: `base × priority × priority_modifier`, capped at `MAX_TIME_SLICE`
    pub fn requested_slice(&self, base: Duration) -> Duration {
        base.saturating_mul(self.priority)
            .saturating_mul(self.priority_modifier)
            .min(MAX_TIME_SLICE)
    }

    pub(crate) fn take_child(&mut self) -> Option<ProcessEntry> {
        self.child.take().map(|child| *child)
    }

    pub(crate) fn set_status(&mut self, status: ProcessStatus) {
        self.status = status;
    }

    /// Run one slice and apply the reported step to the status
    pub(crate) fn run_slice(&mut self, slice: Duration) -> ProcessStep {
        let step = self.process.run(slice);
        match step {
            ProcessStep::Continue => {}
            ProcessStep::Succeeded => self.status = ProcessStatus::Succeeded,
            ProcessStep::Failed => self.status = ProcessStatus::Failed,
        }
        step
    }

    #[inline]
    pub(crate) fn process_mut(&mut self) -> &mut dyn Process {
        self.process.as_mut()
    }
}

impl fmt::Debug for ProcessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessEntry")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("mask", &self.mask)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("parent", &self.parent)
            .field("has_child", &self.child.is_some())
            .finish()
    }
}
