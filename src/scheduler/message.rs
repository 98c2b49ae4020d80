/*!
 * Control Messages
 * Mailbox vocabulary of the cooperative runners
 */

use crate::core::id::Pid;
use crate::core::types::NameHash;
use crate::process::ProcessEntry;
use crate::task::Job;
use std::fmt;

/// Message posted to a process runner
pub enum ControlMessage {
    QueueEntity(ProcessEntry),
    PauseByPid(Pid),
    PauseByName(NameHash),
    ResumeByPid(Pid),
    ResumeByName(NameHash),
    TerminateByPid(Pid),
    TerminateByName(NameHash),
    TerminateAll,
    StopRunner,
}

impl ControlMessage {
    /// # Performance
    /// Hot path - used as a log field for every applied message
    #[inline(always)]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::QueueEntity(_) => "queue_entity",
            Self::PauseByPid(_) => "pause_by_pid",
            Self::PauseByName(_) => "pause_by_name",
            Self::ResumeByPid(_) => "resume_by_pid",
            Self::ResumeByName(_) => "resume_by_name",
            Self::TerminateByPid(_) => "terminate_by_pid",
            Self::TerminateByName(_) => "terminate_by_name",
            Self::TerminateAll => "terminate_all",
            Self::StopRunner => "stop_runner",
        }
    }
}

impl fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueEntity(entry) => write!(f, "QueueEntity({})", entry.pid()),
            Self::PauseByPid(pid) | Self::ResumeByPid(pid) | Self::TerminateByPid(pid) => {
                write!(f, "{}({})", self.kind(), pid)
            }
            Self::PauseByName(hash) | Self::ResumeByName(hash) | Self::TerminateByName(hash) => {
                write!(f, "{}({:#010x})", self.kind(), hash)
            }
            Self::TerminateAll | Self::StopRunner => f.write_str(self.kind()),
        }
    }
}

/// Message posted to a task runner
#[derive(Debug)]
pub enum TaskMessage {
    QueueTask(Job),
    StopRunner,
}
