/*!
 * Native Threads
 * Named OS threads with join status and comparable handles
 */

use crate::core::data_structures::InlineString;
use crate::core::errors::SchedulerError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread::{self, JoinHandle, ThreadId};
use thiserror::Error;
use tracing::error;

/// Thread errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ThreadError {
    #[error("Failed to start thread '{name}': {reason}")]
    #[diagnostic(
        code(thread::spawn_failed),
        help("The OS refused to create a thread. Check process thread limits.")
    )]
    SpawnFailed {
        name: InlineString,
        reason: InlineString,
    },

    #[error("Thread '{name}' panicked")]
    #[diagnostic(code(thread::panicked))]
    Panicked { name: InlineString },
}

impl From<ThreadError> for SchedulerError {
    fn from(err: ThreadError) -> Self {
        match err {
            ThreadError::SpawnFailed { name, reason } => {
                SchedulerError::ThreadSpawn(format!("{}: {}", name, reason).into())
            }
            ThreadError::Panicked { name } => SchedulerError::RunnerPanicked(name),
        }
    }
}

/// Comparable identity of a running thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle(ThreadId);

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Joinable named thread whose entry point returns an exit status `T`
pub struct NativeThread<T = ()> {
    name: InlineString,
    id: ThreadHandle,
    join: JoinHandle<T>,
}

impl<T: Send + 'static> NativeThread<T> {
    /// Spawn `entry` on a new named thread
    pub fn start<F>(name: impl Into<InlineString>, entry: F) -> Result<Self, ThreadError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let name = name.into();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(entry)
            .map_err(|e| {
                error!(thread = %name, error = %e, "Failed to spawn thread");
                ThreadError::SpawnFailed {
                    name: name.clone(),
                    reason: e.to_string().into(),
                }
            })?;
        let id = ThreadHandle(join.thread().id());
        Ok(Self { name, id, join })
    }

    /// Wait for the thread to exit and return its exit status
    pub fn join(self) -> Result<T, ThreadError> {
        self.join
            .join()
            .map_err(|_| ThreadError::Panicked { name: self.name })
    }
}

impl<T> NativeThread<T> {
    /// Handle of the calling thread
    #[inline]
    pub fn current() -> ThreadHandle {
        ThreadHandle(thread::current().id())
    }

    #[inline]
    pub fn handle(&self) -> ThreadHandle {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl<T> fmt::Debug for NativeThread<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeThread")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}
