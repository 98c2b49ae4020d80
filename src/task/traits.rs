/*!
 * Task Traits
 * The contract a one-shot unit of work implements
 */

use crate::core::data_structures::InlineString;
use crate::core::limits::{DEFAULT_PRIORITY, UNSPECIFIED_TASK_ERROR};
use crate::core::types::{CapabilityMask, ErrorCode, Priority, StatusCode, NO_ERROR};
use thiserror::Error;

/// Failure reported by `Task::run`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task failed with code {code}: {message}")]
pub struct TaskFailure {
    code: ErrorCode,
    message: InlineString,
}

impl TaskFailure {
    /// A code of `0` would read as success, so it is recorded as `UNSPECIFIED_TASK_ERROR`
    pub fn new(code: ErrorCode, message: impl Into<InlineString>) -> Self {
        let code = if code == NO_ERROR {
            UNSPECIFIED_TASK_ERROR
        } else {
            code
        };
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn with_code(code: ErrorCode) -> Self {
        Self::new(code, "")
    }

    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Per-task execution options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOptions {
    pub priority: Priority,
    /// Drop the task once it finished instead of handing it back through `Completion::take_task`
    pub destroy_on_finish: bool,
    /// Capabilities a task runner must offer to accept the task
    pub mask: CapabilityMask,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            destroy_on_finish: true,
            mask: CapabilityMask::NONE,
        }
    }
}

impl TaskOptions {
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Keep the finished task so the submitter can take it back
    #[must_use]
    pub fn retain_on_finish(mut self) -> Self {
        self.destroy_on_finish = false;
        self
    }

    #[must_use]
    pub fn with_mask(mut self, mask: CapabilityMask) -> Self {
        self.mask = mask;
        self
    }
}

/// One-shot unit of work
///
/// The executor calls, in order: `on_start`, `run`, then `on_success` or
/// `on_error`, then `on_completion`. Completion is published to the
/// submitter's `Completion` right after `on_completion` returns.
pub trait Task: Send + 'static {
    fn run(&mut self) -> Result<StatusCode, TaskFailure>;

    fn on_start(&mut self) {}

    fn on_success(&mut self, _status: StatusCode) {}

    /// Observes the error code of a failed or panicked `run`
    ///
    /// The completion always receives `code` as recorded before this hook
    /// runs; overriding `on_error` cannot change the code the submitter sees.
    fn on_error(&mut self, _code: ErrorCode) {}

    fn on_completion(&mut self) {}

    fn options(&self) -> TaskOptions {
        TaskOptions::default()
    }

    fn name(&self) -> &str {
        "task"
    }
}

/// Closure adapter for `Task`
pub struct FnTask<F> {
    name: InlineString,
    func: Option<F>,
    options: TaskOptions,
}

impl<F> FnTask<F>
where
    F: FnOnce() -> Result<StatusCode, TaskFailure> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            name: "fn-task".into(),
            func: Some(func),
            options: TaskOptions::default(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<InlineString>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }
}

impl<F> Task for FnTask<F>
where
    F: FnOnce() -> Result<StatusCode, TaskFailure> + Send + 'static,
{
    fn run(&mut self) -> Result<StatusCode, TaskFailure> {
        match self.func.take() {
            Some(func) => func(),
            None => Err(TaskFailure::new(UNSPECIFIED_TASK_ERROR, "already ran")),
        }
    }

    fn options(&self) -> TaskOptions {
        self.options
    }

    fn name(&self) -> &str {
        &self.name
    }
}
