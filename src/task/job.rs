/*!
 * Jobs
 * Type-erased task plus its completer, as carried through executor queues
 */

use super::completion::{Completer, Completion};
use super::traits::{Task, TaskOptions};
use crate::core::data_structures::InlineString;
use crate::core::limits::TASK_PANICKED;
use crate::core::types::{CapabilityMask, ErrorCode, Priority, StatusCode, NO_ERROR};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

/// What happened when a job executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutcome {
    pub status: Option<StatusCode>,
    pub error: ErrorCode,
}

impl JobOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.error == NO_ERROR
    }
}

trait Execute: Send {
    fn execute(self: Box<Self>) -> JobOutcome;
}

struct TaskJob<T: Task> {
    task: T,
    options: TaskOptions,
    completer: Completer<T>,
}

impl<T: Task> Execute for TaskJob<T> {
    fn execute(self: Box<Self>) -> JobOutcome {
        let TaskJob {
            mut task,
            options,
            completer,
        } = *self;

        task.on_start();
        let ran = catch_unwind(AssertUnwindSafe(|| task.run()));
        let outcome = match ran {
            Ok(Ok(status)) => {
                task.on_success(status);
                JobOutcome {
                    status: Some(status),
                    error: NO_ERROR,
                }
            }
            Ok(Err(failure)) => {
                debug!(task = task.name(), code = failure.code(), error = %failure, "Task failed");
                task.on_error(failure.code());
                JobOutcome {
                    status: None,
                    error: failure.code(),
                }
            }
            Err(_) => {
                error!(task = task.name(), "Task panicked during run");
                task.on_error(TASK_PANICKED);
                JobOutcome {
                    status: None,
                    error: TASK_PANICKED,
                }
            }
        };
        task.on_completion();

        let retained = if options.destroy_on_finish {
            drop(task);
            None
        } else {
            Some(task)
        };
        completer.complete(outcome.status, outcome.error, retained);
        outcome
    }
}

/// A task ready to execute, detached from its concrete type
///
/// Dropping a job without executing it detaches its completion.
pub struct Job {
    name: InlineString,
    priority: Priority,
    mask: CapabilityMask,
    inner: Box<dyn Execute>,
}

impl Job {
    /// Wrap `task`, returning the job and the submitter's handle
    pub fn new<T: Task>(task: T) -> (Self, Completion<T>) {
        let (completer, completion) = Completion::pair();
        let options = task.options();
        let job = Self {
            name: task.name().into(),
            priority: options.priority,
            mask: options.mask,
            inner: Box::new(TaskJob {
                task,
                options,
                completer,
            }),
        };
        (job, completion)
    }

    /// Run all hooks and publish completion
    ///
    /// A panic inside `run` is reported as `TASK_PANICKED`. A panic inside a
    /// hook unwinds out of here and leaves the completion detached.
    pub fn execute(self) -> JobOutcome {
        self.inner.execute()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Capabilities the executing runner must offer
    #[inline]
    pub fn mask(&self) -> CapabilityMask {
        self.mask
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("mask", &self.mask)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::traits::TaskFailure;
    use std::sync::{Arc, Mutex};

    struct Recording {
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Task for Recording {
        fn run(&mut self) -> Result<StatusCode, TaskFailure> {
            self.log.lock().unwrap().push("run");
            if self.fail {
                Err(TaskFailure::with_code(5))
            } else {
                Ok(1)
            }
        }
        fn on_start(&mut self) {
            self.log.lock().unwrap().push("start");
        }
        fn on_success(&mut self, _status: StatusCode) {
            self.log.lock().unwrap().push("success");
        }
        fn on_error(&mut self, _code: ErrorCode) {
            self.log.lock().unwrap().push("error");
        }
        fn on_completion(&mut self) {
            self.log.lock().unwrap().push("completion");
        }
    }

    #[test]
    fn test_hook_order_on_success() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (job, completion) = Job::new(Recording {
            log: Arc::clone(&log),
            fail: false,
        });
        let outcome = job.execute();
        assert!(outcome.is_success());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start", "run", "success", "completion"]
        );
        assert!(completion.wait_for_result());
        assert_eq!(completion.status(), Some(1));
    }

    #[test]
    fn test_hook_order_on_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (job, completion) = Job::new(Recording {
            log: Arc::clone(&log),
            fail: true,
        });
        assert_eq!(job.execute().error, 5);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start", "run", "error", "completion"]
        );
        assert!(completion.wait_for_result());
        assert!(completion.has_error());
        // the hook observed the code; the completion keeps the recorded one
        assert_eq!(completion.error(), 5);
    }

    #[test]
    fn test_unexecuted_job_detaches() {
        let (job, completion) = Job::new(Recording {
            log: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        });
        drop(job);
        assert!(!completion.wait_for_result());
    }
}
