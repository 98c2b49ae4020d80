/*!
 * Completion Handles
 *
 * Future-like handle for a submitted task, backed by state shared with the
 * executor-side `Completer`.
 *
 * # Lifetimes
 *
 * - `Completer` dropped before publishing: the handle is detached and every
 *   waiter wakes with "no result".
 * - `Completion` dropped first: the executor still publishes; nobody reads it.
 *
 * Neither side holds a reference to the other, so no teardown order can
 * leave a dangling pointer.
 */

use crate::core::types::{ErrorCode, StatusCode, NO_ERROR};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CompletionState<T> {
    complete: bool,
    detached: bool,
    error: ErrorCode,
    status: Option<StatusCode>,
    task: Option<T>,
}

impl<T> CompletionState<T> {
    #[inline]
    fn settled(&self) -> bool {
        self.complete || self.detached
    }
}

struct Shared<T> {
    state: Mutex<CompletionState<T>>,
    signal: Condvar,
}

/// Submitter's handle on a task outcome
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

/// Executor's side of a completion; publishes exactly once
pub struct Completer<T> {
    shared: Arc<Shared<T>>,
    published: bool,
}

impl<T> Completion<T> {
    /// Create a linked handle / completer pair
    pub fn pair() -> (Completer<T>, Completion<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(CompletionState {
                complete: false,
                detached: false,
                error: NO_ERROR,
                status: None,
                task: None,
            }),
            signal: Condvar::new(),
        });
        (
            Completer {
                shared: Arc::clone(&shared),
                published: false,
            },
            Completion { shared },
        )
    }

    /// Block until the task completes or is destroyed
    ///
    /// Returns true if a result is available, false if the task was
    /// destroyed before it completed.
    pub fn wait_for_result(&self) -> bool {
        let mut state = self.shared.state.lock();
        while !state.settled() {
            self.shared.signal.wait(&mut state);
        }
        state.complete
    }

    /// Like `wait_for_result`, returning `None` if `timeout` elapses first
    pub fn wait_for_result_timeout(&self, timeout: Duration) -> Option<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.settled() {
            if self
                .shared
                .signal
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        state.settled().then_some(state.complete)
    }

    pub fn has_result(&self) -> bool {
        self.shared.state.lock().complete
    }

    pub fn has_error(&self) -> bool {
        self.shared.state.lock().error != NO_ERROR
    }

    /// Recorded error code (`0` when none)
    pub fn error(&self) -> ErrorCode {
        self.shared.state.lock().error
    }

    /// Status returned by a successful `run`
    pub fn status(&self) -> Option<StatusCode> {
        self.shared.state.lock().status
    }

    pub fn is_detached(&self) -> bool {
        self.shared.state.lock().detached
    }

    /// Take back a finished task that was submitted with `retain_on_finish`
    pub fn take_task(&self) -> Option<T> {
        self.shared.state.lock().task.take()
    }
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Completion")
            .field("complete", &state.complete)
            .field("detached", &state.detached)
            .field("error", &state.error)
            .field("status", &state.status)
            .finish()
    }
}

impl<T> Completer<T> {
    /// Publish the outcome and wake every waiter
    pub fn complete(mut self, status: Option<StatusCode>, error: ErrorCode, task: Option<T>) {
        {
            let mut state = self.shared.state.lock();
            state.complete = true;
            state.status = status;
            state.error = error;
            state.task = task;
        }
        self.published = true;
        self.shared.signal.notify_all();
    }

    /// True while at least one `Completion` handle is still alive
    pub fn is_observed(&self) -> bool {
        Arc::strong_count(&self.shared) > 1
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        self.shared.state.lock().detached = true;
        self.shared.signal.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_complete_wakes_waiter() {
        let (completer, completion) = Completion::<()>::pair();
        let waiter = {
            let completion = completion.clone();
            thread::spawn(move || completion.wait_for_result())
        };
        thread::sleep(Duration::from_millis(10));
        completer.complete(Some(0), NO_ERROR, None);
        assert!(waiter.join().unwrap());
        assert!(completion.has_result());
        assert_eq!(completion.status(), Some(0));
    }

    #[test]
    fn test_dropped_completer_detaches() {
        let (completer, completion) = Completion::<()>::pair();
        drop(completer);
        assert!(!completion.wait_for_result());
        assert!(completion.is_detached());
        assert!(!completion.has_result());
    }

    #[test]
    fn test_timeout_without_outcome() {
        let (_completer, completion) = Completion::<()>::pair();
        assert_eq!(
            completion.wait_for_result_timeout(Duration::from_millis(5)),
            None
        );
    }

    #[test]
    fn test_error_and_retained_task() {
        let (completer, completion) = Completion::pair();
        completer.complete(None, 9, Some("payload"));
        assert!(completion.wait_for_result());
        assert!(completion.has_error());
        assert_eq!(completion.error(), 9);
        assert_eq!(completion.take_task(), Some("payload"));
        assert_eq!(completion.take_task(), None);
    }

    #[test]
    fn test_observed_tracks_handles() {
        let (completer, completion) = Completion::<()>::pair();
        assert!(completer.is_observed());
        drop(completion);
        assert!(!completer.is_observed());
        completer.complete(None, NO_ERROR, None);
    }
}
