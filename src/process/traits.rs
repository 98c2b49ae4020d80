/*!
 * Process Traits
 * Hooks a long-lived, time-sliced process implements
 */

use super::types::ProcessStep;
use std::time::Duration;

/// Long-lived stateful entity hosted by a `ProcessRunner`
///
/// Every hook runs on the runner's own thread, never concurrently with
/// another process of the same runner.
pub trait Process: Send + 'static {
    /// Do at most roughly `slice` worth of work and report progress
    fn run(&mut self, slice: Duration) -> ProcessStep;

    /// Adopted by a runner
    fn on_start(&mut self) {}

    fn on_pause(&mut self) {}

    fn on_resume(&mut self) {}

    /// Return true to have the runner reclaim the process
    fn on_success(&mut self) -> bool {
        true
    }

    /// Return true to have the runner reclaim the process
    fn on_termination(&mut self) -> bool {
        true
    }

    /// Return true to have the runner reclaim the process
    fn on_failure(&mut self) -> bool {
        true
    }
}
