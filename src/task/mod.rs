/*!
 * Task Module
 *
 * One-shot units of work and the completion handles that report on them.
 *
 * # Ownership
 *
 * The executor owns a submitted task for its whole run. Submitters hold a
 * `Completion`, which shares only the outcome with the task side; neither
 * side can observe the other after it is gone.
 */

mod completion;
mod job;
mod traits;

pub use completion::{Completer, Completion};
pub use job::{Job, JobOutcome};
pub use traits::{FnTask, Task, TaskFailure, TaskOptions};
