/*!
 * Process Module
 *
 * Long-lived entities for the cooperative runners: the `Process` hooks,
 * their lifecycle state, and the `ProcessEntry` wrapper carrying identity,
 * capabilities and scheduling weight.
 */

mod entry;
mod traits;
mod types;

pub use entry::ProcessEntry;
pub use traits::Process;
pub use types::{ProcessStatus, ProcessStep};
