/*!
 * Synchronization Primitives
 *
 * The two primitives every scheduler in the crate is built from:
 * - `DoubleBufferedQueue`: bounded single-reader / many-writer mailbox
 * - `NativeThread`: named OS thread with join status and handle equality
 *
 * Locks and condition variables come from `parking_lot` directly.
 *
 * # Performance
 *
 * - Writers contend only on the write region's mutex
 * - The reader drains its region without taking any lock
 * - Regions are allocated once; swapping exchanges buffers, never copies
 */

mod dual_queue;
mod thread;

pub use dual_queue::{DoubleBufferedQueue, QueueWriter, SwapOutcome};
pub use thread::{NativeThread, ThreadError, ThreadHandle};
