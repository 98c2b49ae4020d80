/*!
 * Pool Workers
 * The per-thread loop pulling jobs from the shared FIFO
 */

use super::stats::PoolStats;
use crate::core::limits::WORKER_THREAD_PREFIX;
use crate::core::sync::{NativeThread, ThreadError};
use crate::task::Job;
use flume::Receiver;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info_span, trace};

pub(super) fn spawn_worker(
    index: usize,
    jobs: Receiver<Job>,
    stats: Arc<PoolStats>,
) -> Result<NativeThread, ThreadError> {
    let name = format!("{}-{}", WORKER_THREAD_PREFIX, index);
    NativeThread::start(name, move || worker_loop(index, jobs, stats))
}

/// Blocks while the FIFO is empty. `recv` fails only once every sender is
/// gone and the FIFO is drained, so queued jobs always run before exit.
fn worker_loop(index: usize, jobs: Receiver<Job>, stats: Arc<PoolStats>) {
    let span = info_span!("worker", index);
    let _entered = span.enter();
    debug!("Worker started");

    while let Ok(job) = jobs.recv() {
        trace!(task = job.name(), priority = job.priority(), "Executing job");
        stats.begin_execution();
        let name = job.name().to_owned();
        match catch_unwind(AssertUnwindSafe(|| job.execute())) {
            Ok(outcome) => stats.end_execution(outcome.is_success()),
            Err(_) => {
                error!(task = %name, "Task hook panicked; completion detached");
                stats.end_execution(false);
            }
        }
    }

    debug!("Worker exiting");
}
