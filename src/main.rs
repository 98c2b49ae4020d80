/*!
 * cothread demo
 *
 * Exercises the scheduling core end to end:
 * - Worker pool running a batch of closures
 * - Process runner time-slicing a few counters, with pause and resume
 * - Task runner executing one-shot tasks in order
 */

use anyhow::{Context, Result};
use cothread::{
    init_tracing, CapabilityMask, Process, ProcessEntry, ProcessStep, SchedulerContext,
    TaskFailure,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Counts slices until it reaches `target`
struct Counter {
    progress: Arc<AtomicU64>,
    target: u64,
}

impl Process for Counter {
    fn run(&mut self, _slice: Duration) -> ProcessStep {
        let done = self.progress.fetch_add(1, Ordering::Relaxed) + 1;
        if done >= self.target {
            ProcessStep::Succeeded
        } else {
            ProcessStep::Continue
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    info!("cothread demo starting");

    let context = SchedulerContext::from_env().context("building scheduler context")?;

    // Worker pool
    let total = Arc::new(AtomicU64::new(0));
    let completions = (1..=8u64)
        .map(|n| {
            let total = Arc::clone(&total);
            context.pool().submit_fn(move || {
                total.fetch_add(n, Ordering::Relaxed);
                if n == 8 {
                    return Err(TaskFailure::new(8, "eight is unlucky"));
                }
                Ok(0)
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .context("submitting pool tasks")?;
    let failures = completions
        .iter()
        .filter(|c| c.wait_for_result() && c.has_error())
        .count();
    info!(sum = total.load(Ordering::Relaxed), failures, stats = ?context.pool().stats(), "Pool batch done");

    // Process runner
    let runner = context
        .processes()
        .create_runner("counters")
        .context("creating runner")?;
    context.processes().start_runners()?;

    let progress = Arc::new(AtomicU64::new(0));
    let pid = context.processes().queue(
        ProcessEntry::new(
            "slow",
            Counter {
                progress: Arc::clone(&progress),
                target: 200,
            },
        )
        .with_mask(CapabilityMask::bit(0))
        .with_child(ProcessEntry::new(
            "follow-up",
            Counter {
                progress: Arc::new(AtomicU64::new(0)),
                target: 10,
            },
        )),
    )?;

    std::thread::sleep(Duration::from_millis(5));
    context.processes().pause(pid)?;
    runner.wait_until_idle(Duration::from_secs(1));
    let paused_at = progress.load(Ordering::Relaxed);
    context.processes().resume(pid)?;
    runner.wait_until_idle(Duration::from_secs(5));
    info!(paused_at, final_progress = progress.load(Ordering::Relaxed), stats = ?runner.stats(), "Process runner idle");

    // Task runner
    let tasks = context.spawn_task_runner("oneshots")?;
    let handles = (0..3)
        .map(|i| tasks.queue(cothread::FnTask::new(move || Ok(i)).with_name(format!("job-{}", i))))
        .collect::<Result<Vec<_>, _>>()?;
    for handle in &handles {
        handle.wait_for_result();
    }
    info!(statuses = ?handles.iter().map(|h| h.status()).collect::<Vec<_>>(), "Task runner done");
    tasks.shutdown()?;

    let clean = context.shutdown();
    info!(clean, "cothread demo finished");
    Ok(())
}
