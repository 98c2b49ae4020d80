/*!
 * Worker Pool Statistics
 * Lock-free counters updated from the submit path and every worker
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Serializable point-in-time view of a pool's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub executing: usize,
    pub peak_executing: usize,
}

impl PoolStatsSnapshot {
    /// Tasks accepted but not yet finished
    #[inline]
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.failed)
    }
}

/// Atomic pool statistics
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Relaxed ordering; snapshots are for monitoring, not synchronization
#[repr(C, align(64))]
#[derive(Default)]
pub struct PoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    executing: AtomicUsize,
    peak_executing: AtomicUsize,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Performance
    /// Hot path - called on every submit
    #[inline(always)]
    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a task as executing, tracking the concurrency high-water mark
    #[inline]
    pub fn begin_execution(&self) {
        let now = self.executing.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_executing.fetch_max(now, Ordering::Relaxed);
    }

    #[inline]
    pub fn end_execution(&self, success: bool) {
        self.executing.fetch_sub(1, Ordering::Relaxed);
        if success {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            executing: self.executing.load(Ordering::Relaxed),
            peak_executing: self.peak_executing.load(Ordering::Relaxed),
        }
    }
}
