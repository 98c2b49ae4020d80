/*!
 * Runner Statistics
 * Lock-free counters written by a runner thread, read from anywhere
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Serializable point-in-time view of a runner's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunnerStatsSnapshot {
    pub rounds: u64,
    pub slices: u64,
    pub messages_applied: u64,
    pub entities_started: u64,
    pub entities_reclaimed: u64,
    pub active: usize,
    pub paused: usize,
}

/// Atomic runner statistics
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Written only by the runner thread; relaxed ordering throughout
#[repr(C, align(64))]
#[derive(Default)]
pub struct RunnerStats {
    rounds: AtomicU64,
    slices: AtomicU64,
    messages_applied: AtomicU64,
    entities_started: AtomicU64,
    entities_reclaimed: AtomicU64,
    active: AtomicUsize,
    paused: AtomicUsize,
}

impl RunnerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Performance
    /// Hot path - once per round
    #[inline(always)]
    pub fn inc_rounds(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// # Performance
    /// Hot path - once per entity per round
    #[inline(always)]
    pub fn inc_slices(&self) {
        self.slices.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_messages(&self) {
        self.messages_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_started(&self) {
        self.entities_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_reclaimed(&self, count: u64) {
        self.entities_reclaimed.fetch_add(count, Ordering::Relaxed);
    }

    /// Publish collection sizes after the runner changed them
    #[inline]
    pub fn set_population(&self, active: usize, paused: usize) {
        self.active.store(active, Ordering::Relaxed);
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunnerStatsSnapshot {
        RunnerStatsSnapshot {
            rounds: self.rounds.load(Ordering::Relaxed),
            slices: self.slices.load(Ordering::Relaxed),
            messages_applied: self.messages_applied.load(Ordering::Relaxed),
            entities_started: self.entities_started.load(Ordering::Relaxed),
            entities_reclaimed: self.entities_reclaimed.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            paused: self.paused.load(Ordering::Relaxed),
        }
    }
}
