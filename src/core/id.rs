/*!
 * ID Generation
 * Type-safe process identifiers and the crate-wide sequence that hands them out
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u64);

impl Pid {
    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Pid {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

static PROCESS_PIDS: AtomicU64 = AtomicU64::new(1);

/// Allocate a PID from the crate-wide sequence used by `ProcessEntry::new`
///
/// # Performance
/// Lock-free; never recycles, so PIDs stay unique for the process lifetime
#[inline]
pub fn next_pid() -> Pid {
    Pid(PROCESS_PIDS.fetch_add(1, Ordering::Relaxed))
}
