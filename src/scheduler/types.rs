/*!
 * Runner Types
 * Lifecycle status and construction settings of cooperative runners
 */

use crate::core::config::{at_most, non_zero, SchedulerConfig};
use crate::core::data_structures::InlineString;
use crate::core::errors::ConfigError;
use crate::core::limits::{
    DEFAULT_CAPABILITY_MASK, DEFAULT_MAX_ENTITIES, DEFAULT_QUEUE_CAPACITY, DEFAULT_TIME_SLICE,
    MAX_QUEUE_CAPACITY, TASK_RUNNER_QUEUE_CAPACITY,
};
use crate::core::types::CapabilityMask;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Runner lifecycle status
///
/// `NotStarted -> Running <-> Waiting -> WillFinish -> Finished`, or
/// `Terminated` (loop panicked) / `FailedToStart` (no thread).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerStatus {
    NotStarted = 0,
    Running = 1,
    /// Blocked on the mailbox with nothing runnable
    Waiting = 2,
    /// Stop requested; the loop exits after the current round
    WillFinish = 3,
    Finished = 4,
    Terminated = 5,
    FailedToStart = 6,
}

impl RunnerStatus {
    #[inline]
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Waiting,
            3 => Self::WillFinish,
            4 => Self::Finished,
            5 => Self::Terminated,
            _ => Self::FailedToStart,
        }
    }

    /// Thread is up and has not yet exited its loop
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Waiting | Self::WillFinish)
    }

    /// Will never run again
    #[inline]
    pub fn is_ended(self) -> bool {
        matches!(self, Self::Finished | Self::Terminated | Self::FailedToStart)
    }

    /// # Performance
    /// Hot path - used for log fields and serialization
    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::WillFinish => "will_finish",
            Self::Finished => "finished",
            Self::Terminated => "terminated",
            Self::FailedToStart => "failed_to_start",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::NotStarted,
            Self::Running,
            Self::Waiting,
            Self::WillFinish,
            Self::Finished,
            Self::Terminated,
            Self::FailedToStart,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RunnerStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RunnerStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid runner status '{}'", s)))
    }
}

/// Construction settings for one runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub name: InlineString,
    /// Mailbox capacity per region
    pub queue_capacity: usize,
    /// Entities hosted at once (process runners only)
    pub max_entities: usize,
    pub accepted_mask: CapabilityMask,
    /// Base slice each entity's priority multiplies
    pub time_slice: Duration,
}

impl RunnerConfig {
    pub fn new(name: impl Into<InlineString>) -> Self {
        Self {
            name: name.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_entities: DEFAULT_MAX_ENTITIES,
            accepted_mask: CapabilityMask(DEFAULT_CAPABILITY_MASK),
            time_slice: DEFAULT_TIME_SLICE,
        }
    }

    /// Task runners default to a small mailbox
    pub fn for_tasks(name: impl Into<InlineString>) -> Self {
        Self::new(name).with_queue_capacity(TASK_RUNNER_QUEUE_CAPACITY)
    }

    /// Runner settings taken from a scheduler-wide config
    pub fn from_scheduler(name: impl Into<InlineString>, config: &SchedulerConfig) -> Self {
        Self {
            name: name.into(),
            queue_capacity: config.queue_capacity,
            max_entities: config.max_entities,
            accepted_mask: config.accepted_capability_mask,
            time_slice: config.time_slice(),
        }
    }

    /// Reject limits under which a runner could never accept a post
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero("queue_capacity", self.queue_capacity)?;
        at_most(
            "queue_capacity",
            self.queue_capacity as u64,
            MAX_QUEUE_CAPACITY as u64,
        )?;
        non_zero("max_entities", self.max_entities)?;
        Ok(())
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_max_entities(mut self, max: usize) -> Self {
        self.max_entities = max;
        self
    }

    #[must_use]
    pub fn with_mask(mut self, mask: CapabilityMask) -> Self {
        self.accepted_mask = mask;
        self
    }

    #[must_use]
    pub fn with_time_slice(mut self, slice: Duration) -> Self {
        self.time_slice = slice;
        self
    }
}
