/*!
 * Scheduler Configuration
 *
 * Construction-time settings for the worker pool and the cooperative runners.
 *
 * Sources, in increasing precedence:
 * - Built-in defaults (`core::limits`)
 * - JSON document (`SchedulerConfig::from_json`)
 * - Environment variables (`SchedulerConfig::from_env`):
 *   - COTHREAD_QUEUE_CAPACITY
 *   - COTHREAD_WORKER_COUNT
 *   - COTHREAD_POOL_QUEUE_CAPACITY (0 = unbounded)
 *   - COTHREAD_MAX_ENTITIES
 *   - COTHREAD_CAPABILITY_MASK (decimal or 0x-hex)
 *   - COTHREAD_TIME_SLICE_MS
 *   - COTHREAD_MAX_RUNNERS
 */

use super::errors::ConfigError;
use super::limits::{
    DEFAULT_CAPABILITY_MASK, DEFAULT_MAX_ENTITIES, DEFAULT_MAX_RUNNERS, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_TIME_SLICE, DEFAULT_WORKER_COUNT, MAX_QUEUE_CAPACITY, MAX_TIME_SLICE, MAX_WORKER_COUNT,
};
use super::types::CapabilityMask;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Mailbox capacity (per region) of each runner
    pub queue_capacity: usize,
    /// Worker threads in the pool
    pub worker_count: usize,
    /// Bound on queued pool tasks (`None` = unbounded FIFO)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_queue_capacity: Option<usize>,
    /// Maximum entities per process runner
    pub max_entities: usize,
    /// Capabilities offered by runners created from this config
    pub accepted_capability_mask: CapabilityMask,
    /// Base time slice per entity per round, in milliseconds
    pub time_slice_ms: u64,
    /// Maximum runners held by a manager
    pub max_runners: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: DEFAULT_WORKER_COUNT,
            pool_queue_capacity: None,
            max_entities: DEFAULT_MAX_ENTITIES,
            accepted_capability_mask: CapabilityMask(DEFAULT_CAPABILITY_MASK),
            time_slice_ms: DEFAULT_TIME_SLICE.as_millis() as u64,
            max_runners: DEFAULT_MAX_RUNNERS,
        }
    }
}

impl SchedulerConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `COTHREAD_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values produced by `lookup` (keyed by environment variable name)
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("COTHREAD_QUEUE_CAPACITY") {
            self.queue_capacity = parse_usize("COTHREAD_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("COTHREAD_WORKER_COUNT") {
            self.worker_count = parse_usize("COTHREAD_WORKER_COUNT", &v)?;
        }
        if let Some(v) = lookup("COTHREAD_POOL_QUEUE_CAPACITY") {
            let cap = parse_usize("COTHREAD_POOL_QUEUE_CAPACITY", &v)?;
            self.pool_queue_capacity = (cap > 0).then_some(cap);
        }
        if let Some(v) = lookup("COTHREAD_MAX_ENTITIES") {
            self.max_entities = parse_usize("COTHREAD_MAX_ENTITIES", &v)?;
        }
        if let Some(v) = lookup("COTHREAD_CAPABILITY_MASK") {
            self.accepted_capability_mask = CapabilityMask(parse_mask("COTHREAD_CAPABILITY_MASK", &v)?);
        }
        if let Some(v) = lookup("COTHREAD_TIME_SLICE_MS") {
            self.time_slice_ms = parse_usize("COTHREAD_TIME_SLICE_MS", &v)? as u64;
        }
        if let Some(v) = lookup("COTHREAD_MAX_RUNNERS") {
            self.max_runners = parse_usize("COTHREAD_MAX_RUNNERS", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values that would make a component unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero("queue_capacity", self.queue_capacity)?;
        non_zero("worker_count", self.worker_count)?;
        non_zero("max_entities", self.max_entities)?;
        non_zero("max_runners", self.max_runners)?;
        non_zero("time_slice_ms", self.time_slice_ms as usize)?;
        if let Some(cap) = self.pool_queue_capacity {
            non_zero("pool_queue_capacity", cap)?;
            at_most("pool_queue_capacity", cap as u64, MAX_QUEUE_CAPACITY as u64)?;
        }
        at_most("queue_capacity", self.queue_capacity as u64, MAX_QUEUE_CAPACITY as u64)?;
        at_most("worker_count", self.worker_count as u64, MAX_WORKER_COUNT as u64)?;
        at_most(
            "time_slice_ms",
            self.time_slice_ms,
            MAX_TIME_SLICE.as_millis() as u64,
        )?;
        Ok(())
    }

    #[inline]
    pub fn time_slice(&self) -> Duration {
        Duration::from_millis(self.time_slice_ms)
    }

    #[inline]
    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_entities(mut self, max: usize) -> Self {
        self.max_entities = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_capability_mask(mut self, mask: CapabilityMask) -> Self {
        self.accepted_capability_mask = mask;
        self
    }
}

pub(crate) fn non_zero(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroValue {
            field: field.into(),
        });
    }
    Ok(())
}

pub(crate) fn at_most(field: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::OutOfRange {
            field: field.into(),
            value,
            max,
        });
    }
    Ok(())
}

fn parse_usize(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        value: raw.into(),
    })
}

fn parse_mask(key: &str, raw: &str) -> Result<u32, ConfigError> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        value: raw.into(),
    })
}
