/*!
 * Core Types
 * Common types used across the scheduling core
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::ops::{BitAnd, BitOr};

/// Status code returned by a unit of work (`0` conventionally means success)
pub type StatusCode = i32;

/// Error code carried by a completion (`0` means no error)
pub type ErrorCode = i32;

/// 32-bit hash of an entity or runner name
pub type NameHash = u32;

/// Scheduling weight (higher runs longer per slice)
pub type Priority = u32;

/// Error code meaning "no error"
pub const NO_ERROR: ErrorCode = 0;

// Fixed seeds so that every thread in the process hashes a name identically.
const NAME_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Hash a name down to the 32-bit identity used for lookups by name
///
/// # Performance
/// Hot path - called on every by-name control message
#[inline]
pub fn hash_name(name: &str) -> NameHash {
    let state = ahash::RandomState::with_seeds(NAME_SEEDS[0], NAME_SEEDS[1], NAME_SEEDS[2], NAME_SEEDS[3]);
    let mut hasher = state.build_hasher();
    name.hash(&mut hasher);
    let wide = hasher.finish();
    (wide ^ (wide >> 32)) as NameHash
}

/// Capability bitmask
///
/// A runner advertises the capabilities it provides; an entity declares the
/// capabilities it needs. Admission requires every bit the entity declares
/// to be present on the runner.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMask(pub u32);

impl CapabilityMask {
    /// No capabilities required / provided
    pub const NONE: Self = Self(0);
    /// Every capability bit
    pub const ALL: Self = Self(u32::MAX);

    #[inline(always)]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Single capability bit
    #[inline]
    pub const fn bit(index: u32) -> Self {
        Self(1 << (index % 32))
    }

    /// True when `self` has every bit set in `required`
    #[inline(always)]
    pub const fn satisfies(self, required: CapabilityMask) -> bool {
        (self.0 & required.0) == required.0
    }

    #[inline]
    #[must_use]
    pub const fn with(self, other: CapabilityMask) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for CapabilityMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for CapabilityMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl From<u32> for CapabilityMask {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for CapabilityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityMask({:#010x})", self.0)
    }
}

impl fmt::Display for CapabilityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_name_is_stable() {
        assert_eq!(hash_name("physics"), hash_name("physics"));
        assert_ne!(hash_name("physics"), hash_name("audio"));
    }

    #[test]
    fn test_hash_name_across_threads() {
        let here = hash_name("loader");
        let there = std::thread::spawn(|| hash_name("loader")).join().unwrap();
        assert_eq!(here, there);
    }

    #[test]
    fn test_mask_satisfies() {
        let runner = CapabilityMask(0b1011);
        assert!(runner.satisfies(CapabilityMask(0b0011)));
        assert!(runner.satisfies(CapabilityMask::NONE));
        assert!(!runner.satisfies(CapabilityMask(0b0100)));
        assert!(CapabilityMask::ALL.satisfies(CapabilityMask(0xdead_beef)));
    }

    #[test]
    fn test_mask_bits() {
        let mask = CapabilityMask::bit(0) | CapabilityMask::bit(3);
        assert_eq!(mask.bits(), 0b1001);
        assert_eq!((mask & CapabilityMask::bit(3)).bits(), 0b1000);
    }
}
