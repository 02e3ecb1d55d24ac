//! Lock-free primitives shared between the coordinator and aux workers.

use atomic_float::AtomicF64;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Atomic f64, used for measured unit costs in seconds.
#[derive(Debug)]
pub struct AtomicDouble {
    value: AtomicF64,
}

impl AtomicDouble {
    pub fn new(value: f64) -> Self {
        Self {
            value: AtomicF64::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for AtomicDouble {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Per-cycle claim state of a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClaimState {
    Unclaimed = 0,
    Claimed = 1,
    Done = 2,
}

impl ClaimState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClaimState::Unclaimed,
            1 => ClaimState::Claimed,
            _ => ClaimState::Done,
        }
    }
}

/// Tri-state claim flag. Exactly one thread wins [`try_claim`](Self::try_claim) per cycle.
#[derive(Debug)]
pub struct AtomicClaim {
    state: AtomicU8,
}

impl AtomicClaim {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ClaimState::Unclaimed as u8),
        }
    }

    #[inline]
    pub fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(
                ClaimState::Unclaimed as u8,
                ClaimState::Claimed as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    #[inline]
    pub fn is_unclaimed(&self) -> bool {
        self.state.load(Ordering::Relaxed) == ClaimState::Unclaimed as u8
    }

    #[inline]
    pub fn finish(&self) {
        self.state.store(ClaimState::Done as u8, Ordering::Release);
    }

    #[inline]
    pub fn state(&self) -> ClaimState {
        ClaimState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Only valid while no worker is inside the parallel phase.
    #[inline]
    pub fn reset(&self) {
        self.state
            .store(ClaimState::Unclaimed as u8, Ordering::Relaxed);
    }
}

impl Default for AtomicClaim {
    fn default() -> Self {
        Self::new()
    }
}
