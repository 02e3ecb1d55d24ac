//! Session clocks and deterministic seed issuance.
//!
//! Both live in the session context instead of process-wide statics. The
//! clock is only advanced by the coordinator during the sequential pre-pass;
//! the seed issuer is frozen for the duration of every parallel phase.

use crate::config::SessionConfig;
use crate::error::UnitError;
use crate::lockfree::AtomicFlag;
use std::sync::atomic::{AtomicU64, Ordering};

/// Values shared with every unit for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleControl {
    pub cycle_index: u64,
    /// Performance frame at which this cycle starts.
    pub start_frame: u64,
    pub frames: usize,
    /// Duration-clock ticks elapsed during this cycle.
    pub ticks: u64,
    /// Cycle lies before the render start point.
    pub fast_forward: bool,
    /// Cycle lies inside a scheduled skip.
    pub skip: bool,
}

impl CycleControl {
    /// Wave generation and effect processing are suppressed this cycle.
    #[inline]
    pub fn is_silent(&self) -> bool {
        self.fast_forward || self.skip
    }
}

/// Frame and tick clock of one session.
#[derive(Debug, Clone)]
pub struct SessionClock {
    sample_rate: u64,
    tick_rate: u64,
    cycle_frames: usize,
    total_frames: Option<u64>,
    fast_forward_to: Option<u64>,
    skip_ranges: Vec<(u64, u64)>,
    position: u64,
    ticks: u64,
    cycles: u64,
}

impl SessionClock {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sample_rate: config.sample_rate as u64,
            tick_rate: config.tick_rate as u64,
            cycle_frames: config.cycle_frames,
            total_frames: config.total_frames,
            fast_forward_to: config.fast_forward_to,
            skip_ranges: config.skip_ranges.clone(),
            position: 0,
            ticks: 0,
            cycles: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_finished(&self) -> bool {
        self.total_frames.is_some_and(|total| self.position >= total)
    }

    /// Compute the next cycle's control block and advance the clock past it.
    /// Returns `None` once the performance length is reached.
    pub fn advance(&mut self) -> Option<CycleControl> {
        let remaining = match self.total_frames {
            Some(total) => total.saturating_sub(self.position),
            None => u64::MAX,
        };
        let frames = (self.cycle_frames as u64).min(remaining) as usize;
        if frames == 0 {
            return None;
        }

        let start = self.position;
        let end = start + frames as u64;

        // Tick position is derived from the absolute frame position so the
        // fractional remainder never drifts.
        let tick_end = (end as u128 * self.tick_rate as u128 / self.sample_rate as u128) as u64;
        let ticks = tick_end - self.ticks;

        let control = CycleControl {
            cycle_index: self.cycles,
            start_frame: start,
            frames,
            ticks,
            fast_forward: self.fast_forward_to.is_some_and(|to| end <= to),
            skip: self
                .skip_ranges
                .iter()
                .any(|&(s, e)| s <= start && end <= e),
        };

        self.position = end;
        self.ticks = tick_end;
        self.cycles += 1;
        Some(control)
    }
}

/// Deterministic seed source (splitmix64).
#[derive(Debug)]
pub struct SeedIssuer {
    state: AtomicU64,
    frozen: AtomicFlag,
}

impl SeedIssuer {
    pub fn new(seed: u64) -> Self {
        Self {
            state: AtomicU64::new(seed),
            frozen: AtomicFlag::new(false),
        }
    }

    /// Issue the next seed. Fails while a parallel phase is running.
    pub fn issue(&self) -> Result<u64, UnitError> {
        if self.frozen.get() {
            return Err(UnitError::SeedIssuanceFrozen);
        }
        let mut z = self
            .state
            .fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed)
            .wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        Ok(z ^ (z >> 31))
    }

    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    pub fn thaw(&self) {
        self.frozen.set(false);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }
}
