//! Per-processor workspace banks.
//!
//! Each worker owns one bank and is the only thread that ever writes to it.
//! A bank holds one stereo slot per track and per section, plus a mono
//! scratch span for envelope updates. Other workers only read a bank's slots
//! after the matching arrival counter has been observed with acquire ordering.

use crate::arena::{floats_for, SampleArena, Span, StereoSpan};
use crate::buffer::{StereoMut, StereoRef};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct WorkerBank {
    processor: usize,
    frames: usize,
    arena: SampleArena,
    track_slots: Vec<StereoSpan>,
    section_slots: Vec<StereoSpan>,
    scratch: Span,
    // Owner-only lazy-init bookkeeping, reset every cycle.
    track_touched: Vec<AtomicBool>,
}

impl WorkerBank {
    pub fn new(processor: usize, tracks: usize, sections: usize, frames: usize) -> Self {
        let stereo_slots = 2 * (tracks + sections);
        let mut arena = SampleArena::new(floats_for(stereo_slots + 1, frames));

        // Capacity was sized for exactly these spans.
        let mut stereo = || {
            arena
                .alloc_stereo(frames)
                .unwrap_or_else(|| unreachable!("bank arena undersized"))
        };
        let track_slots: Vec<StereoSpan> = (0..tracks).map(|_| stereo()).collect();
        let section_slots: Vec<StereoSpan> = (0..sections).map(|_| stereo()).collect();
        let scratch = arena
            .alloc(frames)
            .unwrap_or_else(|| unreachable!("bank arena undersized"));

        Self {
            processor,
            frames,
            arena,
            track_slots,
            section_slots,
            scratch,
            track_touched: (0..tracks).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn processor(&self) -> usize {
        self.processor
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn arena_floats(&self) -> usize {
        self.arena.capacity()
    }

    /// Start of cycle. Owner only.
    pub fn reset(&self) {
        for flag in &self.track_touched {
            flag.store(false, Ordering::Relaxed);
        }
    }

    #[cfg(test)]
    pub fn track_touched(&self, track: usize) -> bool {
        self.track_touched[track].load(Ordering::Relaxed)
    }

    /// Track slot, zeroed on first access this cycle.
    ///
    /// # Safety
    /// Caller is this bank's owner and holds the track's claim.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn track_slot_mut(&self, track: usize, frames: usize) -> StereoMut<'_> {
        let mut slot = self.arena.stereo_mut(self.track_slots[track]).truncate(frames);
        if !self.track_touched[track].swap(true, Ordering::Relaxed) {
            slot.fill(0.0);
        }
        slot
    }

    /// Section slot. Not zeroed: contents are stale until the caller overwrites them.
    ///
    /// # Safety
    /// Caller is this bank's owner and holds the section's claim.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn section_slot_mut(&self, section: usize, frames: usize) -> StereoMut<'_> {
        self.arena
            .stereo_mut(self.section_slots[section])
            .truncate(frames)
    }

    /// # Safety
    /// The writer of this slot must have published it (release) and the caller
    /// must have observed that publication (acquire).
    pub unsafe fn track_slot(&self, track: usize, frames: usize) -> StereoRef<'_> {
        self.arena.stereo_ref(self.track_slots[track]).truncate(frames)
    }

    /// # Safety
    /// Same contract as [`track_slot`](Self::track_slot).
    pub unsafe fn section_slot(&self, section: usize, frames: usize) -> StereoRef<'_> {
        self.arena
            .stereo_ref(self.section_slots[section])
            .truncate(frames)
    }

    /// # Safety
    /// Owner only, and never while another scratch borrow is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn scratch(&self) -> &mut [f32] {
        self.arena.span_mut(self.scratch)
    }
}
