//! State shared between the coordinator and aux workers.
//!
//! Unit objects, the schedule and the control block live in `UnsafeCell`s.
//! Access is governed by two invariants instead of locks:
//! - the coordinator mutates the schedule, the control block and per-cycle
//!   counters only while no worker is inside the parallel phase;
//! - during the phase a unit is only touched by the worker holding its claim.

use crate::bank::WorkerBank;
use crate::clock::{CycleControl, SeedIssuer};
use crate::error::Error;
use crate::graph::DependencyGraph;
use crate::lockfree::{AtomicClaim, AtomicDouble, AtomicFlag, ClaimState};
use crate::schedule::CombinedSchedule;
use crate::unit::{EffectUnit, TrackUnit};
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

const NO_BANK: usize = usize::MAX;

/// Claim, output location, cost and trace data of one scheduled unit.
#[derive(Debug, Default)]
pub(crate) struct UnitStatus {
    pub(crate) claim: AtomicClaim,
    /// Bank holding this cycle's output, `NO_BANK` when nothing was produced.
    output_bank: AtomicUsize,
    last_cost: AtomicDouble,
    start_ns: AtomicU64,
    end_ns: AtomicU64,
    processor: AtomicUsize,
}

impl UnitStatus {
    fn new() -> Self {
        let status = Self::default();
        status.output_bank.store(NO_BANK, Ordering::Relaxed);
        status
    }

    fn reset(&self) {
        self.claim.reset();
        self.output_bank.store(NO_BANK, Ordering::Relaxed);
    }

    /// Record the outcome of processing on `processor`. Must precede the
    /// arrival increment that publishes it.
    pub(crate) fn finish(&self, processor: usize, produced: bool, start_ns: u64, end_ns: u64) {
        let bank = if produced { processor } else { NO_BANK };
        self.output_bank.store(bank, Ordering::Relaxed);
        self.processor.store(processor, Ordering::Relaxed);
        self.start_ns.store(start_ns, Ordering::Relaxed);
        self.end_ns.store(end_ns, Ordering::Relaxed);
        self.last_cost
            .set(end_ns.saturating_sub(start_ns) as f64 * 1e-9);
        self.claim.finish();
    }

    pub(crate) fn output_bank(&self) -> Option<usize> {
        match self.output_bank.load(Ordering::Relaxed) {
            NO_BANK => None,
            bank => Some(bank),
        }
    }

    /// Wall time of the previous processing, in seconds.
    pub(crate) fn last_cost(&self) -> f64 {
        self.last_cost.get()
    }

    pub(crate) fn span(&self) -> UnitSpan {
        UnitSpan {
            processor: self.processor.load(Ordering::Relaxed),
            start_ns: self.start_ns.load(Ordering::Relaxed),
            end_ns: self.end_ns.load(Ordering::Relaxed),
            cost: self.last_cost(),
        }
    }
}

/// Where and when a unit ran during the last cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSpan {
    pub processor: usize,
    /// Nanoseconds since session start.
    pub start_ns: u64,
    pub end_ns: u64,
    /// Seconds.
    pub cost: f64,
}

pub(crate) struct TrackCell {
    unit: UnsafeCell<Box<dyn TrackUnit>>,
    pub(crate) status: UnitStatus,
    pub(crate) active: AtomicFlag,
}

impl TrackCell {
    fn new(unit: Box<dyn TrackUnit>, active: bool) -> Self {
        Self {
            unit: UnsafeCell::new(unit),
            status: UnitStatus::new(),
            active: AtomicFlag::new(active),
        }
    }

    /// # Safety
    /// Caller holds this track's claim, or no parallel phase is running.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn unit_mut(&self) -> &mut dyn TrackUnit {
        &mut **self.unit.get()
    }
}

pub(crate) struct SectionCell {
    unit: UnsafeCell<Box<dyn EffectUnit>>,
    pub(crate) status: UnitStatus,
    pub(crate) arrived: CachePadded<AtomicUsize>,
    pub(crate) required: usize,
}

impl SectionCell {
    fn new(unit: Box<dyn EffectUnit>, required: usize) -> Self {
        Self {
            unit: UnsafeCell::new(unit),
            status: UnitStatus::new(),
            arrived: CachePadded::new(AtomicUsize::new(0)),
            required,
        }
    }

    /// # Safety
    /// Caller holds this section's claim.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn unit_mut(&self) -> &mut dyn EffectUnit {
        &mut **self.unit.get()
    }

    #[inline]
    pub(crate) fn is_ready(&self) -> bool {
        self.arrived.load(Ordering::Acquire) >= self.required
    }
}

/// Everything one processor owns for the parallel phase.
pub(crate) struct WorkerSlot {
    pub(crate) bank: WorkerBank,
    /// Sections skipped because their inputs were still arriving.
    pub(crate) pending: UnsafeCell<Vec<usize>>,
    /// First failure this worker saw during the current cycle.
    pub(crate) error: Mutex<Option<Error>>,
}

/// Completion snapshot of the last parallel phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleAudit {
    pub tracks_done: usize,
    pub sections_processed: usize,
    /// Sections whose inputs all arrived but which nobody processed.
    pub ready_unclaimed: usize,
    pub score_arrived: usize,
    pub score_required: usize,
}

impl ScheduleAudit {
    pub fn is_complete(&self) -> bool {
        self.ready_unclaimed == 0 && self.score_arrived == self.score_required
    }
}

pub(crate) struct SharedState {
    pub(crate) graph: DependencyGraph,
    pub(crate) tracks: Vec<TrackCell>,
    pub(crate) sections: Vec<SectionCell>,
    pub(crate) score_arrived: CachePadded<AtomicUsize>,
    pub(crate) workers: Vec<WorkerSlot>,
    pub(crate) seeds: SeedIssuer,
    schedule: UnsafeCell<CombinedSchedule>,
    control: UnsafeCell<CycleControl>,
    epoch: Instant,
}

// Interior mutability follows the invariants in the module docs.
unsafe impl Sync for SharedState {}

impl SharedState {
    pub(crate) fn new(
        graph: DependencyGraph,
        track_units: Vec<Box<dyn TrackUnit>>,
        section_units: Vec<Box<dyn EffectUnit>>,
        workers: usize,
        frames: usize,
        seed: u64,
    ) -> Self {
        let tracks = graph
            .tracks
            .iter()
            .zip(track_units)
            .map(|(node, unit)| TrackCell::new(unit, node.active))
            .collect();
        let sections = graph
            .sections
            .iter()
            .zip(section_units)
            .map(|(node, unit)| SectionCell::new(unit, node.required_inputs()))
            .collect();
        let workers = (0..workers)
            .map(|p| WorkerSlot {
                bank: WorkerBank::new(p, graph.tracks.len(), graph.sections.len(), frames),
                pending: UnsafeCell::new(Vec::with_capacity(graph.sections.len())),
                error: Mutex::new(None),
            })
            .collect();
        let schedule = CombinedSchedule::new(&graph);

        Self {
            graph,
            tracks,
            sections,
            score_arrived: CachePadded::new(AtomicUsize::new(0)),
            workers,
            seeds: SeedIssuer::new(seed),
            schedule: UnsafeCell::new(schedule),
            control: UnsafeCell::new(CycleControl::default()),
            epoch: Instant::now(),
        }
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }

    #[inline]
    pub(crate) fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    #[inline]
    pub(crate) fn control(&self) -> &CycleControl {
        // SAFETY: written only by `begin_cycle`, never during the phase.
        unsafe { &*self.control.get() }
    }

    #[inline]
    pub(crate) fn schedule(&self) -> &CombinedSchedule {
        // SAFETY: mutated only through `schedule_mut`, never during the phase.
        unsafe { &*self.schedule.get() }
    }

    /// # Safety
    /// No worker may be inside the parallel phase.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn schedule_mut(&self) -> &mut CombinedSchedule {
        &mut *self.schedule.get()
    }

    /// Publish `control` and reset every per-cycle counter.
    ///
    /// # Safety
    /// No worker may be inside the parallel phase. The following barrier
    /// release publishes these writes.
    pub(crate) unsafe fn begin_cycle(&self, control: CycleControl) {
        *self.control.get() = control;
        for track in &self.tracks {
            track.status.reset();
        }
        for section in &self.sections {
            section.status.reset();
            section.arrived.store(0, Ordering::Relaxed);
        }
        self.score_arrived.store(0, Ordering::Relaxed);
    }

    /// Keep the first failure of `processor` for this cycle.
    pub(crate) fn record_error(&self, processor: usize, error: Error) {
        tracing::warn!(processor, %error, "unit failed");
        let mut slot = self.workers[processor].error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Lowest-worker-index failure of the cycle. Clears every slot.
    pub(crate) fn take_error(&self) -> Option<Error> {
        let mut first = None;
        for worker in &self.workers {
            if let Some(error) = worker.error.lock().take() {
                first.get_or_insert(error);
            }
        }
        first
    }

    pub(crate) fn audit(&self) -> ScheduleAudit {
        let tracks_done = self
            .tracks
            .iter()
            .filter(|t| t.status.claim.state() == ClaimState::Done)
            .count();
        let sections_processed = self
            .sections
            .iter()
            .filter(|s| s.status.claim.state() == ClaimState::Done)
            .count();
        let ready_unclaimed = self
            .sections
            .iter()
            .filter(|s| s.is_ready() && s.status.claim.is_unclaimed())
            .count();

        ScheduleAudit {
            tracks_done,
            sections_processed,
            ready_unclaimed,
            score_arrived: self.score_arrived.load(Ordering::Acquire),
            score_required: self.graph.score_required(),
        }
    }
}
