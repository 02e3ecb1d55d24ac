//! Session lifecycle and the per-cycle coordinator.

use super::fsm::{CycleEvent, CycleState};
use super::state::{ScheduleAudit, SharedState};
use crate::buffer::{StereoBuffer, StereoRef};
use crate::clock::{CycleControl, SessionClock};
use crate::config::{SessionConfig, Verbosity};
use crate::error::{Error, Result};
use crate::graph::{BuiltGraph, DependencyGraph, GraphDescription, SectionId, TrackId};
use crate::lockfree::AtomicFlag;
use crate::pool::{CycleGate, PhaseBody, SpawnOptions, WorkerPool};
use crate::schedule::{CostScheduler, ScheduleEntry};
use crate::trace::{ScheduleTrace, UnitKind};
use crate::unit::{Command, CommandBoard, ControlContext, EffectUnit, Workspace};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// The cycle ran. Silent cycles report zero frames.
    Rendered,
    /// The performance length was reached; nothing ran.
    Finished,
    /// The stop signal was observed; nothing ran.
    Cancelled,
}

impl CycleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Rendered => "rendered",
            CycleStatus::Finished => "finished",
            CycleStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of one successful `run_cycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Frames available through [`Session::output`].
    pub frames: usize,
    pub status: CycleStatus,
    pub cycle_index: u64,
    /// Breakpoint frame that fell inside this cycle.
    pub breakpoint: Option<u64>,
}

impl CycleReport {
    /// The outer loop should stop.
    pub fn is_terminal(&self) -> bool {
        self.status != CycleStatus::Rendered
    }
}

/// Cloneable handle setting a session's stop signal from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicFlag>,
}

impl StopHandle {
    /// Observed at the start of the next cycle, never mid-cycle.
    pub fn stop(&self) {
        self.flag.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.get()
    }
}

/// A rendering session: graph, worker pool, clocks and output buffer.
pub struct Session {
    shared: Arc<SharedState>,
    gate: Arc<CycleGate>,
    pool: Option<WorkerPool>,
    score: Box<dyn EffectUnit>,
    clock: SessionClock,
    board: CommandBoard,
    inbox: Vec<Command>,
    scheduler: CostScheduler,
    output: StereoBuffer,
    emitted: usize,
    audible: bool,
    audit: ScheduleAudit,
    state: CycleState,
    stop: Arc<AtomicFlag>,
    trace: Option<ScheduleTrace>,
    config: SessionConfig,
}

impl Session {
    /// Validate `config`, build the graph and start the worker pool.
    pub fn initialize(description: GraphDescription, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let BuiltGraph {
            graph,
            track_units,
            section_units,
            score_unit,
        } = DependencyGraph::build(description)?;

        let workers = config.worker_count();
        let seed = config.seed.unwrap_or_else(rand::random);
        let trace = config.trace.as_ref().map(ScheduleTrace::create).transpose()?;

        let (tracks, sections, depth) = (graph.tracks.len(), graph.sections.len(), graph.depth());
        let shared = Arc::new(SharedState::new(
            graph,
            track_units,
            section_units,
            workers,
            config.cycle_frames,
            seed,
        ));
        let gate = Arc::new(CycleGate::new());

        let pool = if workers > 1 {
            let body: PhaseBody = {
                let shared = Arc::clone(&shared);
                Arc::new(move |processor| shared.run_phase(processor))
            };
            let options = SpawnOptions {
                pin_threads: config.pin_threads,
                realtime_priority: config.realtime_priority,
            };
            Some(WorkerPool::spawn(workers - 1, Arc::clone(&gate), options, body)?)
        } else {
            None
        };

        let bank_floats: usize = shared.workers.iter().map(|w| w.bank.arena_floats()).sum();
        tracing::info!(tracks, sections, depth, workers, bank_floats, "session initialized");

        Ok(Self {
            shared,
            gate,
            pool,
            score: score_unit,
            clock: SessionClock::new(&config),
            board: CommandBoard::new(tracks),
            inbox: Vec::new(),
            scheduler: CostScheduler::new(),
            output: StereoBuffer::new(config.cycle_frames),
            emitted: 0,
            audible: false,
            audit: ScheduleAudit::default(),
            state: CycleState::Idle,
            stop: Arc::new(AtomicFlag::new(false)),
            trace,
            config,
        })
    }

    /// Run one cycle end to end.
    ///
    /// A failed cycle emits nothing and faults the session: the pool is torn
    /// down and every later call returns [`Error::SessionFaulted`].
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        if self.state != CycleState::Idle {
            self.state = self.state.on(CycleEvent::Fault);
            return Err(Error::SessionFaulted);
        }
        self.emitted = 0;

        if self.stop.get() {
            return Ok(self.idle_report(CycleStatus::Cancelled));
        }
        let Some(control) = self.clock.advance() else {
            return Ok(self.idle_report(CycleStatus::Finished));
        };

        self.state = self.state.on(CycleEvent::Begin);
        let cycle_start = self.shared.now_ns();
        match self.cycle(&control, cycle_start) {
            Ok(report) => Ok(report),
            Err(error) => {
                self.fault(&control, &error, cycle_start);
                Err(error)
            }
        }
    }

    fn idle_report(&self, status: CycleStatus) -> CycleReport {
        CycleReport {
            frames: 0,
            status,
            cycle_index: self.clock.cycles(),
            breakpoint: None,
        }
    }

    fn cycle(&mut self, control: &CycleControl, cycle_start: u64) -> Result<CycleReport> {
        self.pre_pass(control)?;
        self.parallel_phase()?;
        self.post_pass(control)?;

        let breakpoint = self.breakpoint_in(control);
        if let Some(frame) = breakpoint {
            tracing::info!(frame, cycle = control.cycle_index, "breakpoint reached");
        }
        self.write_trace(control, CycleStatus::Rendered.as_str(), cycle_start);
        self.state = self.state.on(CycleEvent::Finish);

        Ok(CycleReport {
            frames: self.emitted,
            status: CycleStatus::Rendered,
            cycle_index: control.cycle_index,
            breakpoint,
        })
    }

    /// Sequential control updates in build order, then schedule reordering.
    fn pre_pass(&mut self, control: &CycleControl) -> Result<()> {
        let shared = &*self.shared;
        // SAFETY: no worker is inside the parallel phase between cycles.
        unsafe { shared.begin_cycle(*control) };

        for (index, cell) in shared.tracks.iter().enumerate() {
            self.board.take(index, &mut self.inbox);
            let result = {
                let mut ctx = ControlContext::new(
                    TrackId::new(index),
                    control,
                    &self.inbox,
                    &mut self.board,
                    &shared.seeds,
                );
                // SAFETY: sequential section; no claims are held.
                unsafe { cell.unit_mut() }.dispatch(&mut ctx)
            };
            self.inbox.clear();
            result.map_err(|source| Error::Track {
                name: shared.graph.tracks[index].name.clone(),
                source,
            })?;
        }

        // Reordering only pays off when entries are shared between workers.
        if shared.worker_count() > 1 {
            // SAFETY: as for `begin_cycle`.
            let schedule = unsafe { shared.schedule_mut() };
            let swaps = self.scheduler.reorder(
                schedule,
                control.cycle_index,
                |t| shared.tracks[t].status.last_cost(),
                |s| shared.sections[s].status.last_cost(),
            );
            if swaps > 0 {
                tracing::trace!(swaps, cycle = control.cycle_index, "schedule reordered");
            }
        }
        Ok(())
    }

    /// Release the workers, run processor 0, wait at the phase barrier and
    /// consolidate failures.
    fn parallel_phase(&mut self) -> Result<()> {
        let shared = &*self.shared;
        let aux = shared.worker_count() - 1;

        shared.seeds.freeze();
        self.state = self.state.on(CycleEvent::Release);
        if self.pool.is_some() {
            self.gate.wait_parked(aux);
            self.gate.release();
        }

        if panic::catch_unwind(AssertUnwindSafe(|| shared.run_phase(0))).is_err() {
            tracing::error!("coordinator panicked during the parallel phase");
            self.gate.record_panic(0);
        }

        if self.pool.is_some() {
            self.gate.wait_completed(aux);
            self.gate.end_cycle();
        }
        shared.seeds.thaw();
        self.state = self.state.on(CycleEvent::Barrier);

        self.audit = shared.audit();
        let error = shared.take_error();
        if let Some(processor) = self.gate.take_panic() {
            return Err(Error::WorkerPanicked { processor });
        }
        if let Some(error) = error {
            return Err(error);
        }
        if !self.audit.is_complete() {
            return Err(Error::IncompleteCycle {
                arrived: self.audit.score_arrived,
                required: self.audit.score_required,
            });
        }
        Ok(())
    }

    /// Score sink: merge, effect, gain, leading-silence trim.
    fn post_pass(&mut self, control: &CycleControl) -> Result<()> {
        let shared = &*self.shared;
        let frames = control.frames;

        // SAFETY: bank 0 is the coordinator's own and the phase is over.
        let scratch = unsafe { shared.workers[0].bank.scratch() };
        let mut workspace = Workspace::new(0, scratch, &shared.seeds);
        let mut result = self.score.update_envelopes(control, &mut workspace);

        let mut emitted = 0;
        if result.is_ok() && !control.is_silent() {
            let mut dest = self.output.view_mut().truncate(frames);
            shared.mix_roots(frames, &mut dest);
            result = self.score.apply_effect(control, dest.reborrow());
            dest.scale(self.config.output_gain);
            emitted = frames;
        }
        self.score.advance_duration_clock(control.ticks);
        result.map_err(|source| Error::Score { source })?;

        if emitted > 0 && self.config.trim_leading_silence && !self.audible {
            let head = self.output.view().truncate(frames);
            match head.first_audible(self.config.silence_threshold) {
                Some(first) => {
                    self.output.discard_front(first, frames);
                    emitted = frames - first;
                    self.audible = true;
                }
                None => emitted = 0,
            }
        }

        self.emitted = emitted;
        Ok(())
    }

    fn breakpoint_in(&self, control: &CycleControl) -> Option<u64> {
        let end = control.start_frame + control.frames as u64;
        self.config
            .breakpoints
            .iter()
            .copied()
            .find(|&frame| control.start_frame <= frame && frame < end)
    }

    fn fault(&mut self, control: &CycleControl, error: &Error, cycle_start: u64) {
        tracing::warn!(%error, cycle = control.cycle_index, "cycle failed, session faulted");
        self.state = self.state.on(CycleEvent::Fault);
        self.emitted = 0;
        self.shared.seeds.thaw();
        self.write_trace(control, "error", cycle_start);
        if let Some(mut pool) = self.pool.take() {
            pool.teardown();
        }
    }

    fn write_trace(&mut self, control: &CycleControl, status: &str, cycle_start: u64) {
        let Some(trace) = self.trace.as_mut() else {
            return;
        };
        let shared = &*self.shared;
        let elapsed_us = shared.now_ns().saturating_sub(cycle_start) / 1_000;

        let mut written = trace.cycle(control, status, self.emitted, elapsed_us);
        if written.is_ok() && trace.verbosity() == Verbosity::Units {
            for &entry in shared.schedule().entries() {
                written = match entry {
                    ScheduleEntry::Track(t) => trace.unit(
                        UnitKind::Track,
                        &shared.graph.tracks[t].name,
                        shared.tracks[t].status.span(),
                        cycle_start,
                    ),
                    ScheduleEntry::Section(s) => trace.unit(
                        UnitKind::Section,
                        &shared.graph.sections[s].name,
                        shared.sections[s].status.span(),
                        cycle_start,
                    ),
                };
                if written.is_err() {
                    break;
                }
            }
        }

        if let Err(error) = written {
            tracing::warn!(%error, "schedule trace disabled after write failure");
            self.trace = None;
        }
    }

    /// Run cycles until the performance finishes or a stop is observed,
    /// handing each cycle's emitted frames to `sink`. Never returns for an
    /// unbounded performance unless stopped.
    pub fn run(&mut self, mut sink: impl FnMut(StereoRef<'_>)) -> Result<CycleStatus> {
        loop {
            let report = self.run_cycle()?;
            if report.is_terminal() {
                return Ok(report.status);
            }
            if report.frames > 0 {
                sink(self.output());
            }
        }
    }

    /// Stop the workers and flush the trace. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.teardown();
        }
        if let Some(mut trace) = self.trace.take() {
            if let Err(error) = trace.flush() {
                tracing::warn!(%error, "failed to flush schedule trace");
            }
        }
        tracing::debug!(cycles = self.clock.cycles(), "session torn down");
    }

    /// Frames emitted by the last cycle.
    pub fn output(&self) -> StereoRef<'_> {
        self.output.view().truncate(self.emitted)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop),
        }
    }

    /// Completion snapshot of the last parallel phase.
    pub fn audit(&self) -> ScheduleAudit {
        self.audit
    }

    /// Current order of the combined schedule.
    pub fn schedule_order(&self) -> &[ScheduleEntry] {
        self.shared.schedule().entries()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.shared.graph
    }

    pub fn track_id(&self, name: &str) -> Option<TrackId> {
        self.shared.graph.track_index(name).map(TrackId::new)
    }

    pub fn section_id(&self, name: &str) -> Option<SectionId> {
        self.shared.graph.section_index(name).map(SectionId::new)
    }

    /// Mute or unmute a track from the next cycle on. Unknown ids are ignored.
    pub fn set_track_active(&mut self, track: TrackId, active: bool) {
        if let Some(cell) = self.shared.tracks.get(track.index()) {
            cell.active.set(active);
        }
    }

    /// Wall time, in seconds, of the track's last processing.
    pub fn last_cost(&self, track: TrackId) -> Option<f64> {
        self.shared
            .tracks
            .get(track.index())
            .map(|cell| cell.status.last_cost())
    }

    /// Processor that handled the track in the last cycle.
    pub fn last_processor(&self, track: TrackId) -> Option<usize> {
        self.shared
            .tracks
            .get(track.index())
            .map(|cell| cell.status.span().processor)
    }

    /// Threads taking part in the parallel phase, coordinator included.
    pub fn worker_count(&self) -> usize {
        self.shared.worker_count()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
