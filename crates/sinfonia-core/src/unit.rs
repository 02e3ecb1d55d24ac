//! Contract between the scheduler and DSP collaborators.
//!
//! Tracks implement [`TrackUnit`]; sections and the score sink implement
//! [`EffectUnit`]. The scheduler decides when and on which thread each method
//! runs; implementations only see the buffers they are handed.

use crate::buffer::StereoMut;
use crate::clock::{CycleControl, SeedIssuer};
use crate::error::UnitError;
use crate::graph::TrackId;

/// Leaf unit producing audio from one sequenced part.
pub trait TrackUnit: Send {
    /// Sequential control update (command dispatch). Runs on the coordinator
    /// in graph-build order before the parallel phase.
    fn dispatch(&mut self, _ctx: &mut ControlContext<'_>) -> Result<(), UnitError> {
        Ok(())
    }

    /// Advance modulation state for this cycle. Must not allocate.
    fn update_envelopes(
        &mut self,
        _control: &CycleControl,
        _workspace: &mut Workspace<'_>,
    ) -> Result<(), UnitError> {
        Ok(())
    }

    /// Render `dest.frames()` frames. `dest` arrives zeroed, so writing and
    /// accumulating are equivalent.
    fn generate_wave(&mut self, control: &CycleControl, dest: StereoMut<'_>)
        -> Result<(), UnitError>;

    /// Called exactly once per cycle, whether or not the other calls succeeded.
    fn advance_duration_clock(&mut self, _ticks: u64) {}
}

/// Effect stage applied by a section or the score sink.
pub trait EffectUnit: Send {
    fn update_envelopes(
        &mut self,
        _control: &CycleControl,
        _workspace: &mut Workspace<'_>,
    ) -> Result<(), UnitError> {
        Ok(())
    }

    /// Process `buffer` in place.
    fn apply_effect(&mut self, control: &CycleControl, buffer: StereoMut<'_>)
        -> Result<(), UnitError>;

    /// Called exactly once per cycle, whether or not the other calls succeeded.
    fn advance_duration_clock(&mut self, _ticks: u64) {}
}

/// Per-processor scratch handed to `update_envelopes`.
pub struct Workspace<'a> {
    processor: usize,
    scratch: &'a mut [f32],
    seeds: &'a SeedIssuer,
}

impl<'a> Workspace<'a> {
    pub(crate) fn new(processor: usize, scratch: &'a mut [f32], seeds: &'a SeedIssuer) -> Self {
        Self {
            processor,
            scratch,
            seeds,
        }
    }

    /// Index of the worker running this unit (0 = coordinator).
    pub fn processor(&self) -> usize {
        self.processor
    }

    /// Cycle-sized mono scratch owned by this worker. Contents are undefined on entry.
    pub fn scratch(&mut self) -> &mut [f32] {
        &mut *self.scratch
    }

    /// Always fails during the parallel phase; seeds must be drawn in `dispatch`.
    pub fn issue_seed(&self) -> Result<u64, UnitError> {
        self.seeds.issue()
    }
}

/// Message one track posts to another during the pre-pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub source: TrackId,
    pub opcode: u32,
    pub value: f64,
}

/// Per-track mailboxes for cross-track command redirection.
#[derive(Debug, Default)]
pub struct CommandBoard {
    inboxes: Vec<Vec<Command>>,
}

impl CommandBoard {
    pub fn new(tracks: usize) -> Self {
        Self {
            inboxes: (0..tracks).map(|_| Vec::new()).collect(),
        }
    }

    pub fn post(&mut self, target: TrackId, command: Command) -> Result<(), UnitError> {
        match self.inboxes.get_mut(target.index()) {
            Some(inbox) => {
                inbox.push(command);
                Ok(())
            }
            None => Err(UnitError::Other(format!(
                "command target {:?} does not exist",
                target
            ))),
        }
    }

    /// Swap track `index`'s inbox with `into` (which must be empty).
    pub(crate) fn take(&mut self, index: usize, into: &mut Vec<Command>) {
        debug_assert!(into.is_empty());
        std::mem::swap(&mut self.inboxes[index], into);
    }

    pub fn pending(&self, target: TrackId) -> usize {
        self.inboxes.get(target.index()).map_or(0, Vec::len)
    }
}

/// Context of one track's sequential control update.
pub struct ControlContext<'a> {
    track: TrackId,
    control: &'a CycleControl,
    inbox: &'a [Command],
    board: &'a mut CommandBoard,
    seeds: &'a SeedIssuer,
}

impl<'a> ControlContext<'a> {
    pub(crate) fn new(
        track: TrackId,
        control: &'a CycleControl,
        inbox: &'a [Command],
        board: &'a mut CommandBoard,
        seeds: &'a SeedIssuer,
    ) -> Self {
        Self {
            track,
            control,
            inbox,
            board,
            seeds,
        }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn control(&self) -> &CycleControl {
        self.control
    }

    /// Commands delivered to this track since its previous dispatch.
    pub fn inbox(&self) -> &[Command] {
        self.inbox
    }

    /// Delivered this cycle if `target` dispatches later in graph order,
    /// otherwise on the next cycle.
    pub fn post(&mut self, target: TrackId, opcode: u32, value: f64) -> Result<(), UnitError> {
        let command = Command {
            source: self.track,
            opcode,
            value,
        };
        self.board.post(target, command)
    }

    pub fn issue_seed(&self) -> Result<u64, UnitError> {
        self.seeds.issue()
    }
}
