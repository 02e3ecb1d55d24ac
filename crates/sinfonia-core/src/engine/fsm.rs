//! Per-cycle coordinator state machine.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    PreSeq,
    ParallelRunning,
    PostSeq,
    /// Terminal. No further cycles run.
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// Pre-pass starts.
    Begin,
    /// Workers released into the parallel phase.
    Release,
    /// Phase barrier passed.
    Barrier,
    /// Post-pass finished, or the cycle ended before the phase ran.
    Finish,
    Fault,
}

impl CycleState {
    /// Apply `event`. Out-of-order events are a coordinator bug and fault the cycle.
    pub fn on(self, event: CycleEvent) -> CycleState {
        use CycleEvent::*;
        use CycleState::*;

        match (self, event) {
            (Errored, _) | (_, Fault) => Errored,
            (Idle, Begin) => PreSeq,
            (PreSeq, Release) => ParallelRunning,
            (ParallelRunning, Barrier) => PostSeq,
            (PreSeq | PostSeq, Finish) => Idle,
            (state, event) => {
                debug_assert!(false, "illegal cycle transition {state:?} on {event:?}");
                Errored
            }
        }
    }

    pub fn is_errored(self) -> bool {
        self == CycleState::Errored
    }
}
