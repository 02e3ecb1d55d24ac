//! Cycle coordinator, shared per-cycle state and the parallel phase.

mod fsm;
mod phase;
mod session;
mod state;

pub use fsm::{CycleEvent, CycleState};
pub use session::{CycleReport, CycleStatus, Session, StopHandle};
pub use state::{ScheduleAudit, UnitSpan};
