//! Persistent worker threads and the spin barriers that pace them.

mod barrier;
mod workers;

pub use barrier::{spin_until, CycleGate};
pub use workers::{PhaseBody, SpawnOptions, WorkerPool};
