//! Error types for sinfonia-core.

use thiserror::Error;

/// Error type for session and cycle operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Malformed graph: {0}")]
    MalformedGraph(String),

    #[error("Track '{name}' failed: {source}")]
    Track {
        name: String,
        #[source]
        source: UnitError,
    },

    #[error("Section '{name}' failed: {source}")]
    Section {
        name: String,
        #[source]
        source: UnitError,
    },

    #[error("Score failed: {source}")]
    Score {
        #[source]
        source: UnitError,
    },

    #[error("Cycle ended with {arrived} of {required} score inputs arrived")]
    IncompleteCycle { arrived: usize, required: usize },

    #[error("Session is faulted; no further cycles can run")]
    SessionFaulted,

    #[error("Worker {processor} panicked during the parallel phase")]
    WorkerPanicked { processor: usize },

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Failure reported by a track or effect unit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("seed issuance is frozen during the parallel phase")]
    SeedIssuanceFrozen,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures raised by a unit during a cycle.
    pub fn is_unit_failure(&self) -> bool {
        matches!(
            self,
            Error::Track { .. } | Error::Section { .. } | Error::Score { .. }
        )
    }
}
