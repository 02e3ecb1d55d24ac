//! # Sinfonia - Parallel Cycle Scheduler
//!
//! Renders a score of tracks, grouped into sections that feed one score sink,
//! one fixed-size cycle at a time on a persistent worker pool.
//!
//! ## Architecture
//!
//! - **sinfonia-core** - Dependency graph, combined schedule, cost scheduler,
//!   per-processor banks, worker pool and cycle coordinator
//!
//! ## Quick Start
//!
//! ```ignore
//! use sinfonia::prelude::*;
//!
//! let mut graph = GraphDescription::new();
//! let brass = graph.add_section("brass", Box::new(Gain::new(0.7)));
//! graph.add_track("horn", Some(brass), Box::new(horn));
//! graph.add_track("pad", None, Box::new(pad));
//!
//! let config = SessionConfig::builder()
//!     .processors(4)
//!     .total_frames(10 * 48_000)
//!     .seed(1)
//!     .build();
//!
//! let mut session = Session::initialize(graph, config)?;
//! session.run(|frames| writer.write(frames))?;
//! ```

/// Re-export of sinfonia-core for direct access
pub use sinfonia_core as core;

pub use sinfonia_core::{
    // Session
    CycleReport,
    CycleState,
    CycleStatus,
    ScheduleAudit,
    Session,
    StopHandle,
    UnitSpan,

    // Graph
    DependencyGraph,
    GraphDescription,
    SectionId,
    TrackId,
    DEFAULT_SECTION_NAME,

    // Schedule
    CombinedSchedule,
    CostScheduler,
    ScheduleEntry,

    // Unit contract
    Command,
    ControlContext,
    CycleControl,
    EffectUnit,
    Gain,
    Passthrough,
    TrackUnit,
    Workspace,

    // Buffers
    StereoBuffer,
    StereoMut,
    StereoRef,

    // Configuration
    SessionConfig,
    SessionConfigBuilder,
    TraceConfig,
    Verbosity,
    MAX_PROCESSORS,

    // Error
    Error,
    Result,
    UnitError,
};

/// Common imports for building and running a session.
pub mod prelude {
    pub use crate::{
        ControlContext, CycleControl, CycleReport, CycleStatus, EffectUnit, Gain,
        GraphDescription, Passthrough, Session, SessionConfig, StereoMut, StereoRef, TrackUnit,
        UnitError, Workspace,
    };
}
