//! Cycle scheduler for multi-track audio rendering.
//!
//! A session renders a dependency graph of tracks (leaf units) grouped into
//! sections (effect stages) that feed a single score sink. Each cycle runs a
//! sequential pre-pass, a parallel phase shared by a fixed worker pool, and a
//! sequential post-pass.
//!
//! # Primary API
//!
//! - [`GraphDescription`]: tracks, sections and effects of a session
//! - [`SessionConfig`] / [`SessionConfigBuilder`]: processor count, clocks, trace
//! - [`Session`]: `initialize`, `run_cycle`, `run`, `teardown`
//! - [`TrackUnit`] / [`EffectUnit`]: contract implemented by DSP collaborators
//!
//! # Example
//!
//! ```ignore
//! use sinfonia_core::*;
//!
//! let mut graph = GraphDescription::new();
//! let strings = graph.add_section("strings", Box::new(Gain::new(0.8)));
//! graph.add_track("violin", Some(strings), Box::new(violin));
//!
//! let config = SessionConfig::builder().processors(4).total_frames(48_000).build();
//! let mut session = Session::initialize(graph, config)?;
//! session.run(|frames| sink.write(frames))?;
//! ```
//!
//! Output is bit-identical for every processor count: each unit renders into
//! its own slot and every merge reads its inputs in fixed graph order.

pub mod error;
pub use error::{Error, Result, UnitError};

pub mod config;
pub use config::{SessionConfig, SessionConfigBuilder, TraceConfig, Verbosity, MAX_PROCESSORS};

pub(crate) mod lockfree;
pub use lockfree::{AtomicClaim, AtomicDouble, AtomicFlag, ClaimState};

pub mod arena;
pub mod buffer;
pub use buffer::{StereoBuffer, StereoMut, StereoRef};

pub mod clock;
pub use clock::{CycleControl, SeedIssuer, SessionClock};

pub mod unit;
pub use unit::{Command, CommandBoard, ControlContext, EffectUnit, TrackUnit, Workspace};

pub mod units;
pub use units::{Gain, Passthrough};

pub mod graph;
pub use graph::{DependencyGraph, GraphDescription, SectionId, TrackId, DEFAULT_SECTION_NAME};

pub mod schedule;
pub use schedule::{CombinedSchedule, CostScheduler, ScheduleEntry};

pub(crate) mod bank;

pub mod pool;

pub mod trace;

mod engine;
pub use engine::{
    CycleEvent, CycleReport, CycleState, CycleStatus, ScheduleAudit, Session, StopHandle,
    UnitSpan,
};
