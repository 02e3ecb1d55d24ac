//! Dependency graph: tracks grouped by section, sections feeding the score sink.

mod dependency;
mod description;

pub use dependency::{BuiltGraph, DependencyGraph, SectionNode, TrackNode, DEFAULT_SECTION_NAME};
pub use description::{GraphDescription, SectionId, TrackId};
