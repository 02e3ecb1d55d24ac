//! User-facing graph description, consumed by session initialization.

use crate::unit::{EffectUnit, TrackUnit};

/// Stable identity of a track within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(usize);

impl TrackId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Stable identity of a section within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(usize);

impl SectionId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

pub(crate) struct TrackSpec {
    pub(crate) name: String,
    pub(crate) section: Option<SectionId>,
    pub(crate) active: bool,
    pub(crate) unit: Box<dyn TrackUnit>,
}

pub(crate) struct SectionSpec {
    pub(crate) name: String,
    pub(crate) parent: Option<SectionId>,
    pub(crate) unit: Box<dyn EffectUnit>,
}

/// Tracks, sections and the score effect of one performance.
///
/// # Example
///
/// ```ignore
/// let mut graph = GraphDescription::new();
/// let strings = graph.add_section("strings", Box::new(Gain::new(0.5)));
/// graph.add_track("violin", Some(strings), Box::new(violin));
/// graph.add_track("click", None, Box::new(click)); // default section
/// ```
#[derive(Default)]
pub struct GraphDescription {
    pub(crate) tracks: Vec<TrackSpec>,
    pub(crate) sections: Vec<SectionSpec>,
    pub(crate) default_effect: Option<Box<dyn EffectUnit>>,
    pub(crate) score_effect: Option<Box<dyn EffectUnit>>,
}

impl GraphDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section feeding the score sink.
    pub fn add_section(&mut self, name: impl Into<String>, unit: Box<dyn EffectUnit>) -> SectionId {
        self.push_section(name.into(), None, unit)
    }

    /// Add a section feeding `parent` instead of the score sink.
    pub fn add_subsection(
        &mut self,
        name: impl Into<String>,
        parent: SectionId,
        unit: Box<dyn EffectUnit>,
    ) -> SectionId {
        self.push_section(name.into(), Some(parent), unit)
    }

    fn push_section(
        &mut self,
        name: String,
        parent: Option<SectionId>,
        unit: Box<dyn EffectUnit>,
    ) -> SectionId {
        let id = SectionId::new(self.sections.len());
        self.sections.push(SectionSpec { name, parent, unit });
        id
    }

    /// Add a track. `None` routes it to the default section.
    pub fn add_track(
        &mut self,
        name: impl Into<String>,
        section: Option<SectionId>,
        unit: Box<dyn TrackUnit>,
    ) -> TrackId {
        let id = TrackId::new(self.tracks.len());
        self.tracks.push(TrackSpec {
            name: name.into(),
            section,
            active: true,
            unit,
        });
        id
    }

    /// Initial `active` flag of a track. Inactive tracks are scheduled but render nothing.
    pub fn set_active(&mut self, track: TrackId, active: bool) -> &mut Self {
        if let Some(spec) = self.tracks.get_mut(track.index()) {
            spec.active = active;
        }
        self
    }

    /// Effect of the synthetic section collecting tracks without a section.
    pub fn default_section_effect(&mut self, unit: Box<dyn EffectUnit>) -> &mut Self {
        self.default_effect = Some(unit);
        self
    }

    pub fn score_effect(&mut self, unit: Box<dyn EffectUnit>) -> &mut Self {
        self.score_effect = Some(unit);
        self
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}
