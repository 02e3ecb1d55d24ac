//! Graph construction and validation, done once per session.

use super::description::GraphDescription;
use crate::error::{Error, Result};
use crate::unit::{EffectUnit, TrackUnit};
use crate::units::Passthrough;
use hashbrown::HashMap;

/// Name of the synthetic section collecting tracks without a section.
pub const DEFAULT_SECTION_NAME: &str = "<default>";

#[derive(Debug, Clone)]
pub struct TrackNode {
    pub name: String,
    /// Destination section index.
    pub section: usize,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct SectionNode {
    pub name: String,
    /// Parent section index, `None` when feeding the score sink.
    pub parent: Option<usize>,
    /// Member tracks in graph-build order. Fixed for the session.
    pub members: Vec<usize>,
    /// Child sections in index order.
    pub children: Vec<usize>,
}

impl SectionNode {
    /// Inputs that must arrive before the section may be mixed.
    pub fn required_inputs(&self) -> usize {
        self.members.len() + self.children.len()
    }
}

/// Topology of a session. Unit objects are held separately by the engine.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub tracks: Vec<TrackNode>,
    pub sections: Vec<SectionNode>,
    /// Sections feeding the score sink, in index order.
    pub roots: Vec<usize>,
    pub default_section: usize,
    track_names: HashMap<String, usize>,
    section_names: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Inputs the score sink waits for.
    pub fn score_required(&self) -> usize {
        self.roots.len()
    }

    pub fn track_index(&self, name: &str) -> Option<usize> {
        self.track_names.get(name).copied()
    }

    pub fn section_index(&self, name: &str) -> Option<usize> {
        self.section_names.get(name).copied()
    }

    /// Longest section chain from a root down to a leaf section.
    pub fn depth(&self) -> usize {
        // Parents always have a lower index than their children.
        let mut levels = vec![0usize; self.sections.len()];
        for (s, node) in self.sections.iter().enumerate() {
            levels[s] = node.parent.map_or(1, |p| levels[p] + 1);
        }
        levels.into_iter().max().unwrap_or(0)
    }
}

/// Validated topology plus the unit objects it schedules.
pub struct BuiltGraph {
    pub graph: DependencyGraph,
    pub track_units: Vec<Box<dyn TrackUnit>>,
    pub section_units: Vec<Box<dyn EffectUnit>>,
    pub score_unit: Box<dyn EffectUnit>,
}

impl DependencyGraph {
    pub fn build(description: GraphDescription) -> Result<BuiltGraph> {
        let GraphDescription {
            tracks,
            sections,
            default_effect,
            score_effect,
        } = description;

        if tracks.is_empty() {
            return Err(Error::MalformedGraph("graph has no tracks".into()));
        }

        let default_section = sections.len();
        let mut section_nodes = Vec::with_capacity(sections.len() + 1);
        let mut section_units: Vec<Box<dyn EffectUnit>> = Vec::with_capacity(sections.len() + 1);
        let mut section_names = HashMap::with_capacity(sections.len() + 1);

        for (index, spec) in sections.into_iter().enumerate() {
            if let Some(parent) = spec.parent {
                // Parents are created first, so a valid parent always has a lower index.
                if parent.index() >= index {
                    return Err(Error::MalformedGraph(format!(
                        "section '{}' references unknown parent section {}",
                        spec.name,
                        parent.index()
                    )));
                }
            }
            if section_names.insert(spec.name.clone(), index).is_some() {
                return Err(Error::MalformedGraph(format!(
                    "duplicate section name '{}'",
                    spec.name
                )));
            }
            section_nodes.push(SectionNode {
                name: spec.name,
                parent: spec.parent.map(|p| p.index()),
                members: Vec::new(),
                children: Vec::new(),
            });
            section_units.push(spec.unit);
        }

        if section_names
            .insert(DEFAULT_SECTION_NAME.to_string(), default_section)
            .is_some()
        {
            return Err(Error::MalformedGraph(format!(
                "section name '{}' is reserved",
                DEFAULT_SECTION_NAME
            )));
        }
        section_nodes.push(SectionNode {
            name: DEFAULT_SECTION_NAME.to_string(),
            parent: None,
            members: Vec::new(),
            children: Vec::new(),
        });
        section_units.push(default_effect.unwrap_or_else(|| Box::new(Passthrough)));

        let mut track_nodes = Vec::with_capacity(tracks.len());
        let mut track_units = Vec::with_capacity(tracks.len());
        let mut track_names = HashMap::with_capacity(tracks.len());

        for (index, spec) in tracks.into_iter().enumerate() {
            let section = match spec.section {
                Some(id) if id.index() < default_section => id.index(),
                Some(id) => {
                    return Err(Error::MalformedGraph(format!(
                        "track '{}' references unknown section {}",
                        spec.name,
                        id.index()
                    )))
                }
                None => default_section,
            };
            if track_names.insert(spec.name.clone(), index).is_some() {
                return Err(Error::MalformedGraph(format!(
                    "duplicate track name '{}'",
                    spec.name
                )));
            }
            section_nodes[section].members.push(index);
            track_nodes.push(TrackNode {
                name: spec.name,
                section,
                active: spec.active,
            });
            track_units.push(spec.unit);
        }

        let mut roots = Vec::new();
        for index in 0..section_nodes.len() {
            match section_nodes[index].parent {
                Some(parent) => section_nodes[parent].children.push(index),
                None => roots.push(index),
            }
        }

        Ok(BuiltGraph {
            graph: DependencyGraph {
                tracks: track_nodes,
                sections: section_nodes,
                roots,
                default_section,
                track_names,
                section_names,
            },
            track_units,
            section_units,
            score_unit: score_effect.unwrap_or_else(|| Box::new(Passthrough)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::StereoMut;
    use crate::clock::CycleControl;
    use crate::error::UnitError;
    use crate::graph::{SectionId, TrackId};
    use std::result::Result;

    struct Silent;

    impl TrackUnit for Silent {
        fn generate_wave(&mut self, _: &CycleControl, _: StereoMut<'_>) -> Result<(), UnitError> {
            Ok(())
        }
    }

    #[test]
    fn test_default_section_collects_orphans() {
        let mut desc = GraphDescription::new();
        let drums = desc.add_section("drums", Box::new(Passthrough));
        desc.add_track("kick", Some(drums), Box::new(Silent));
        desc.add_track("pad", None, Box::new(Silent));
        desc.add_track("snare", Some(drums), Box::new(Silent));

        let built = DependencyGraph::build(desc).unwrap();
        let graph = &built.graph;

        assert_eq!(graph.sections.len(), 2);
        assert_eq!(graph.default_section, 1);
        assert_eq!(graph.sections[0].members, vec![0, 2]);
        assert_eq!(graph.sections[1].members, vec![1]);
        assert_eq!(graph.sections[0].required_inputs(), 2);
        assert_eq!(graph.score_required(), 2);
        assert_eq!(graph.track_index("snare"), Some(2));
        assert_eq!(graph.section_index(DEFAULT_SECTION_NAME), Some(1));
        assert_eq!(built.track_units.len(), 3);
        assert_eq!(built.section_units.len(), 2);
    }

    #[test]
    fn test_nested_sections() {
        let mut desc = GraphDescription::new();
        let bus = desc.add_section("bus", Box::new(Passthrough));
        let strings = desc.add_subsection("strings", bus, Box::new(Passthrough));
        let violins = desc.add_subsection("violins", strings, Box::new(Passthrough));
        desc.add_track("v1", Some(violins), Box::new(Silent));
        desc.add_track("cello", Some(strings), Box::new(Silent));

        let graph = DependencyGraph::build(desc).unwrap().graph;

        assert_eq!(graph.roots, vec![0, 3]);
        assert_eq!(graph.sections[0].children, vec![1]);
        assert_eq!(graph.sections[1].children, vec![2]);
        assert_eq!(graph.sections[1].required_inputs(), 2);
        assert_eq!(graph.sections[3].required_inputs(), 0);
        assert_eq!(graph.depth(), 3);
    }

    #[test]
    fn test_rejects_empty_graph() {
        let desc = GraphDescription::new();
        assert!(matches!(
            DependencyGraph::build(desc),
            Err(Error::MalformedGraph(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_section() {
        let mut desc = GraphDescription::new();
        desc.add_track("lost", Some(SectionId::new(4)), Box::new(Silent));
        assert!(matches!(
            DependencyGraph::build(desc),
            Err(Error::MalformedGraph(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut desc = GraphDescription::new();
        desc.add_track("a", None, Box::new(Silent));
        desc.add_track("a", None, Box::new(Silent));
        assert!(DependencyGraph::build(desc).is_err());

        let mut desc = GraphDescription::new();
        desc.add_section(DEFAULT_SECTION_NAME, Box::new(Passthrough));
        desc.add_track("a", None, Box::new(Silent));
        assert!(DependencyGraph::build(desc).is_err());
    }

    #[test]
    fn test_inactive_flag_carried() {
        let mut desc = GraphDescription::new();
        let t = desc.add_track("a", None, Box::new(Silent));
        desc.set_active(t, false);
        desc.set_active(TrackId::new(99), false);
        let graph = DependencyGraph::build(desc).unwrap().graph;
        assert!(!graph.tracks[0].active);
    }
}
