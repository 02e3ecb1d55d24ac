//! Flat, topologically valid ordering of every track and section.

use crate::graph::DependencyGraph;

/// One slot of the Combined Schedule Array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleEntry {
    Track(usize),
    Section(usize),
}

/// Shared iteration space of the parallel phase.
///
/// Contents are fixed for the session. Order is derived from three sibling
/// orderings (root sections, child sections per section, member tracks per
/// section) and re-emitted in post-order, so every section's inputs always
/// precede it.
#[derive(Debug, Clone)]
pub struct CombinedSchedule {
    entries: Vec<ScheduleEntry>,
    pub(crate) root_order: Vec<usize>,
    pub(crate) child_order: Vec<Vec<usize>>,
    pub(crate) member_order: Vec<Vec<usize>>,
    /// Post-order walk stack: (section, next child position).
    walk: Vec<(usize, usize)>,
}

impl CombinedSchedule {
    pub fn new(graph: &DependencyGraph) -> Self {
        let mut schedule = Self {
            entries: Vec::with_capacity(graph.tracks.len() + graph.sections.len()),
            root_order: graph.roots.clone(),
            child_order: graph.sections.iter().map(|s| s.children.clone()).collect(),
            member_order: graph.sections.iter().map(|s| s.members.clone()).collect(),
            walk: Vec::with_capacity(graph.sections.len()),
        };
        schedule.rebuild();
        schedule
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-emit the flat array from the sibling orderings, in place.
    pub(crate) fn rebuild(&mut self) {
        let capacity = self.entries.capacity();
        self.entries.clear();
        for &root in &self.root_order {
            emit(
                &self.child_order,
                &self.member_order,
                root,
                &mut self.walk,
                &mut self.entries,
            );
        }
        debug_assert_eq!(self.entries.capacity(), capacity, "rebuild must not allocate");
    }

    /// Every track precedes its section and every child section precedes its parent.
    pub fn is_topological(&self, graph: &DependencyGraph) -> bool {
        let mut position = vec![usize::MAX; graph.tracks.len() + graph.sections.len()];
        let key = |entry: ScheduleEntry| match entry {
            ScheduleEntry::Track(t) => t,
            ScheduleEntry::Section(s) => graph.tracks.len() + s,
        };
        for (i, &entry) in self.entries.iter().enumerate() {
            position[key(entry)] = i;
        }
        if position.contains(&usize::MAX) {
            return false;
        }
        let tracks_ok = graph.tracks.iter().enumerate().all(|(t, node)| {
            position[key(ScheduleEntry::Track(t))] < position[key(ScheduleEntry::Section(node.section))]
        });
        let sections_ok = graph.sections.iter().enumerate().all(|(s, node)| {
            node.parent.map_or(true, |p| {
                position[key(ScheduleEntry::Section(s))] < position[key(ScheduleEntry::Section(p))]
            })
        });
        tracks_ok && sections_ok
    }
}

/// Post-order emission of the subtree under `root`: child sections, member
/// tracks, then the section. Iterative so chain depth is bounded by the heap.
fn emit(
    child_order: &[Vec<usize>],
    member_order: &[Vec<usize>],
    root: usize,
    walk: &mut Vec<(usize, usize)>,
    out: &mut Vec<ScheduleEntry>,
) {
    walk.clear();
    walk.push((root, 0));
    while let Some(top) = walk.last_mut() {
        let (section, next) = *top;
        if let Some(&child) = child_order[section].get(next) {
            top.1 += 1;
            walk.push((child, 0));
        } else {
            out.extend(member_order[section].iter().map(|&t| ScheduleEntry::Track(t)));
            out.push(ScheduleEntry::Section(section));
            walk.pop();
        }
    }
}
