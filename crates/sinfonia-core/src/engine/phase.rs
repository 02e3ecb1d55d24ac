//! The parallel phase, run by every processor including the coordinator.
//!
//! Processor `p` scans the combined schedule from offset `p` with stride equal
//! to the worker count. Tracks are claimed and rendered into the worker's own
//! bank. Sections are processed once all their inputs have arrived; a section
//! found not ready is remembered and revisited as the scan continues. The
//! worker whose arrival completes a section's inputs processes it at once,
//! cascading upward, so no ready section is left behind at the barrier.

use super::state::SharedState;
use crate::buffer::{StereoMut, StereoRef};
use crate::error::Error;
use crate::graph::SectionNode;
use crate::schedule::ScheduleEntry;
use crate::unit::Workspace;
use std::sync::atomic::Ordering;

impl SharedState {
    pub(crate) fn run_phase(&self, processor: usize) {
        let stride = self.worker_count();
        let worker = &self.workers[processor];
        debug_assert_eq!(worker.bank.processor(), processor);
        debug_assert!(self.control().frames <= worker.bank.frames());
        worker.bank.reset();

        // SAFETY: only `processor` touches its pending list.
        let pending = unsafe { &mut *worker.pending.get() };
        pending.clear();

        let entries = self.schedule().entries();
        let mut index = processor;
        while index < entries.len() {
            if !pending.is_empty() {
                pending.retain(|&s| !self.visit_section(processor, s));
            }
            match entries[index] {
                ScheduleEntry::Track(t) => {
                    if self.tracks[t].status.claim.try_claim() {
                        self.process_track(processor, t);
                    }
                }
                ScheduleEntry::Section(s) => {
                    if !self.visit_section(processor, s) {
                        pending.push(s);
                    }
                }
            }
            index += stride;
        }
        pending.retain(|&s| !self.visit_section(processor, s));
    }

    /// Process `section` if it is ready and unclaimed. Returns `false` while
    /// its inputs are still arriving.
    fn visit_section(&self, processor: usize, section: usize) -> bool {
        let cell = &self.sections[section];
        if !cell.is_ready() {
            return false;
        }
        if cell.status.claim.try_claim() {
            if let Some(parent) = self.process_section(processor, section) {
                self.arrive(processor, parent);
            }
        }
        true
    }

    /// Register one input of `section`; the completing arrival processes it
    /// and carries on up the ancestor chain.
    fn arrive(&self, processor: usize, section: usize) {
        let mut next = Some(section);
        while let Some(section) = next {
            let cell = &self.sections[section];
            let arrived = cell.arrived.fetch_add(1, Ordering::AcqRel) + 1;
            next = if arrived == cell.required && cell.status.claim.try_claim() {
                self.process_section(processor, section)
            } else {
                None
            };
        }
    }

    fn process_track(&self, processor: usize, track: usize) {
        let control = self.control();
        let cell = &self.tracks[track];
        let bank = &self.workers[processor].bank;
        let start = self.now_ns();

        // SAFETY: this worker holds the track's claim.
        let unit = unsafe { cell.unit_mut() };
        // SAFETY: `bank` belongs to this worker; the scratch borrow ends with `workspace`.
        let mut workspace = Workspace::new(processor, unsafe { bank.scratch() }, &self.seeds);
        let mut result = unit.update_envelopes(control, &mut workspace);

        let mut produced = false;
        if result.is_ok() && cell.active.get() && !control.is_silent() {
            // SAFETY: owner bank, claimed track.
            let dest = unsafe { bank.track_slot_mut(track, control.frames) };
            result = unit.generate_wave(control, dest);
            produced = result.is_ok();
        }
        unit.advance_duration_clock(control.ticks);
        cell.status.finish(processor, produced, start, self.now_ns());

        let node = &self.graph.tracks[track];
        if let Err(source) = result {
            self.record_error(
                processor,
                Error::Track {
                    name: node.name.clone(),
                    source,
                },
            );
        }
        self.arrive(processor, node.section);
    }

    /// Returns the parent section this one feeds, if any.
    fn process_section(&self, processor: usize, section: usize) -> Option<usize> {
        let control = self.control();
        let cell = &self.sections[section];
        let node = &self.graph.sections[section];
        let bank = &self.workers[processor].bank;
        let start = self.now_ns();

        // SAFETY: this worker holds the section's claim.
        let unit = unsafe { cell.unit_mut() };
        // SAFETY: owner bank; the scratch borrow ends with `workspace`.
        let mut workspace = Workspace::new(processor, unsafe { bank.scratch() }, &self.seeds);
        let mut result = unit.update_envelopes(control, &mut workspace);

        let mut produced = false;
        if result.is_ok() && !control.is_silent() {
            // SAFETY: owner bank, claimed section.
            let mut dest = unsafe { bank.section_slot_mut(section, control.frames) };
            self.mix_inputs(node, control.frames, &mut dest);
            result = unit.apply_effect(control, dest);
            produced = result.is_ok();
        }
        unit.advance_duration_clock(control.ticks);
        cell.status.finish(processor, produced, start, self.now_ns());

        if let Err(source) = result {
            self.record_error(
                processor,
                Error::Section {
                    name: node.name.clone(),
                    source,
                },
            );
        }
        if node.parent.is_none() {
            self.score_arrived.fetch_add(1, Ordering::AcqRel);
        }
        node.parent
    }

    /// Mix member tracks in build order, then child sections in index order.
    fn mix_inputs(&self, node: &SectionNode, frames: usize, dest: &mut StereoMut<'_>) {
        let tracks = node.members.iter().filter_map(|&t| {
            let owner = self.tracks[t].status.output_bank()?;
            // SAFETY: published by the track's arrival, which the section's
            // readiness check observed with acquire ordering.
            Some(unsafe { self.workers[owner].bank.track_slot(t, frames) })
        });
        let children = node.children.iter().filter_map(|&c| {
            let owner = self.sections[c].status.output_bank()?;
            // SAFETY: as above, through the child's arrival.
            Some(unsafe { self.workers[owner].bank.section_slot(c, frames) })
        });
        mix_into(dest, tracks.chain(children));
    }

    /// Score inputs: top-level sections in index order.
    pub(crate) fn mix_roots(&self, frames: usize, dest: &mut StereoMut<'_>) {
        let roots = self.graph.roots.iter().filter_map(|&r| {
            let owner = self.sections[r].status.output_bank()?;
            // SAFETY: the phase barrier has been passed.
            Some(unsafe { self.workers[owner].bank.section_slot(r, frames) })
        });
        mix_into(dest, roots);
    }
}

/// First input is copied, the rest accumulated. Silence when there are none.
pub(crate) fn mix_into<'a>(dest: &mut StereoMut<'_>, inputs: impl Iterator<Item = StereoRef<'a>>) {
    let mut first = true;
    for input in inputs {
        if first {
            dest.copy_from(input);
            first = false;
        } else {
            dest.accumulate(input);
        }
    }
    if first {
        dest.fill(0.0);
    }
}
