//! Cost-driven reordering of the Combined Schedule Array.
//!
//! One odd-even transposition pass per cycle over each sibling list. A pass
//! moves every entry at most one position, so a transient cost spike cannot
//! thrash the schedule, while sustained costs sort the list within `n` cycles.

use super::combined::{CombinedSchedule, ScheduleEntry};

/// Compare pairs `(parity, parity+1), (parity+2, parity+3), ...` and swap when
/// the later entry costs strictly more. Returns the number of swaps.
pub fn odd_even_pass<T: Copy>(items: &mut [T], parity: usize, cost: impl Fn(T) -> f64) -> usize {
    let mut swaps = 0;
    let mut i = parity & 1;
    while i + 1 < items.len() {
        if cost(items[i + 1]) > cost(items[i]) {
            items.swap(i, i + 1);
            swaps += 1;
        }
        i += 2;
    }
    swaps
}

/// Reorders a [`CombinedSchedule`] from last cycle's measured costs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostScheduler;

impl CostScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Sibling section lists are ordered by each section's own cost, member
    /// lists by track cost. Returns the number of swaps.
    pub fn reorder(
        &mut self,
        schedule: &mut CombinedSchedule,
        cycle: u64,
        track_cost: impl Fn(usize) -> f64,
        section_cost: impl Fn(usize) -> f64,
    ) -> usize {
        let parity = (cycle & 1) as usize;

        let mut swaps = odd_even_pass(&mut schedule.root_order, parity, &section_cost);
        for children in schedule.child_order.iter_mut() {
            swaps += odd_even_pass(children, parity, &section_cost);
        }
        for members in schedule.member_order.iter_mut() {
            swaps += odd_even_pass(members, parity, &track_cost);
        }

        if swaps > 0 {
            schedule.rebuild();
        }
        swaps
    }
}
