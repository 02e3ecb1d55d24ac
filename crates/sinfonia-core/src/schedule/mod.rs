//! Combined Schedule Array and the cost scheduler that reorders it between cycles.

mod combined;
mod cost;

pub use combined::{CombinedSchedule, ScheduleEntry};
pub use cost::{odd_even_pass, CostScheduler};
