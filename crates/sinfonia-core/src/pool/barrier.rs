//! Spin-barrier protocol between the coordinator and aux workers.
//!
//! Per cycle an aux worker:
//! 1. announces itself parked,
//! 2. spins until the release generation advances,
//! 3. runs the parallel phase,
//! 4. bumps the completion counter,
//! 5. spins until the end-of-cycle generation catches up.
//!
//! Generations only ever increase, so a worker can never miss a release that
//! happened while it was still finishing the previous cycle.

use crate::lockfree::AtomicFlag;
use crossbeam::utils::{Backoff, CachePadded};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Spinning longer than this counts as idle and falls back to sleep-polling.
const IDLE_AFTER: Duration = Duration::from_millis(20);
const IDLE_POLL: Duration = Duration::from_micros(500);

/// Spin until `ready` holds. Escalates spin → yield → bounded sleep-poll.
#[inline]
pub fn spin_until(mut ready: impl FnMut() -> bool) {
    let backoff = Backoff::new();
    let mut idle_since: Option<Instant> = None;
    while !ready() {
        if !backoff.is_completed() {
            backoff.snooze();
            continue;
        }
        let since = *idle_since.get_or_insert_with(Instant::now);
        if since.elapsed() < IDLE_AFTER {
            thread::yield_now();
        } else {
            thread::sleep(IDLE_POLL);
        }
    }
}

/// Shared counters and flags of the two per-cycle barriers.
#[derive(Debug, Default)]
pub struct CycleGate {
    parked: CachePadded<AtomicUsize>,
    completed: CachePadded<AtomicUsize>,
    release_gen: CachePadded<AtomicU64>,
    end_gen: CachePadded<AtomicU64>,
    exit: AtomicFlag,
    panicked: CachePadded<AtomicUsize>,
}

/// Sentinel for "no worker panicked".
const NO_PANIC: usize = usize::MAX;

impl CycleGate {
    pub fn new() -> Self {
        let gate = Self::default();
        gate.panicked.store(NO_PANIC, Ordering::Relaxed);
        gate
    }

    // ---- worker side ----

    pub fn park(&self) {
        self.parked.fetch_add(1, Ordering::Release);
    }

    /// Wait for a release newer than `seen`. `None` means shut down.
    pub fn wait_release(&self, seen: u64) -> Option<u64> {
        let mut generation = seen;
        spin_until(|| {
            generation = self.release_gen.load(Ordering::Acquire);
            generation > seen || self.exit.get()
        });
        (generation > seen).then_some(generation)
    }

    pub fn complete(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    /// Wait for the end-of-cycle flip of `generation`. `false` means shut down.
    pub fn wait_end(&self, generation: u64) -> bool {
        spin_until(|| self.end_gen.load(Ordering::Acquire) >= generation || self.exit.get());
        self.end_gen.load(Ordering::Acquire) >= generation
    }

    pub fn should_exit(&self) -> bool {
        self.exit.get()
    }

    /// Record a caught panic; the lowest processor index wins.
    pub fn record_panic(&self, processor: usize) {
        self.panicked.fetch_min(processor, Ordering::AcqRel);
    }

    // ---- coordinator side ----

    /// Block until `workers` aux workers have parked.
    pub fn wait_parked(&self, workers: usize) {
        spin_until(|| self.parked.load(Ordering::Acquire) >= workers);
    }

    /// Reset the per-cycle counters and release parked workers.
    /// Everything written before this call is visible to released workers.
    pub fn release(&self) -> u64 {
        self.parked.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.release_gen.fetch_add(1, Ordering::Release) + 1
    }

    /// Block until `workers` aux workers finished the parallel phase.
    pub fn wait_completed(&self, workers: usize) {
        spin_until(|| self.completed.load(Ordering::Acquire) >= workers);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn end_cycle(&self) {
        self.end_gen.fetch_add(1, Ordering::Release);
    }

    pub fn take_panic(&self) -> Option<usize> {
        let processor = self.panicked.swap(NO_PANIC, Ordering::AcqRel);
        (processor != NO_PANIC).then_some(processor)
    }

    pub fn shutdown(&self) {
        self.exit.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_release_generations() {
        let gate = CycleGate::new();
        gate.park();
        gate.wait_parked(1);
        assert_eq!(gate.release(), 1);
        assert_eq!(gate.wait_release(0), Some(1));
        gate.complete();
        gate.wait_completed(1);
        gate.end_cycle();
        assert!(gate.wait_end(1));
    }

    #[test]
    fn test_shutdown_unblocks_waiters() {
        let gate = Arc::new(CycleGate::new());
        let worker = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_release(0))
        };
        thread::sleep(Duration::from_millis(5));
        gate.shutdown();
        assert_eq!(worker.join().unwrap(), None);
        assert!(!gate.wait_end(1));
    }

    #[test]
    fn test_panic_record_keeps_lowest() {
        let gate = CycleGate::new();
        assert_eq!(gate.take_panic(), None);
        gate.record_panic(3);
        gate.record_panic(1);
        gate.record_panic(2);
        assert_eq!(gate.take_panic(), Some(1));
        assert_eq!(gate.take_panic(), None);
    }

    #[test]
    fn test_many_cycles_with_workers() {
        let gate = Arc::new(CycleGate::new());
        let work = Arc::new(AtomicUsize::new(0));
        let aux = 3;

        let handles: Vec<_> = (0..aux)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let work = Arc::clone(&work);
                thread::spawn(move || {
                    let mut seen = 0;
                    loop {
                        gate.park();
                        let Some(generation) = gate.wait_release(seen) else {
                            break;
                        };
                        seen = generation;
                        work.fetch_add(1, Ordering::Relaxed);
                        gate.complete();
                        if !gate.wait_end(generation) {
                            break;
                        }
                    }
                })
            })
            .collect();

        for cycle in 1..=50 {
            gate.wait_parked(aux);
            gate.release();
            gate.wait_completed(aux);
            assert_eq!(work.load(Ordering::Relaxed), cycle * aux);
            gate.end_cycle();
        }

        gate.wait_parked(aux);
        gate.shutdown();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
