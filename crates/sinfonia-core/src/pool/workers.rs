//! Persistent auxiliary worker threads.

use super::barrier::CycleGate;
use crate::error::{Error, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thread_priority::ThreadPriority;

/// Thread placement options for aux workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnOptions {
    pub pin_threads: bool,
    pub realtime_priority: bool,
}

/// Work run by a processor during the parallel phase.
pub type PhaseBody = Arc<dyn Fn(usize) + Send + Sync>;

/// Aux workers `1..=aux`. Processor 0 is the coordinator thread itself.
pub struct WorkerPool {
    gate: Arc<CycleGate>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `aux` workers that run `body` once per released cycle.
    pub fn spawn(
        aux: usize,
        gate: Arc<CycleGate>,
        options: SpawnOptions,
        body: PhaseBody,
    ) -> Result<Self> {
        let mut pool = Self {
            gate,
            handles: Vec::with_capacity(aux),
        };

        for processor in 1..=aux {
            let gate = Arc::clone(&pool.gate);
            let body = Arc::clone(&body);
            let spawned = thread::Builder::new()
                .name(format!("sinfonia-worker-{processor}"))
                .spawn(move || {
                    configure_thread(processor, options);
                    worker_loop(processor, &gate, &*body);
                });

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    // Already-running workers are joined by teardown.
                    pool.teardown();
                    return Err(Error::WorkerSpawn(e));
                }
            }
        }

        tracing::debug!(aux, "worker pool started");
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn gate(&self) -> &Arc<CycleGate> {
        &self.gate
    }

    /// Signal exit and join every worker. Idempotent.
    pub fn teardown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.gate.shutdown();
        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("worker thread exited by panic outside the parallel phase");
            }
        }
        tracing::debug!(count, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn configure_thread(processor: usize, options: SpawnOptions) {
    if options.realtime_priority
        && thread_priority::set_current_thread_priority(ThreadPriority::Max).is_err()
    {
        tracing::warn!(processor, "could not raise worker thread priority");
    }

    if options.pin_threads {
        let cores = core_affinity::get_core_ids().unwrap_or_default();
        if cores.is_empty() {
            tracing::warn!(processor, "no core ids available for pinning");
        } else if !core_affinity::set_for_current(cores[processor % cores.len()]) {
            tracing::warn!(processor, "could not set CPU affinity");
        }
    }
}

fn worker_loop(processor: usize, gate: &CycleGate, body: &(dyn Fn(usize) + Send + Sync)) {
    let mut seen = 0;
    loop {
        gate.park();
        let Some(generation) = gate.wait_release(seen) else {
            break;
        };
        seen = generation;

        if panic::catch_unwind(AssertUnwindSafe(|| body(processor))).is_err() {
            tracing::error!(processor, "worker panicked during the parallel phase");
            gate.record_panic(processor);
        }

        // Always report completion so the coordinator never waits on a dead worker.
        gate.complete();
        if !gate.wait_end(generation) {
            break;
        }
    }
    tracing::trace!(processor, "worker exiting");
}
