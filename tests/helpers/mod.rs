//! Test helpers and fixtures for Sinfonia integration tests
//!
//! Fixture units are deterministic: their output depends only on the cycle's
//! frame position, never on which processor runs them.

#![allow(dead_code)]

use sinfonia::prelude::*;
use sinfonia::{SectionId, TrackId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Exact operations (constant tracks, power-of-two gains).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Per-track call counters.
#[derive(Debug, Default)]
pub struct CallLog {
    pub dispatches: AtomicUsize,
    pub envelopes: AtomicUsize,
    pub waves: AtomicUsize,
    pub advances: AtomicUsize,
    pub ticks: AtomicUsize,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn waves(&self) -> usize {
        self.waves.load(Ordering::SeqCst)
    }

    pub fn advances(&self) -> usize {
        self.advances.load(Ordering::SeqCst)
    }

    pub fn dispatches(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }
}

/// Emits a constant sample value on both channels.
pub struct ConstantTrack {
    value: f32,
    log: Option<Arc<CallLog>>,
}

impl ConstantTrack {
    pub fn boxed(value: f32) -> Box<dyn TrackUnit> {
        Box::new(Self { value, log: None })
    }

    pub fn logged(value: f32, log: &Arc<CallLog>) -> Box<dyn TrackUnit> {
        Box::new(Self {
            value,
            log: Some(Arc::clone(log)),
        })
    }

    fn count(&self, pick: impl Fn(&CallLog) -> &AtomicUsize) {
        if let Some(log) = &self.log {
            pick(log).fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl TrackUnit for ConstantTrack {
    fn dispatch(&mut self, _ctx: &mut ControlContext<'_>) -> Result<(), UnitError> {
        self.count(|l| &l.dispatches);
        Ok(())
    }

    fn update_envelopes(
        &mut self,
        _control: &CycleControl,
        _workspace: &mut Workspace<'_>,
    ) -> Result<(), UnitError> {
        self.count(|l| &l.envelopes);
        Ok(())
    }

    fn generate_wave(&mut self, _control: &CycleControl, mut dest: StereoMut<'_>) -> Result<(), UnitError> {
        self.count(|l| &l.waves);
        dest.fill(self.value);
        Ok(())
    }

    fn advance_duration_clock(&mut self, ticks: u64) {
        self.count(|l| &l.advances);
        if let Some(log) = &self.log {
            log.ticks.fetch_add(ticks as usize, Ordering::SeqCst);
        }
    }
}

/// Sine-like signal derived from the absolute frame position, with an
/// optional CPU burn to give the cost scheduler something to measure.
pub struct WaveTrack {
    step: f32,
    amplitude: f32,
    burn: Duration,
}

impl WaveTrack {
    pub fn boxed(step: f32, amplitude: f32) -> Box<dyn TrackUnit> {
        Self::burning(step, amplitude, Duration::ZERO)
    }

    pub fn burning(step: f32, amplitude: f32, burn: Duration) -> Box<dyn TrackUnit> {
        Box::new(Self {
            step,
            amplitude,
            burn,
        })
    }
}

impl TrackUnit for WaveTrack {
    fn generate_wave(&mut self, control: &CycleControl, dest: StereoMut<'_>) -> Result<(), UnitError> {
        burn(self.burn);
        for (i, (l, r)) in dest.left.iter_mut().zip(dest.right.iter_mut()).enumerate() {
            let phase = (control.start_frame + i as u64) as f32 * self.step;
            *l = phase.sin() * self.amplitude;
            *r = phase.cos() * self.amplitude * 0.5;
        }
        Ok(())
    }
}

/// Spin for `duration` without sleeping.
pub fn burn(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    let until = Instant::now() + duration;
    while Instant::now() < until {
        std::hint::spin_loop();
    }
}

/// Silent until `onset` (absolute frame), then constant `value`.
pub struct OnsetTrack {
    pub onset: u64,
    pub value: f32,
}

impl TrackUnit for OnsetTrack {
    fn generate_wave(&mut self, control: &CycleControl, dest: StereoMut<'_>) -> Result<(), UnitError> {
        for (i, (l, r)) in dest.left.iter_mut().zip(dest.right.iter_mut()).enumerate() {
            if control.start_frame + i as u64 >= self.onset {
                *l = self.value;
                *r = self.value;
            }
        }
        Ok(())
    }
}

/// Reports an evaluation failure on `fail_cycle`, otherwise a constant.
pub struct FailingTrack {
    pub fail_cycle: u64,
    pub log: Arc<CallLog>,
}

impl TrackUnit for FailingTrack {
    fn generate_wave(&mut self, control: &CycleControl, mut dest: StereoMut<'_>) -> Result<(), UnitError> {
        self.log.waves.fetch_add(1, Ordering::SeqCst);
        if control.cycle_index == self.fail_cycle {
            return Err(UnitError::Evaluation("malformed modulation formula".into()));
        }
        dest.fill(1.0);
        Ok(())
    }

    fn advance_duration_clock(&mut self, _ticks: u64) {
        self.log.advances.fetch_add(1, Ordering::SeqCst);
    }
}

/// Panics while generating.
pub struct PanickingTrack;

impl TrackUnit for PanickingTrack {
    fn generate_wave(&mut self, _: &CycleControl, _: StereoMut<'_>) -> Result<(), UnitError> {
        panic!("runaway unit");
    }
}

/// Draws a seed in `dispatch` (allowed) and optionally again in
/// `update_envelopes` (refused during the parallel phase).
pub struct SeededTrack {
    pub seeds: Arc<Mutex<Vec<u64>>>,
    pub draw_in_phase: bool,
}

impl TrackUnit for SeededTrack {
    fn dispatch(&mut self, ctx: &mut ControlContext<'_>) -> Result<(), UnitError> {
        let seed = ctx.issue_seed()?;
        self.seeds.lock().unwrap().push(seed);
        Ok(())
    }

    fn update_envelopes(
        &mut self,
        _control: &CycleControl,
        workspace: &mut Workspace<'_>,
    ) -> Result<(), UnitError> {
        if self.draw_in_phase {
            workspace.issue_seed()?;
        }
        Ok(())
    }

    fn generate_wave(&mut self, _: &CycleControl, _: StereoMut<'_>) -> Result<(), UnitError> {
        Ok(())
    }
}

/// Posts its cycle index to `target` every dispatch and records its own inbox.
/// The target is filled in once the player has been added to the graph.
pub struct Conductor {
    pub target: Arc<OnceLock<TrackId>>,
    pub received: Arc<Mutex<Vec<(u64, f64)>>>,
}

impl TrackUnit for Conductor {
    fn dispatch(&mut self, ctx: &mut ControlContext<'_>) -> Result<(), UnitError> {
        let cycle = ctx.control().cycle_index;
        for command in ctx.inbox() {
            self.received.lock().unwrap().push((cycle, command.value));
        }
        match self.target.get() {
            Some(&target) => ctx.post(target, 1, cycle as f64),
            None => Err(UnitError::Other("conductor has no target".into())),
        }
    }

    fn generate_wave(&mut self, _: &CycleControl, _: StereoMut<'_>) -> Result<(), UnitError> {
        Ok(())
    }
}

/// Plays the level last received and echoes it back to the sender.
#[derive(Default)]
pub struct Player {
    pub level: f32,
}

impl TrackUnit for Player {
    fn dispatch(&mut self, ctx: &mut ControlContext<'_>) -> Result<(), UnitError> {
        let Some(&command) = ctx.inbox().last() else {
            return Ok(());
        };
        self.level = command.value as f32;
        ctx.post(command.source, 2, command.value + 100.0)
    }

    fn generate_wave(&mut self, _: &CycleControl, mut dest: StereoMut<'_>) -> Result<(), UnitError> {
        dest.fill(self.level);
        Ok(())
    }
}

/// Fixed-gain effect.
pub fn gain(value: f32) -> Box<dyn EffectUnit> {
    Box::new(Gain::new(value))
}

pub fn passthrough() -> Box<dyn EffectUnit> {
    Box::new(Passthrough)
}

/// Config with a fixed seed and small cycles.
pub fn config(processors: usize, cycle_frames: usize, total_frames: u64) -> SessionConfig {
    SessionConfig::builder()
        .processors(processors)
        .cycle_frames(cycle_frames)
        .total_frames(total_frames)
        .seed(0x5EED)
        .build()
}

/// Every emitted frame of a finished session, both channels.
pub fn render(session: &mut Session) -> (Vec<f32>, Vec<f32>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let status = session
        .run(|frames| {
            left.extend_from_slice(frames.left);
            right.extend_from_slice(frames.right);
        })
        .expect("render failed");
    assert_eq!(status, CycleStatus::Finished);
    (left, right)
}

pub fn bits(samples: &[f32]) -> Vec<u32> {
    samples.iter().map(|s| s.to_bits()).collect()
}

/// Nested orchestra: two levels of subsections, uneven member counts and a
/// default-section track.
pub fn orchestra(burn: Duration) -> GraphDescription {
    let mut graph = GraphDescription::new();
    let strings = graph.add_section("strings", gain(0.8));
    let violins = graph.add_subsection("violins", strings, gain(0.9));
    let firsts = graph.add_subsection("firsts", violins, passthrough());
    let lows = graph.add_subsection("lows", strings, passthrough());
    let winds = graph.add_section("winds", gain(1.1));
    let perc = graph.add_section("perc", gain(0.7));
    let _empty = graph.add_section("empty", gain(3.0));

    let placements: [(&str, Option<SectionId>); 12] = [
        ("vn1a", Some(firsts)),
        ("vn1b", Some(firsts)),
        ("vn2", Some(violins)),
        ("va", Some(strings)),
        ("vc", Some(lows)),
        ("cb", Some(lows)),
        ("fl", Some(winds)),
        ("ob", Some(winds)),
        ("cl", Some(winds)),
        ("timp", Some(perc)),
        ("solo", None),
        ("narrator", None),
    ];
    for (i, (name, section)) in placements.into_iter().enumerate() {
        let step = 0.01 + i as f32 * 0.003;
        let amplitude = 0.1 + i as f32 * 0.017;
        let cost = burn * (i as u32 % 4);
        graph.add_track(name, section, WaveTrack::burning(step, amplitude, cost));
    }
    graph.score_effect(gain(0.9));
    graph
}
