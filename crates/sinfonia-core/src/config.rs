//! Session configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound on the processor-count override.
pub const MAX_PROCESSORS: usize = 256;

/// How much the schedule trace records per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// One header line per cycle.
    #[default]
    Cycles,
    /// Header plus one line per scheduled unit.
    Units,
}

/// Destination and detail level of the schedule trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub verbosity: Verbosity,
}

/// Configuration for a rendering session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Processor count override. `None` uses every logical CPU.
    pub processors: Option<usize>,
    pub cycle_frames: usize,
    pub sample_rate: u32,
    /// Duration-clock ticks per second.
    pub tick_rate: u32,
    pub total_frames: Option<u64>,
    /// Deterministic seed for the seed issuer.
    pub seed: Option<u64>,
    pub output_gain: f32,
    pub trim_leading_silence: bool,
    pub silence_threshold: f32,
    pub fast_forward_to: Option<u64>,
    /// Half-open frame ranges in which wave generation is suppressed.
    pub skip_ranges: Vec<(u64, u64)>,
    pub breakpoints: Vec<u64>,
    pub trace: Option<TraceConfig>,
    pub pin_threads: bool,
    pub realtime_priority: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            processors: None,
            cycle_frames: 512,
            sample_rate: 48000,
            tick_rate: 960,
            total_frames: None,
            seed: None,
            output_gain: 1.0,
            trim_leading_silence: false,
            silence_threshold: 0.0,
            fast_forward_to: None,
            skip_ranges: Vec::new(),
            breakpoints: Vec::new(),
            trace: None,
            pin_threads: false,
            realtime_priority: false,
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.processors {
            if n > MAX_PROCESSORS {
                return Err(Error::InvalidConfig(format!(
                    "processor count {} out of range (0-{})",
                    n, MAX_PROCESSORS
                )));
            }
        }
        if self.cycle_frames == 0 {
            return Err(Error::InvalidConfig("cycle_frames must be non-zero".into()));
        }
        if self.sample_rate == 0 || self.tick_rate == 0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} and tick_rate {} must be non-zero",
                self.sample_rate, self.tick_rate
            )));
        }
        if !self.output_gain.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "output_gain {} is not finite",
                self.output_gain
            )));
        }
        if self.silence_threshold.is_nan() || self.silence_threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "silence_threshold {} must be non-negative",
                self.silence_threshold
            )));
        }
        if let Some(&(start, end)) = self.skip_ranges.iter().find(|(s, e)| s > e) {
            return Err(Error::InvalidConfig(format!(
                "skip range {}..{} is inverted",
                start, end
            )));
        }
        Ok(())
    }

    /// Number of threads taking part in the parallel phase, coordinator included.
    pub fn worker_count(&self) -> usize {
        let requested = self.processors.unwrap_or_else(num_cpus::get);
        requested.clamp(1, MAX_PROCESSORS)
    }
}

/// Fluent builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn processors(mut self, count: usize) -> Self {
        self.config.processors = Some(count);
        self
    }

    pub fn cycle_frames(mut self, frames: usize) -> Self {
        self.config.cycle_frames = frames;
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.config.sample_rate = rate;
        self
    }

    pub fn tick_rate(mut self, rate: u32) -> Self {
        self.config.tick_rate = rate;
        self
    }

    pub fn total_frames(mut self, frames: u64) -> Self {
        self.config.total_frames = Some(frames);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn output_gain(mut self, gain: f32) -> Self {
        self.config.output_gain = gain;
        self
    }

    /// Drop silent frames until the first audible sample of the performance.
    pub fn trim_leading_silence(mut self, threshold: f32) -> Self {
        self.config.trim_leading_silence = true;
        self.config.silence_threshold = threshold;
        self
    }

    pub fn fast_forward_to(mut self, frame: u64) -> Self {
        self.config.fast_forward_to = Some(frame);
        self
    }

    pub fn skip_range(mut self, start: u64, end: u64) -> Self {
        self.config.skip_ranges.push((start, end));
        self
    }

    pub fn breakpoint(mut self, frame: u64) -> Self {
        self.config.breakpoints.push(frame);
        self
    }

    pub fn trace(mut self, path: impl Into<PathBuf>, verbosity: Verbosity) -> Self {
        self.config.trace = Some(TraceConfig {
            path: path.into(),
            verbosity,
        });
        self
    }

    pub fn pin_threads(mut self, pin: bool) -> Self {
        self.config.pin_threads = pin;
        self
    }

    pub fn realtime_priority(mut self, enabled: bool) -> Self {
        self.config.realtime_priority = enabled;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}
