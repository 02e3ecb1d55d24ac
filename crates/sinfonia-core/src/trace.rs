//! Optional schedule-trace text sink.
//!
//! ```text
//! cycle 12 start=6144 frames=512 ticks=10 status=rendered emitted=512 elapsed_us=84
//!   track   lead      p=1 start_us=3 end_us=41 cost_us=38
//!   section strings   p=0 start_us=44 end_us=52 cost_us=8
//! ```

use crate::clock::CycleControl;
use crate::config::{TraceConfig, Verbosity};
use crate::engine::UnitSpan;
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Kind of unit a trace line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Track,
    Section,
}

impl UnitKind {
    fn label(self) -> &'static str {
        match self {
            UnitKind::Track => "track",
            UnitKind::Section => "section",
        }
    }
}

pub struct ScheduleTrace {
    writer: BufWriter<File>,
    verbosity: Verbosity,
}

impl ScheduleTrace {
    pub fn create(config: &TraceConfig) -> Result<Self> {
        let file = File::create(&config.path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            verbosity: config.verbosity,
        })
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn cycle(
        &mut self,
        control: &CycleControl,
        status: &str,
        emitted: usize,
        elapsed_us: u64,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "cycle {} start={} frames={} ticks={} status={} emitted={} elapsed_us={}",
            control.cycle_index,
            control.start_frame,
            control.frames,
            control.ticks,
            status,
            emitted,
            elapsed_us
        )?;
        Ok(())
    }

    /// One unit line. `cycle_start_ns` is the epoch-relative start of the phase.
    pub fn unit(&mut self, kind: UnitKind, name: &str, span: UnitSpan, cycle_start_ns: u64) -> Result<()> {
        let offset = |ns: u64| ns.saturating_sub(cycle_start_ns) / 1_000;
        writeln!(
            self.writer,
            "  {:<7} {:<16} p={} start_us={} end_us={} cost_us={:.1}",
            kind.label(),
            name,
            span.processor,
            offset(span.start_ns),
            offset(span.end_ns),
            span.cost * 1e6
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for ScheduleTrace {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
