//! Built-in effect units.

use crate::buffer::StereoMut;
use crate::clock::CycleControl;
use crate::error::UnitError;
use crate::unit::EffectUnit;

/// Leaves the mix untouched. Default effect of the default section and the score.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl EffectUnit for Passthrough {
    fn apply_effect(&mut self, _: &CycleControl, _: StereoMut<'_>) -> Result<(), UnitError> {
        Ok(())
    }
}

/// Fixed linear gain.
#[derive(Debug, Clone, Copy)]
pub struct Gain {
    gain: f32,
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl EffectUnit for Gain {
    fn apply_effect(&mut self, _: &CycleControl, mut buffer: StereoMut<'_>) -> Result<(), UnitError> {
        buffer.scale(self.gain);
        Ok(())
    }
}
