//! Control-rate oscillator for vibrato and tremolo.

/*
Block-Rate Modulation
=====================

Waveguide voices retune once per block, not once per sample: moving the
delay length every sample would click. So vibrato and tremolo run at
control rate. The LFO phase advances by `rate * block_len / sample_rate`
each block and the voice reads one value for the whole block.

Vocabulary
----------

  control rate  sample_rate / block_len. At 48 kHz with 480-sample blocks
                that is 100 updates per second, plenty for 4-8 Hz vibrato.

  phase         Position in the cycle, kept in [0, 1).

  triangle      4 * |phase - 0.5| - 1. Constant rate of change, which reads
                as a natural pitch wobble on strings and reeds.

  sine          sin(2 * pi * phase). Smoother, used for breath/bow tremolo.

Both outputs are bipolar: -1.0 to +1.0.
*/

use std::f32::consts::TAU;

#[derive(Debug, Clone, Default)]
pub struct ControlLfo {
    phase: f32,
    rate_hz: f32,
}

impl ControlLfo {
    pub fn new(rate_hz: f32) -> Self {
        Self { phase: 0.0, rate_hz }
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz.max(0.0);
    }

    pub fn rate(&self) -> f32 {
        self.rate_hz
    }

    /// Advance by one block of `block_len` samples.
    pub fn advance(&mut self, block_len: usize, sample_rate: f32) {
        self.phase += self.rate_hz * block_len as f32 / sample_rate;
        self.phase -= self.phase.floor();
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    #[inline]
    pub fn triangle(&self) -> f32 {
        4.0 * (self.phase - 0.5).abs() - 1.0
    }

    #[inline]
    pub fn sine(&self) -> f32 {
        (TAU * self.phase).sin()
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
