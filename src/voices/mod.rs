//! Waveguide instrument voices.
//!
//! Each voice is a physical model built from the primitives in `dsp`: one or
//! two delay lines closed through loss, tuning and (for the string)
//! dispersion filters, driven by an excitation.
//!
//! # Example
//!
//! ```ignore
//! use waveguide_dsp::voices::{Bowed, PluckString, Reed};
//!
//! let string = PluckString::new(48_000.0, 0);
//! let reed = Reed::new(48_000.0, 0);
//! let bowed = Bowed::new(48_000.0, 0);
//! ```

mod bowed;
mod pluck;
mod reed;

pub use bowed::Bowed;
pub use pluck::PluckString;
pub use reed::Reed;

use crate::dsp::lfo::ControlLfo;
use crate::dsp::smoother::ExpRamp;

/// A read-before-write loop sees the previous push, so every delay segment
/// costs one sample on top of its configured delay.
pub(crate) const READ_LATENCY: f32 = 1.0;

/// Peak magnitude below which a voice counts as silent.
pub(crate) const SILENCE_THRESHOLD: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VibratoMode {
    /// Free-running LFO at the configured depth
    #[default]
    Auto,
    /// LFO depth follows the channel's pitch bend
    BendToDepth,
    /// Pitch bend drives the pitch directly
    Manual,
}

impl VibratoMode {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => VibratoMode::BendToDepth,
            2 => VibratoMode::Manual,
            _ => VibratoMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TremoloMode {
    /// Free-running LFO at the configured depth
    #[default]
    Auto,
    /// LFO depth follows channel pressure
    PressureToDepth,
    /// Channel pressure is the tremolo amount
    Manual,
}

impl TremoloMode {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => TremoloMode::PressureToDepth,
            2 => TremoloMode::Manual,
            _ => TremoloMode::Auto,
        }
    }
}

/// Block-rate vibrato and tremolo shared by the sustained voices.
///
/// Depth eases in after each note-on through an [`ExpRamp`] so held notes
/// start straight and bloom into vibrato.
#[derive(Debug, Clone)]
pub(crate) struct Modulation {
    sample_rate: f32,
    block_len: usize,
    pub vibrato_mode: VibratoMode,
    pub tremolo_mode: TremoloMode,
    pub vibrato_depth: f32,
    pub tremolo_depth: f32,
    vibrato: ControlLfo,
    tremolo: ControlLfo,
    vibrato_ramp: ExpRamp,
    tremolo_ramp: ExpRamp,
}

impl Modulation {
    pub fn new(sample_rate: f32, vibrato_rate: f32, tremolo_rate: f32) -> Self {
        let block_len = crate::DEFAULT_BLOCK_SIZE;
        let control_rate = sample_rate / block_len as f32;
        Self {
            sample_rate,
            block_len,
            vibrato_mode: VibratoMode::Auto,
            tremolo_mode: TremoloMode::Auto,
            vibrato_depth: 0.1,
            tremolo_depth: 0.1,
            vibrato: ControlLfo::new(vibrato_rate),
            tremolo: ControlLfo::new(tremolo_rate),
            vibrato_ramp: ExpRamp::new(control_rate, 1000.0),
            tremolo_ramp: ExpRamp::new(control_rate, 1000.0),
        }
    }

    pub fn set_vibrato_rate(&mut self, rate_hz: f32) {
        self.vibrato.set_rate(rate_hz);
    }

    pub fn set_tremolo_rate(&mut self, rate_hz: f32) {
        self.tremolo.set_rate(rate_hz);
    }

    pub fn set_vibrato_attack(&mut self, ms: f32) {
        self.vibrato_ramp.set_time(ms);
    }

    pub fn set_tremolo_attack(&mut self, ms: f32) {
        self.tremolo_ramp.set_time(ms);
    }

    /// Restart the depth ramps for a new note.
    pub fn restart(&mut self) {
        self.vibrato_ramp.set(0.0);
        self.tremolo_ramp.set(0.0);
    }

    /// Advance one block. Returns `(pitch, tremolo)`: pitch in bend units
    /// (1.0 = full bend range), tremolo as an additive drive amount.
    pub fn advance(&mut self, block_len: usize, bend: f32, pressure: f32) -> (f32, f32) {
        if block_len != self.block_len && block_len > 0 {
            self.block_len = block_len;
            let control_rate = self.sample_rate / block_len as f32;
            self.vibrato_ramp.set_rate(control_rate);
            self.tremolo_ramp.set_rate(control_rate);
        }
        self.vibrato.advance(block_len, self.sample_rate);
        self.tremolo.advance(block_len, self.sample_rate);
        let vibrato_ramp = self.vibrato_ramp.process(1.0);
        let tremolo_ramp = self.tremolo_ramp.process(1.0);

        let pitch = match self.vibrato_mode {
            VibratoMode::Auto => self.vibrato.triangle() * self.vibrato_depth * vibrato_ramp,
            VibratoMode::BendToDepth => self.vibrato.triangle() * bend.abs(),
            VibratoMode::Manual => bend,
        };
        let tremolo = match self.tremolo_mode {
            TremoloMode::Auto => self.tremolo.sine() * self.tremolo_depth * tremolo_ramp,
            TremoloMode::PressureToDepth => self.tremolo.sine() * pressure,
            TremoloMode::Manual => pressure,
        };
        (pitch, tremolo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_modes_pass_controllers_through() {
        let mut modulation = Modulation::new(48_000.0, 5.0, 5.0);
        modulation.vibrato_mode = VibratoMode::Manual;
        modulation.tremolo_mode = TremoloMode::Manual;
        let (pitch, tremolo) = modulation.advance(480, -0.5, 0.25);
        assert_eq!(pitch, -0.5);
        assert_eq!(tremolo, 0.25);
    }

    #[test]
    fn auto_depth_ramps_in() {
        let mut modulation = Modulation::new(48_000.0, 5.0, 5.0);
        modulation.set_vibrato_attack(1000.0);
        modulation.restart();
        let mut early = 0.0f32;
        for _ in 0..5 {
            let (pitch, _) = modulation.advance(480, 0.0, 0.0);
            early = early.max(pitch.abs());
        }
        let mut late = 0.0f32;
        for _ in 0..2_000 {
            let (pitch, _) = modulation.advance(480, 0.0, 0.0);
            late = late.max(pitch.abs());
        }
        assert!(early < 0.01, "vibrato started too deep: {}", early);
        assert!((late - 0.1).abs() < 0.01, "vibrato never reached depth: {}", late);
    }

    #[test]
    fn mode_indices_map_to_variants() {
        assert_eq!(VibratoMode::from_index(1), VibratoMode::BendToDepth);
        assert_eq!(VibratoMode::from_index(9), VibratoMode::Auto);
        assert_eq!(TremoloMode::from_index(2), TremoloMode::Manual);
    }
}
