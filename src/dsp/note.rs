//! Pitch helpers shared by every voice.

/// Convert a (fractional) MIDI note to frequency in Hz. A4 = note 69 = 440 Hz.
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}

#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Piecewise-linear map from played note to a note-valued parameter.
///
/// Notes at or below `in_low` map to `out_low`, at or above `in_high` to
/// `out_high`, linear in between. Used for loss and exciter cutoffs that
/// brighten as the keyboard climbs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyTracking {
    pub in_low: f32,
    pub in_high: f32,
    pub out_low: f32,
    pub out_high: f32,
}

impl KeyTracking {
    pub const fn new(in_low: f32, in_high: f32, out_low: f32, out_high: f32) -> Self {
        Self {
            in_low,
            in_high,
            out_low,
            out_high,
        }
    }

    pub fn map(&self, note: f32) -> f32 {
        if note <= self.in_low {
            self.out_low
        } else if note >= self.in_high {
            self.out_high
        } else {
            let t = (note - self.in_low) / (self.in_high - self.in_low);
            lerp(self.out_low, self.out_high, t)
        }
    }
}
