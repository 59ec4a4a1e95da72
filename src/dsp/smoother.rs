//! One-pole exponential smoothers.
//!
//! `ExpSmoother` runs per sample with separate rise and fall times and serves
//! as the breath/bow envelope. `ExpRamp` runs once per block and eases
//! vibrato and tremolo depth in after a note starts.

/// Coefficient for a one-pole smoother reaching ~63% in `time_ms`.
///
/// Non-positive times jump straight to the target.
#[inline]
pub fn time_coefficient(time_ms: f32, rate_hz: f32) -> f32 {
    let samples = rate_hz * time_ms / 1000.0;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct ExpSmoother {
    rate_hz: f32,
    attack_ms: f32,
    release_ms: f32,
    attack_coeff: f32,
    release_coeff: f32,
    value: f32,
}

impl ExpSmoother {
    pub fn new(rate_hz: f32, attack_ms: f32, release_ms: f32) -> Self {
        Self {
            rate_hz,
            attack_ms,
            release_ms,
            attack_coeff: time_coefficient(attack_ms, rate_hz),
            release_coeff: time_coefficient(release_ms, rate_hz),
            value: 0.0,
        }
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz;
        self.attack_coeff = time_coefficient(self.attack_ms, rate_hz);
        self.release_coeff = time_coefficient(self.release_ms, rate_hz);
    }

    pub fn set_attack(&mut self, attack_ms: f32) {
        self.attack_ms = attack_ms;
        self.attack_coeff = time_coefficient(attack_ms, self.rate_hz);
    }

    pub fn set_release(&mut self, release_ms: f32) {
        self.release_ms = release_ms;
        self.release_coeff = time_coefficient(release_ms, self.rate_hz);
    }

    /// Move one step toward `target`.
    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        let coeff = if target > self.value {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.value = target + coeff * (self.value - target);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Block-rate smoother with a single time constant.
#[derive(Debug, Clone)]
pub struct ExpRamp {
    rate_hz: f32,
    time_ms: f32,
    coeff: f32,
    value: f32,
}

impl ExpRamp {
    pub fn new(rate_hz: f32, time_ms: f32) -> Self {
        Self {
            rate_hz,
            time_ms,
            coeff: time_coefficient(time_ms, rate_hz),
            value: 0.0,
        }
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz;
        self.coeff = time_coefficient(self.time_ms, rate_hz);
    }

    pub fn set_time(&mut self, time_ms: f32) {
        self.time_ms = time_ms;
        self.coeff = time_coefficient(time_ms, self.rate_hz);
    }

    /// Jump to `value` without smoothing.
    pub fn set(&mut self, value: f32) {
        self.value = value;
    }

    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.value = target + self.coeff * (self.value - target);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}
