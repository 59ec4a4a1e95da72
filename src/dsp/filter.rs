use std::f32::consts::{PI, TAU};

use rustfft::num_complex::Complex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Loop Filters
============

A waveguide loop filter does two jobs at once: it shapes how fast each
harmonic dies (magnitude) and it adds delay that shifts the pitch (phase).
Voices ask the filter for its phase delay at the note's fundamental and
subtract it from the delay line so the note stays in tune.

Vocabulary
----------

  bilinear      Maps an analog prototype H(s) to H(z) with
                s = (1 - z^-1) / (1 + z^-1). Frequencies are pre-warped:
                k = tan(omega_c / 2).

  phase delay   -arg(H(e^jw)) / w, in samples. How long a sinusoid at w
                takes to pass through the filter.

  power response
                |H(e^jw)|^2. The reed takes a square root of it to find
                the loop gain lost at its centre frequency.

  transposed    State update order: t = x - a1*l1 - a2*l2,
                y = b0*t + b1*l1 + b2*l2. Two latches, no input history.

| type | order | prototype                    | used for                  |
| ---- | ----- | ---------------------------- | ------------------------- |
| Lpf1 | 1     | k / (s + k)                  | gentle loss, exciter tone |
| Lpf2 | 2     | Butterworth, Q = 1/sqrt(2)   | faster high-end loss      |
| Hpf  | 1     | s / (s + k)                  | reed bore loss            |
*/

const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;
const MIN_CUTOFF_HZ: f32 = 1.0;
/// Cutoffs never exceed this fraction of the sample rate.
const NYQUIST_GUARD: f32 = 0.45;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopFilterType {
    Lpf1,
    #[default]
    Lpf2,
}

#[inline]
fn prewarp(freq_hz: f32, sample_rate: f32) -> f32 {
    (PI * freq_hz / sample_rate).tan()
}

/// Unwrapped phase delay of a response evaluated at `omega`.
#[inline]
fn phase_delay_of(response: Complex<f32>, omega: f32) -> f32 {
    let mut phase = response.arg();
    if phase > 0.0 {
        phase -= TAU;
    }
    -phase / omega
}

/// First/second-order lowpass used as the loss filter inside waveguide loops.
#[derive(Debug, Clone)]
pub struct Lowpass {
    sample_rate: f32,
    cutoff_hz: f32,
    filter_type: LoopFilterType,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    l1: f32,
    l2: f32,
}

impl Lowpass {
    pub const MAX_CUTOFF_HZ: f32 = 20_000.0;

    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            sample_rate,
            cutoff_hz: 1000.0,
            filter_type: LoopFilterType::Lpf2,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            l1: 0.0,
            l2: 0.0,
        };
        filter.update_coefficients();
        filter
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let t = x - self.a1 * self.l1 - self.a2 * self.l2;
        let y = t * self.b0 + self.b1 * self.l1 + self.b2 * self.l2;
        self.l2 = self.l1;
        self.l1 = t;
        y
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    /// Clamped to `[1 Hz, min(20 kHz, 0.45 * sample_rate)]`.
    pub fn set_cutoff(&mut self, freq_hz: f32) {
        let ceiling = Self::MAX_CUTOFF_HZ.min(self.sample_rate * NYQUIST_GUARD);
        self.cutoff_hz = freq_hz.clamp(MIN_CUTOFF_HZ, ceiling);
        self.update_coefficients();
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn set_filter_type(&mut self, filter_type: LoopFilterType) {
        if self.filter_type != filter_type {
            self.filter_type = filter_type;
            self.update_coefficients();
        }
    }

    pub fn filter_type(&self) -> LoopFilterType {
        self.filter_type
    }

    fn update_coefficients(&mut self) {
        let k = prewarp(self.cutoff_hz, self.sample_rate);
        match self.filter_type {
            LoopFilterType::Lpf1 => {
                self.b0 = k / (1.0 + k);
                self.b1 = self.b0;
                self.b2 = 0.0;
                self.a1 = (k - 1.0) / (k + 1.0);
                self.a2 = 0.0;
            }
            LoopFilterType::Lpf2 => {
                let q = BUTTERWORTH_Q;
                let kk = k * k;
                let down = kk * q + k + q;
                self.b0 = kk * q / down;
                self.b1 = 2.0 * self.b0;
                self.b2 = self.b0;
                self.a1 = 2.0 * q * (kk - 1.0) / down;
                self.a2 = (kk * q - k + q) / down;
            }
        }
    }

    /// Copy coefficients (not state) from another filter.
    pub fn copy_coefficients(&mut self, other: &Lowpass) {
        self.sample_rate = other.sample_rate;
        self.cutoff_hz = other.cutoff_hz;
        self.filter_type = other.filter_type;
        self.b0 = other.b0;
        self.b1 = other.b1;
        self.b2 = other.b2;
        self.a1 = other.a1;
        self.a2 = other.a2;
    }

    pub fn response(&self, omega: f32) -> Complex<f32> {
        let z = Complex::from_polar(1.0, omega);
        let z2 = z * z;
        let num = z2 * self.b0 + z * self.b1 + self.b2;
        let den = z2 + z * self.a1 + self.a2;
        num / den
    }

    /// Phase delay in samples at `freq_hz`.
    pub fn phase_delay(&self, freq_hz: f32) -> f32 {
        let omega = TAU * freq_hz / self.sample_rate;
        phase_delay_of(self.response(omega), omega)
    }

    /// `|H(e^jw)|^2` at angular frequency `omega` (radians per sample).
    pub fn mag_power_response(&self, omega: f32) -> f32 {
        self.response(omega).norm_sqr()
    }

    pub fn reset(&mut self) {
        self.l1 = 0.0;
        self.l2 = 0.0;
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnePoleMode {
    Lowpass,
    Highpass,
}

/// First-order bilinear lowpass/highpass.
#[derive(Debug, Clone)]
pub struct OnePoleFilter {
    sample_rate: f32,
    cutoff_hz: f32,
    mode: OnePoleMode,
    b0: f32,
    b1: f32,
    a1: f32,
    l1: f32,
}

impl OnePoleFilter {
    /// Lowpass cutoffs above this are clamped.
    pub const MAX_LOWPASS_HZ: f32 = 8_000.0;

    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            sample_rate,
            cutoff_hz: 1000.0,
            mode: OnePoleMode::Lowpass,
            b0: 1.0,
            b1: 0.0,
            a1: 0.0,
            l1: 0.0,
        };
        filter.update_coefficients();
        filter
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let t = x - self.a1 * self.l1;
        let y = t * self.b0 + self.b1 * self.l1;
        self.l1 = t;
        y
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    pub fn set_lowpass(&mut self, freq_hz: f32) {
        let ceiling = Self::MAX_LOWPASS_HZ.min(self.sample_rate * NYQUIST_GUARD);
        self.mode = OnePoleMode::Lowpass;
        self.cutoff_hz = freq_hz.clamp(MIN_CUTOFF_HZ, ceiling);
        self.update_coefficients();
    }

    pub fn set_highpass(&mut self, freq_hz: f32) {
        self.mode = OnePoleMode::Highpass;
        self.cutoff_hz = freq_hz.clamp(MIN_CUTOFF_HZ, self.sample_rate * NYQUIST_GUARD);
        self.update_coefficients();
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn mode(&self) -> OnePoleMode {
        self.mode
    }

    fn update_coefficients(&mut self) {
        let k = prewarp(self.cutoff_hz, self.sample_rate);
        match self.mode {
            OnePoleMode::Lowpass => {
                self.b0 = k / (1.0 + k);
                self.b1 = self.b0;
            }
            OnePoleMode::Highpass => {
                self.b0 = 1.0 / (1.0 + k);
                self.b1 = -self.b0;
            }
        }
        self.a1 = (k - 1.0) / (k + 1.0);
    }

    pub fn response(&self, omega: f32) -> Complex<f32> {
        let z = Complex::from_polar(1.0, omega);
        (z * self.b0 + self.b1) / (z + self.a1)
    }

    /// Phase delay in samples. Negative for a highpass (phase lead).
    pub fn phase_delay(&self, freq_hz: f32) -> f32 {
        let omega = TAU * freq_hz / self.sample_rate;
        let response = self.response(omega);
        match self.mode {
            OnePoleMode::Lowpass => phase_delay_of(response, omega),
            OnePoleMode::Highpass => -response.arg() / omega,
        }
    }

    pub fn mag_power_response(&self, omega: f32) -> f32 {
        let cos = omega.cos();
        let num = self.b0 * self.b0 + self.b1 * self.b1 + 2.0 * self.b0 * self.b1 * cos;
        let den = 1.0 + self.a1 * self.a1 + 2.0 * self.a1 * cos;
        num / den
    }

    pub fn reset(&mut self) {
        self.l1 = 0.0;
    }
}

/// One-zero one-pole DC blocker: `y = x - x[n-1] + r * y[n-1]`.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    pole: f32,
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    pub fn new(pole: f32) -> Self {
        Self {
            pole,
            x1: 0.0,
            y1: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = x - self.x1 + self.pole * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::new(0.995)
    }
}
