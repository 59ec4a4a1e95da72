//! Offline pitch estimation for tuning checks.
//!
//! Autocorrelation through an FFT round-trip, normalized per lag so long
//! periods are not penalized. The first lag that correlates nearly as well
//! as the strongest one is the period, refined with a parabola through it
//! and its neighbours. Good to a fraction of a cent on the
//! steady part of a waveguide tone.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Lowest fundamental searched for, Hz
pub const MIN_FREQ: f32 = 25.0;
/// Highest fundamental searched for, Hz
pub const MAX_FREQ: f32 = 4_200.0;

/// Correlation at the winning lag must reach this share of the zero-lag
/// energy, otherwise the signal counts as unpitched.
const MIN_CLARITY: f32 = 0.3;

/// A peak within this share of the strongest one counts as the period.
const PEAK_SHARE: f32 = 0.9;

pub struct PitchEstimator {
    sample_rate: f32,
    max_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl PitchEstimator {
    /// Estimator for windows of up to `max_len` samples.
    pub fn new(max_len: usize, sample_rate: f32) -> Self {
        // Zero-padded to twice the window so the correlation does not wrap.
        let fft_len = (2 * max_len.max(2)).next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            sample_rate,
            max_len,
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
            scratch: vec![Complex::new(0.0, 0.0); fft_len],
        }
    }

    /// Fundamental of `samples` in Hz, or `None` when nothing periodic
    /// between [`MIN_FREQ`] and [`MAX_FREQ`] stands out.
    pub fn estimate(&mut self, samples: &[f32]) -> Option<f32> {
        let n = samples.len().min(self.max_len);
        if n < 8 {
            return None;
        }
        let samples = &samples[..n];
        let mean = samples.iter().sum::<f32>() / n as f32;

        for (dst, &s) in self.scratch.iter_mut().zip(samples) {
            *dst = Complex::new(s - mean, 0.0);
        }
        for dst in self.scratch[n..].iter_mut() {
            *dst = Complex::new(0.0, 0.0);
        }
        self.forward.process(&mut self.scratch);
        for bin in self.scratch.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut self.scratch);

        let energy = self.scratch[0].re / n as f32;
        if energy <= 1e-12 {
            return None;
        }
        let corr = |k: usize| self.scratch[k].re / (n - k) as f32;

        let min_lag = ((self.sample_rate / MAX_FREQ).floor() as usize).max(2);
        let max_lag = ((self.sample_rate / MIN_FREQ).ceil() as usize).min(n / 2);
        if min_lag + 1 >= max_lag {
            return None;
        }

        // Skip the zero-lag lobe.
        let mut start = 1;
        while start < max_lag && corr(start) > 0.0 {
            start += 1;
        }
        let start = start.max(min_lag);

        let mut strongest = start;
        for k in start..max_lag {
            if corr(k) > corr(strongest) {
                strongest = k;
            }
        }
        if corr(strongest) < MIN_CLARITY * energy || strongest + 1 >= n {
            return None;
        }

        // Every multiple of the period correlates almost as well as the
        // period itself. Take the first peak close to the strongest one.
        let threshold = PEAK_SHARE * corr(strongest);
        let best = (start..strongest)
            .find(|&k| corr(k) >= threshold && corr(k) >= corr(k - 1) && corr(k) >= corr(k + 1))
            .unwrap_or(strongest);

        let (y0, y1, y2) = (corr(best - 1), corr(best), corr(best + 1));
        let denom = y0 - 2.0 * y1 + y2;
        let offset = if denom.abs() > f32::EPSILON {
            (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        Some(self.sample_rate / (best as f32 + offset))
    }
}

/// One-shot convenience around [`PitchEstimator`].
pub fn estimate_fundamental(samples: &[f32], sample_rate: f32) -> Option<f32> {
    PitchEstimator::new(samples.len(), sample_rate).estimate(samples)
}

/// Signed distance from `reference` to `freq`, in cents.
pub fn cents_between(freq: f32, reference: f32) -> f32 {
    1200.0 * (freq / reference).log2()
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}
