//! Stiff-string dispersion.
//!
//! Real strings are slightly stiff, so high partials travel faster than low
//! ones and the overtones drift sharp. A cascade of second-order Thiran
//! allpass sections reproduces that frequency-dependent delay while leaving
//! the loop gain untouched. All sections share one set of coefficients.
//!
//! A requested group delay is split evenly across up to four sections. Each
//! section needs at least [`MIN_SECTION_DELAY`] samples to stay well inside
//! the stability region, so short requests use fewer sections, and a zero
//! request bypasses the cascade entirely.

use std::f32::consts::TAU;

use rustfft::num_complex::Complex;

pub const MAX_SECTIONS: usize = 4;
pub const MIN_SECTION_DELAY: f32 = 1.5;

#[derive(Debug, Clone)]
pub struct ThiranDispersion {
    sample_rate: f32,
    group_delay: f32,
    sections: usize,
    a1: f32,
    a2: f32,
    l1: [f32; MAX_SECTIONS],
    l2: [f32; MAX_SECTIONS],
}

impl ThiranDispersion {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            group_delay: 0.0,
            sections: 0,
            a1: 0.0,
            a2: 0.0,
            l1: [0.0; MAX_SECTIONS],
            l2: [0.0; MAX_SECTIONS],
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Spread `delay` samples of low-frequency group delay over the cascade.
    pub fn set_group_delay(&mut self, delay: f32) {
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.group_delay = delay;
        self.sections = ((delay / MIN_SECTION_DELAY) as usize).min(MAX_SECTIONS);
        if self.sections == 0 {
            self.a1 = 0.0;
            self.a2 = 0.0;
            return;
        }
        let d = delay / self.sections as f32;
        self.a1 = -2.0 * (d - 2.0) / (d + 1.0);
        self.a2 = (d - 1.0) * (d - 2.0) / ((d + 1.0) * (d + 2.0));
    }

    pub fn group_delay(&self) -> f32 {
        self.group_delay
    }

    /// Active allpass sections, 0 when bypassed.
    pub fn sections(&self) -> usize {
        self.sections
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        // b0 = a2, b1 = a1, b2 = 1 for a second-order allpass
        let mut y = x;
        for i in 0..self.sections {
            let t = y - self.a1 * self.l1[i] - self.a2 * self.l2[i];
            y = self.a2 * t + self.a1 * self.l1[i] + self.l2[i];
            self.l2[i] = self.l1[i];
            self.l1[i] = t;
        }
        y
    }

    fn section_response(&self, omega: f32) -> Complex<f32> {
        let z = Complex::from_polar(1.0, omega);
        let z2 = z * z;
        let num = z2 * self.a2 + z * self.a1 + 1.0;
        let den = z2 + z * self.a1 + self.a2;
        num / den
    }

    /// Phase delay in samples of the whole cascade at `freq_hz`.
    pub fn phase_delay(&self, freq_hz: f32) -> f32 {
        if self.sections == 0 {
            return 0.0;
        }
        let omega = TAU * freq_hz / self.sample_rate;
        let mut phase = self.section_response(omega).arg();
        if phase > 0.0 {
            phase -= TAU;
        }
        -(phase * self.sections as f32) / omega
    }

    pub fn reset(&mut self) {
        self.l1 = [0.0; MAX_SECTIONS];
        self.l2 = [0.0; MAX_SECTIONS];
    }
}
