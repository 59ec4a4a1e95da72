//! First-order allpass fractional delay.
//!
//! A delay line only delays by whole samples. The tuning filter covers the
//! leftover fraction: `set_delay` splits a real-valued delay into an integer
//! part for the line and an allpass coefficient for the remainder. The
//! fraction is kept in `[0.5, 1.5)` where the allpass phase is flattest.

#[derive(Debug, Clone, Default)]
pub struct TuningFilter {
    alpha: f32,
    latch: f32,
}

impl TuningFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let v = self.latch;
        let t = x - self.alpha * v;
        self.latch = t;
        v + self.alpha * t
    }

    /// Configure for a total delay of `delay` samples.
    ///
    /// Returns the integer delay the caller should put on its delay line.
    /// Delays below half a sample collapse to a pass-through.
    pub fn set_delay(&mut self, delay: f32) -> i32 {
        if !(delay >= 0.5) {
            self.alpha = 0.0;
            return 0;
        }
        let mut integer = delay.floor();
        let mut fraction = delay - integer;
        if fraction < 0.5 {
            fraction += 1.0;
            integer -= 1.0;
        }
        self.alpha = (1.0 - fraction) / (1.0 + fraction);
        integer as i32
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Fractional delay (at DC) realised by the current coefficient.
    pub fn fractional_delay(&self) -> f32 {
        (1.0 - self.alpha) / (1.0 + self.alpha)
    }

    pub fn reset(&mut self) {
        self.latch = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_plus_fraction_reconstructs_delay() {
        let mut tuning = TuningFilter::new();
        let mut delay = 0.5;
        while delay < 2000.0 {
            let integer = tuning.set_delay(delay);
            let total = integer as f32 + tuning.fractional_delay();
            assert!(
                (total - delay).abs() < 1e-3 * delay.max(1.0),
                "delay {}: got {} + {}",
                delay,
                integer,
                tuning.fractional_delay()
            );
            // Rebuilt from alpha, so allow float slack at both band edges.
            let fraction = tuning.fractional_delay();
            assert!(
                (0.5 - 1e-4..1.5 + 1e-4).contains(&fraction),
                "fraction {} out of band",
                fraction
            );
            let alpha = tuning.alpha();
            assert!(alpha > -1.0 && alpha < 1.0, "delay {}: unstable alpha {}", delay, alpha);
            delay += 0.37;
        }
    }

    #[test]
    fn below_half_sample_is_pass_through() {
        let mut tuning = TuningFilter::new();
        assert_eq!(tuning.set_delay(0.3), 0);
        assert_eq!(tuning.alpha(), 0.0);
        assert_eq!(tuning.set_delay(-4.0), 0);
        assert_eq!(tuning.set_delay(f32::NAN), 0);

        // alpha 0 turns the allpass into a one-sample delay
        assert_eq!(tuning.process(1.0), 0.0);
        assert_eq!(tuning.process(0.0), 1.0);
    }

    #[test]
    fn allpass_keeps_unit_energy() {
        let mut tuning = TuningFilter::new();
        tuning.set_delay(10.3);
        let mut energy = 0.0;
        for i in 0..4096 {
            let y = tuning.process(if i == 0 { 1.0 } else { 0.0 });
            energy += y * y;
        }
        assert!((energy - 1.0).abs() < 1e-3, "allpass energy {}", energy);
    }
}
