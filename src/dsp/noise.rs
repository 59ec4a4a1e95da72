//! Linear-congruential noise.
//!
//! Deterministic for a given seed, which keeps renders reproducible and lets
//! two generators replay the same sequence (the pluck burst relies on that).

const LCG_MUL: u32 = 1_103_515_245;
const LCG_ADD: u32 = 12_345;

#[derive(Debug, Clone)]
pub struct Noise {
    state: u32,
}

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.state = seed;
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(LCG_MUL).wrapping_add(LCG_ADD);
        self.state
    }

    /// Uniform in `[0, 1]`
    #[inline]
    pub fn next01(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Uniform in `[-1, 1]`
    #[inline]
    pub fn next(&mut self) -> f32 {
        2.0 * self.next01() - 1.0
    }
}

impl Default for Noise {
    fn default() -> Self {
        Self::new(0)
    }
}
