//! Low-level DSP primitives used by the waveguide voices.
//!
//! Everything here is allocation-free once constructed and realtime-safe,
//! so the pieces embed directly inside voice structs. The modules stay
//! focused on signal-processing math; voices layer on the loop topology.

/// Pre-allocated pool of delay lines handed out to voices.
pub mod allocator;
/// Fixed-capacity masked ring buffer.
pub mod delay;
/// Cascade of Thiran allpass sections for stiffness.
pub mod dispersion;
/// Bilinear lowpass/highpass loop filters and a DC blocker.
pub mod filter;
/// Control-rate oscillators for vibrato and tremolo.
pub mod lfo;
/// Deterministic linear-congruential noise.
pub mod noise;
/// MIDI note helpers and key-tracking maps.
pub mod note;
/// One-pole smoothers for envelopes and modulation ramps.
pub mod smoother;
/// First-order allpass for fractional-delay tuning.
pub mod tuning;

pub use allocator::DelayAllocator;
pub use delay::DelayLine;
pub use dispersion::ThiranDispersion;
pub use filter::{DcBlocker, LoopFilterType, Lowpass, OnePoleFilter, OnePoleMode};
pub use noise::Noise;
pub use tuning::TuningFilter;
