pub mod analysis; // Offline pitch estimation for tuning checks
pub mod dsp;
pub mod error;
pub mod io;
pub mod params; // Described parameters and the dirty-bit callback table
pub mod synth; // Voice management, polyphony, engine orchestration
pub mod voices; // Waveguide instrument models

pub use error::{EngineError, EngineResult};
pub use synth::engine::{DownstreamStage, EngineConfig, Instrument, Synth};

pub const MAX_BLOCK_SIZE: usize = 2048;
pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;
pub const DEFAULT_BLOCK_SIZE: usize = 480;

/// Voices per instrument family. Must stay a power of two (round-robin mask).
pub const NUM_POLYPHONY: usize = 8;
pub const NUM_MIDI_CHANNELS: usize = 16;

/// Delay lines in the shared pool: two per voice covers the bowed model.
pub const DELAY_POOL_SIZE: usize = 2 * NUM_POLYPHONY;
