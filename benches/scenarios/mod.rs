//! Real-world scenario benchmarks.
//!
//! Full polyphony per instrument family and complete engine blocks,
//! as the audio callback sees them.

mod engine;
mod voices;

pub use engine::bench_engine;
pub use voices::bench_voices;
