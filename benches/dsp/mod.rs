//! Benchmarks for low-level DSP primitives.

mod delay;
mod dispersion;
mod filter;

pub use delay::bench_delay;
pub use dispersion::bench_dispersion;
pub use filter::bench_filter;
