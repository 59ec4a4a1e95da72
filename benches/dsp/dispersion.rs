//! Benchmarks for the Thiran dispersion cascade.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use waveguide_dsp::dsp::ThiranDispersion;

use crate::BLOCK_SIZES;

pub fn bench_dispersion(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/dispersion");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.05).sin()).collect();

        // Full cascade: 4 sections
        let mut dispersion = ThiranDispersion::new(48_000.0);
        dispersion.set_group_delay(20.0);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("four_sections", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for s in buffer.iter_mut() {
                    *s = dispersion.process(black_box(*s));
                }
            })
        });

        // Bypassed: the default for strings with no stiffness
        let mut bypass = ThiranDispersion::new(48_000.0);
        bypass.set_group_delay(0.0);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("bypass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for s in buffer.iter_mut() {
                    *s = bypass.process(black_box(*s));
                }
            })
        });
    }

    group.finish();
}
