//! Benchmarks for the loop filters.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use waveguide_dsp::dsp::{DcBlocker, LoopFilterType, Lowpass, OnePoleFilter};

use crate::BLOCK_SIZES;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        // Generate a test signal (sawtooth-like ramp)
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        for (name, filter_type) in [("lpf1", LoopFilterType::Lpf1), ("lpf2", LoopFilterType::Lpf2)] {
            let mut filter = Lowpass::new(48_000.0);
            filter.set_filter_type(filter_type);
            filter.set_cutoff(6_000.0);
            let mut buffer = input.clone();
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    buffer.copy_from_slice(&input);
                    filter.render(black_box(&mut buffer));
                })
            });
        }

        let mut highpass = OnePoleFilter::new(48_000.0);
        highpass.set_highpass(130.0);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("one_pole_hpf", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for s in buffer.iter_mut() {
                    *s = highpass.process(black_box(*s));
                }
            })
        });

        let mut blocker = DcBlocker::default();
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("dc_blocker", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                for s in buffer.iter_mut() {
                    *s = blocker.process(black_box(*s));
                }
            })
        });
    }

    // Note-on cost: cutoff change plus phase-delay compensation
    let mut filter = Lowpass::new(48_000.0);
    group.bench_function("retune_phase_delay", |b| {
        let mut note = 40.0f32;
        b.iter(|| {
            note = if note > 90.0 { 40.0 } else { note + 1.0 };
            let freq = 440.0 * 2f32.powf((note - 69.0) / 12.0);
            filter.set_cutoff(freq * 8.0);
            black_box(filter.phase_delay(freq))
        })
    });

    group.finish();
}
