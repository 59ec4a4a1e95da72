//! Benchmarks for delay line and pool operations.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use waveguide_dsp::dsp::{DelayAllocator, DelayLine, TuningFilter};

use crate::BLOCK_SIZES;

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    let delay_times: &[i32] = &[
        55,   // A5 at 48kHz
        218,  // A3
        1745, // A0, near capacity
    ];

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        for &delay_samples in delay_times {
            let mut delay = DelayLine::new(0);
            delay.set_delay(delay_samples);
            let mut buffer = input.clone();
            group.bench_with_input(
                BenchmarkId::new(format!("render_{}", delay_samples), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        buffer.copy_from_slice(&input);
                        delay.render(black_box(&mut buffer));
                    })
                },
            );
        }

        // The inner loop every voice runs: read, allpass tune, write back.
        let mut line = DelayLine::new(0);
        let mut tuning = TuningFilter::new();
        line.set_delay(tuning.set_delay(108.7));
        line.push(1.0);
        group.bench_with_input(BenchmarkId::new("tuned_loop", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for _ in 0..size {
                    let s = tuning.process(line.last()) * 0.999;
                    line.push(black_box(s));
                    sum += s;
                }
                sum
            })
        });
    }

    // Checkout / check-in as done on an instrument switch
    let mut pool = DelayAllocator::new(16);
    group.bench_function("pool_cycle_16", |b| {
        b.iter(|| {
            let mut lines = Vec::with_capacity(16);
            while let Some(line) = pool.get_delay_line() {
                lines.push(line);
            }
            for line in lines.drain(..) {
                pool.release_delay_line(line);
            }
            black_box(pool.available())
        })
    });

    group.finish();
}
