//! Benchmarks for the full engine block: messages, parameter callbacks,
//! voices.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use waveguide_dsp::{EngineConfig, Instrument, Synth};

use crate::BLOCK_SIZES;

pub fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/engine");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];
        let mut aux = vec![0.0f32; size];

        // Steady block with four held reed notes
        let mut synth = Synth::new(EngineConfig {
            initial_instrument: Instrument::Reed,
            ..EngineConfig::default()
        })
        .unwrap();
        for note in [57, 60, 64, 67] {
            synth.note_on(0, note, 100);
        }
        group.bench_with_input(BenchmarkId::new("reed_chord", size), &size, |b, _| {
            b.iter(|| {
                synth.process(black_box(&mut buffer), black_box(&mut aux));
            })
        });

        // Worst case: every parameter dirty each block
        let mut synth = Synth::new(EngineConfig::default()).unwrap();
        for note in [45, 52, 57, 60] {
            synth.note_on(0, note, 100);
        }
        let params = synth.params().clone();
        group.bench_with_input(BenchmarkId::new("all_params_dirty", size), &size, |b, _| {
            b.iter(|| {
                params.callbacks().mark_all();
                synth.process(black_box(&mut buffer), black_box(&mut aux));
            })
        });
    }

    group.finish();
}
