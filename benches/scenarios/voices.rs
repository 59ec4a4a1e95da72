//! Benchmarks for complete voice families at full polyphony.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use waveguide_dsp::dsp::DelayAllocator;
use waveguide_dsp::synth::{BlockCtx, PolySynth, WaveguideVoice};
use waveguide_dsp::voices::{Bowed, PluckString, Reed};
use waveguide_dsp::{DELAY_POOL_SIZE, NUM_POLYPHONY};

use crate::BLOCK_SIZES;

const CHORD: [u8; NUM_POLYPHONY] = [45, 52, 57, 60, 64, 67, 69, 72];

fn full_chord<V: WaveguideVoice>(poly: &mut PolySynth<V>) {
    for &note in CHORD.iter() {
        poly.note_on(0, note, 100);
    }
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");
    let ctx = BlockCtx::new();

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // === PLUCKED STRING ===
        // 8 voices, dispersion on so the Thiran cascade is in the loop
        let mut pool = DelayAllocator::new(DELAY_POOL_SIZE);
        let mut strings = PolySynth::new(|i| {
            let mut voice = PluckString::new(48_000.0, i);
            voice.set_dispersion(0.05);
            voice.set_decay(6_000.0);
            voice
        });
        strings.attach_delay_lines(&mut pool).unwrap();
        full_chord(&mut strings);

        group.bench_with_input(BenchmarkId::new("string_x8", size), &size, |b, _| {
            b.iter(|| {
                strings.process(black_box(&mut buffer), black_box(&ctx));
            })
        });

        // === REED ===
        // Held notes: breath envelope, reflection table, two loss filters
        let mut pool = DelayAllocator::new(DELAY_POOL_SIZE);
        let mut reeds = PolySynth::new(|i| Reed::new(48_000.0, i));
        reeds.attach_delay_lines(&mut pool).unwrap();
        full_chord(&mut reeds);

        group.bench_with_input(BenchmarkId::new("reed_x8", size), &size, |b, _| {
            b.iter(|| {
                reeds.process(black_box(&mut buffer), black_box(&ctx));
            })
        });

        // === BOWED ===
        // Two delay segments per voice, friction table every sample
        let mut pool = DelayAllocator::new(DELAY_POOL_SIZE);
        let mut bows = PolySynth::new(|i| Bowed::new(48_000.0, i));
        bows.attach_delay_lines(&mut pool).unwrap();
        full_chord(&mut bows);

        group.bench_with_input(BenchmarkId::new("bow_x8", size), &size, |b, _| {
            b.iter(|| {
                bows.process(black_box(&mut buffer), black_box(&ctx));
            })
        });
    }

    group.finish();
}
