//! waveguide - play or tune the waveguide instruments
//!
//! Run with:
//!   cargo run -- play [string|reed|bow]
//!   cargo run -- tune [string|reed|bow]
//!
//! Set `RUST_LOG=debug` to watch voice stealing and delay-line checkout.

use std::thread;
use std::time::Duration;

use color_eyre::eyre::{bail, eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::info;
use waveguide_dsp::analysis::{cents_between, peak, PitchEstimator};
use waveguide_dsp::dsp::note::midi_to_freq;
use waveguide_dsp::synth::SynthMessage;
use waveguide_dsp::{EngineConfig, Instrument, Synth};

const ARPEGGIO: [u8; 8] = [48, 55, 60, 64, 67, 72, 67, 60];
const TUNE_NOTES: [u8; 5] = [40, 52, 57, 69, 76];

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "play".to_string());
    let instrument = parse_instrument(args.next().as_deref())?;

    match command.as_str() {
        "play" => play(instrument),
        "tune" => tune(instrument),
        other => bail!("unknown command '{}', expected play or tune", other),
    }
}

fn parse_instrument(arg: Option<&str>) -> EyreResult<Instrument> {
    match arg {
        None => Ok(Instrument::String),
        Some(name) => Instrument::ALL
            .into_iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| eyre!("unknown instrument '{}', expected string, reed or bow", name)),
    }
}

fn play(instrument: Instrument) -> EyreResult<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;

    let engine_config = EngineConfig {
        sample_rate,
        initial_instrument: instrument,
        ..EngineConfig::default()
    };
    let block_size = engine_config.block_size;
    let mut synth = Synth::new(engine_config)?;
    let mut tx = synth.message_channel(256);
    let params = synth.params().clone();

    println!("=== waveguide ===");
    println!("Instrument: {}", instrument.name());
    println!("Sample rate: {} Hz", sample_rate);
    println!("Channels: {}", channels);
    println!();

    let mut render_buf = vec![0.0f32; block_size];
    let mut aux_buf = vec![0.0f32; block_size];

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _| {
            let total_frames = data.len() / channels;
            let mut frames_written = 0;
            let gain = synth.output_gain();

            while frames_written < total_frames {
                let frames = (total_frames - frames_written).min(block_size);
                let block = &mut render_buf[..frames];
                synth.process(block, &mut aux_buf[..frames]);

                // Mono to all channels
                let out_off = frames_written * channels;
                for (i, &s) in block.iter().enumerate() {
                    let s = (s * gain).clamp(-1.0, 1.0);
                    for ch in 0..channels {
                        data[out_off + i * channels + ch] = s;
                    }
                }
                frames_written += frames;
            }
        },
        |err| eprintln!("Audio error: {}", err),
        None,
    )?;
    stream.play()?;

    params.global.volume.set_float(-6.0);
    for round in 0..4 {
        // Walk the pluck position so each pass sounds a little different.
        params.string.position.set_float(0.08 + 0.1 * round as f32);
        for &note in ARPEGGIO.iter() {
            send(&mut tx, SynthMessage::NoteOn {
                channel: 0,
                note,
                velocity: 100,
            });
            thread::sleep(Duration::from_millis(300));
            send(&mut tx, SynthMessage::NoteOff { note });
        }
    }
    send(&mut tx, SynthMessage::AllNotesOff);
    thread::sleep(Duration::from_secs(2));
    info!("done");
    Ok(())
}

fn send(tx: &mut rtrb::Producer<SynthMessage>, message: SynthMessage) {
    if tx.push(message).is_err() {
        eprintln!("message queue full, dropped {:?}", message);
    }
}

fn tune(instrument: Instrument) -> EyreResult<()> {
    let config = EngineConfig {
        initial_instrument: instrument,
        ..EngineConfig::default()
    };
    let sample_rate = config.sample_rate;
    let block_size = config.block_size;
    let settle_blocks = (0.4 * sample_rate) as usize / block_size;
    let window = 8192;

    println!("note   target Hz   measured Hz   cents");
    for &note in TUNE_NOTES.iter() {
        let mut synth = Synth::new(config.clone())?;
        let mut block = vec![0.0f32; block_size];
        let mut aux = vec![0.0f32; block_size];
        let mut recorded = Vec::with_capacity(window + block_size);

        synth.note_on(0, note, 110);
        for _ in 0..settle_blocks {
            synth.process(&mut block, &mut aux);
        }
        while recorded.len() < window {
            synth.process(&mut block, &mut aux);
            recorded.extend_from_slice(&block);
        }

        let target = midi_to_freq(note as f32);
        let mut estimator = PitchEstimator::new(window, sample_rate);
        match estimator.estimate(&recorded) {
            Some(freq) => println!(
                "{:>4}   {:>9.2}   {:>11.2}   {:>+6.1}",
                note,
                target,
                freq,
                cents_between(freq, target)
            ),
            None => println!(
                "{:>4}   {:>9.2}   {:>11}   (peak {:.4})",
                note,
                target,
                "-",
                peak(&recorded)
            ),
        }
    }
    Ok(())
}
