//! Engine orchestration: one voice family at a time, fed by a message queue
//! and a dirty-bit parameter table.
//!
//! # Block flow
//!
//! ```text
//! control thread                      audio thread (Synth::process)
//! ──────────────                      ─────────────────────────────
//! Producer<SynthMessage> ──rtrb──▶   1. drain messages (notes, bend, instrument)
//! Arc<SynthParams> writes ──bits──▶  2. run dirty parameter callbacks
//!                                     3. render the active PolySynth
//!                                     4. downstream stages (body, reverb, ...)
//! ```
//!
//! Delay lines are checked out only by the active family. Switching
//! instruments hard-stops the old family, returns its lines to the pool and
//! hands them to the new one.

use std::sync::Arc;

use log::{info, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::note::db_to_gain;
use crate::dsp::DelayAllocator;
use crate::error::{EngineError, EngineResult};
use crate::params::{CallbackTable, Preset, SynthParams};
use crate::synth::bindings::bind_all;
use crate::synth::message::{MessageReceiver, SynthMessage};
use crate::synth::poly::PolySynth;
use crate::synth::voice::BlockCtx;
use crate::voices::{Bowed, PluckString, Reed};
use crate::{DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE, DELAY_POOL_SIZE, MAX_BLOCK_SIZE};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Instrument {
    #[default]
    String,
    Reed,
    Bow,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::String, Instrument::Reed, Instrument::Bow];

    pub fn from_index(index: u8) -> EngineResult<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or(EngineError::UnknownInstrument(index))
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::String => "string",
            Instrument::Reed => "reed",
            Instrument::Bow => "bow",
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub block_size: usize,
    pub initial_instrument: Instrument,
    pub delay_pool_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            initial_instrument: Instrument::String,
            delay_pool_size: DELAY_POOL_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(self.sample_rate));
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(EngineError::InvalidBlockSize(self.block_size));
        }
        Ok(())
    }
}

/// A buffer transformer after the voices: body resonance, reverb, etc.
///
/// `aux` is a second mono channel of the same length, zeroed before the
/// first stage runs.
pub trait DownstreamStage: Send {
    fn process(&mut self, buffer: &mut [f32], aux: &mut [f32]);
}

impl<F> DownstreamStage for F
where
    F: FnMut(&mut [f32], &mut [f32]) + Send,
{
    fn process(&mut self, buffer: &mut [f32], aux: &mut [f32]) {
        self(buffer, aux)
    }
}

/// All three voice families plus what the parameter callbacks write into.
pub struct InstrumentBank {
    pub params: Arc<SynthParams>,
    pub string: PolySynth<PluckString>,
    pub reed: PolySynth<Reed>,
    pub bowed: PolySynth<Bowed>,
    /// Linear gain from `global.volume`
    pub output_gain: f32,
}

impl InstrumentBank {
    pub fn new(params: Arc<SynthParams>, sample_rate: f32) -> Self {
        let output_gain = db_to_gain(params.global.volume.get_float());
        Self {
            params,
            string: PolySynth::new(|i| PluckString::new(sample_rate, i)),
            reed: PolySynth::new(|i| Reed::new(sample_rate, i)),
            bowed: PolySynth::new(|i| Bowed::new(sample_rate, i)),
            output_gain,
        }
    }

    fn attach(&mut self, instrument: Instrument, pool: &mut DelayAllocator) -> EngineResult<()> {
        match instrument {
            Instrument::String => self.string.attach_delay_lines(pool),
            Instrument::Reed => self.reed.attach_delay_lines(pool),
            Instrument::Bow => self.bowed.attach_delay_lines(pool),
        }
    }

    fn detach(&mut self, instrument: Instrument, pool: &mut DelayAllocator) {
        match instrument {
            Instrument::String => self.string.detach_delay_lines(pool),
            Instrument::Reed => self.reed.detach_delay_lines(pool),
            Instrument::Bow => self.bowed.detach_delay_lines(pool),
        }
    }

    fn force_stop(&mut self, instrument: Instrument) {
        match instrument {
            Instrument::String => self.string.force_stop_all(),
            Instrument::Reed => self.reed.force_stop_all(),
            Instrument::Bow => self.bowed.force_stop_all(),
        }
    }
}

pub struct Synth {
    config: EngineConfig,
    params: Arc<SynthParams>,
    table: CallbackTable<InstrumentBank>,
    bank: InstrumentBank,
    pool: DelayAllocator,
    instrument: Instrument,
    ctx: BlockCtx,
    receiver: Option<Box<dyn MessageReceiver + Send>>,
    stages: Vec<Box<dyn DownstreamStage>>,
    /// Outcome of the last switch requested through the message queue
    queued_switch: Option<EngineResult<Instrument>>,
}

impl Synth {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_params(config, Arc::new(SynthParams::new()))
    }

    /// Build around an existing parameter set, e.g. one the UI already holds.
    pub fn with_params(config: EngineConfig, params: Arc<SynthParams>) -> EngineResult<Self> {
        config.validate()?;

        let mut table = CallbackTable::new();
        bind_all(&mut table, &params);

        let mut bank = InstrumentBank::new(Arc::clone(&params), config.sample_rate);
        let mut pool = DelayAllocator::new(config.delay_pool_size);
        let instrument = config.initial_instrument;
        if let Err(err) = bank.attach(instrument, &mut pool) {
            warn!("{} voices cannot start: {}", instrument.name(), err);
            return Err(err);
        }

        // First block pushes every parameter into every voice.
        params.callbacks().mark_all();

        info!(
            "synth ready: {} Hz, {}-sample blocks, {} params, instrument {}",
            config.sample_rate,
            config.block_size,
            params.len(),
            instrument.name()
        );

        Ok(Self {
            config,
            params,
            table,
            bank,
            pool,
            instrument,
            ctx: BlockCtx::new(),
            receiver: None,
            stages: Vec::new(),
            queued_switch: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn params(&self) -> &Arc<SynthParams> {
        &self.params
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    /// Start a note on the active family. Returns true when a sounding
    /// voice was stolen.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> bool {
        match self.instrument {
            Instrument::String => self.bank.string.note_on(channel, note, velocity),
            Instrument::Reed => self.bank.reed.note_on(channel, note, velocity),
            Instrument::Bow => self.bank.bowed.note_on(channel, note, velocity),
        }
    }

    pub fn note_off(&mut self, note: u8) {
        match self.instrument {
            Instrument::String => self.bank.string.note_off(note),
            Instrument::Reed => self.bank.reed.note_off(note),
            Instrument::Bow => self.bank.bowed.note_off(note),
        }
    }

    pub fn all_notes_off(&mut self) {
        match self.instrument {
            Instrument::String => self.bank.string.all_notes_off(),
            Instrument::Reed => self.bank.reed.all_notes_off(),
            Instrument::Bow => self.bank.bowed.all_notes_off(),
        }
    }

    /// Bend for `channel`, -1.0 to 1.0 of the bend range.
    pub fn pitch_bend(&mut self, channel: u8, amount: f32) {
        let index = channel as usize % self.ctx.pitch_bend.len();
        self.ctx.pitch_bend[index] = amount.clamp(-1.0, 1.0);
    }

    pub fn channel_pressure(&mut self, channel: u8, amount: f32) {
        let index = channel as usize % self.ctx.pressure.len();
        self.ctx.pressure[index] = amount.clamp(0.0, 1.0);
    }

    /// Touch-strip position, moves the pluck point of the next string notes.
    pub fn touch_position(&mut self, x: f32) {
        for voice in self.bank.string.voices_mut() {
            voice.set_touch_x(x);
        }
    }

    /// Switch voice families. The old family is hard-stopped and its delay
    /// lines move to the new one. On failure the old family is restored.
    pub fn set_instrument(&mut self, instrument: Instrument) -> EngineResult<()> {
        let previous = self.instrument;
        match self.switch_family(instrument) {
            Ok(()) => {
                if previous != instrument {
                    info!("instrument {} -> {}", previous.name(), instrument.name());
                }
                Ok(())
            }
            Err(err) => {
                warn!("cannot switch to {}: {}", instrument.name(), err);
                Err(err)
            }
        }
    }

    /// The switch itself. Runs on the audio thread for queued switches, so
    /// it must not log.
    fn switch_family(&mut self, instrument: Instrument) -> EngineResult<()> {
        if instrument == self.instrument {
            return Ok(());
        }
        let previous = self.instrument;
        self.bank.force_stop(previous);
        self.bank.detach(previous, &mut self.pool);

        if let Err(err) = self.bank.attach(instrument, &mut self.pool) {
            self.bank.attach(previous, &mut self.pool)?;
            return Err(err);
        }
        self.instrument = instrument;
        self.ctx.reset();
        Ok(())
    }

    /// Take the result of the last instrument switch that arrived through
    /// the message queue, to report it off the audio thread.
    pub fn take_queued_switch(&mut self) -> Option<EngineResult<Instrument>> {
        self.queued_switch.take()
    }

    pub fn handle_message(&mut self, message: SynthMessage) {
        match message {
            SynthMessage::NoteOn {
                channel,
                note,
                velocity,
            } => {
                self.note_on(channel, note, velocity);
            }
            SynthMessage::NoteOff { note } => self.note_off(note),
            SynthMessage::PitchBend { channel, amount } => self.pitch_bend(channel, amount),
            SynthMessage::ChannelPressure { channel, amount } => {
                self.channel_pressure(channel, amount)
            }
            SynthMessage::TouchPosition { x } => self.touch_position(x),
            SynthMessage::SetInstrument(instrument) => {
                // On failure the old family keeps playing.
                let result = self.switch_family(instrument).map(|()| instrument);
                self.queued_switch = Some(result);
            }
            SynthMessage::AllNotesOff => self.all_notes_off(),
        }
    }

    /// Attach the consumer end of a message queue. Drained at the start of
    /// every block.
    pub fn set_receiver(&mut self, receiver: Box<dyn MessageReceiver + Send>) {
        self.receiver = Some(receiver);
    }

    /// Create a message queue, keep the consumer, return the producer.
    #[cfg(feature = "rtrb")]
    pub fn message_channel(&mut self, capacity: usize) -> rtrb::Producer<SynthMessage> {
        let (producer, consumer) = rtrb::RingBuffer::new(capacity);
        self.set_receiver(Box::new(consumer));
        producer
    }

    pub fn add_stage(&mut self, stage: Box<dyn DownstreamStage>) {
        self.stages.push(stage);
    }

    /// Render one block into `buffer`; `aux` gets the auxiliary channel.
    pub fn process(&mut self, buffer: &mut [f32], aux: &mut [f32]) {
        if let Some(mut receiver) = self.receiver.take() {
            while let Some(message) = receiver.pop() {
                self.handle_message(message);
            }
            self.receiver = Some(receiver);
        }

        self.params
            .callbacks()
            .handle_dirty_callbacks(&self.table, &mut self.bank);

        match self.instrument {
            Instrument::String => self.bank.string.process(buffer, &self.ctx),
            Instrument::Reed => self.bank.reed.process(buffer, &self.ctx),
            Instrument::Bow => self.bank.bowed.process(buffer, &self.ctx),
        }

        aux.fill(0.0);
        for stage in self.stages.iter_mut() {
            stage.process(buffer, aux);
        }
    }

    /// Linear gain for the output codec, from `global.volume`.
    pub fn output_gain(&self) -> f32 {
        self.bank.output_gain
    }

    pub fn active_voice_count(&self) -> usize {
        match self.instrument {
            Instrument::String => self.bank.string.active_count(),
            Instrument::Reed => self.bank.reed.active_count(),
            Instrument::Bow => self.bank.bowed.active_count(),
        }
    }

    pub fn delay_lines_available(&self) -> usize {
        self.pool.available()
    }

    pub fn bank(&self) -> &InstrumentBank {
        &self.bank
    }

    /// Set a float parameter by name.
    pub fn set_param(&self, name: &str, value: f32) -> EngineResult<bool> {
        Ok(self.params.find(name)?.expect_float()?.set_float(value))
    }

    pub fn capture_preset(&self, name: impl Into<String>) -> Preset {
        Preset::capture(name, self.instrument, &self.params)
    }

    /// Switch to the preset's instrument and load its values. They reach
    /// the voices at the next block.
    pub fn apply_preset(&mut self, preset: &Preset) -> EngineResult<usize> {
        self.set_instrument(preset.instrument)?;
        let applied = preset.apply_values(&self.params);
        info!(
            "preset {}: {} of {} values applied",
            preset.name,
            applied,
            preset.values.len()
        );
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::voice::WaveguideVoice;
    use crate::NUM_POLYPHONY;

    fn synth(instrument: Instrument) -> Synth {
        Synth::new(EngineConfig {
            initial_instrument: instrument,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn peak(buffer: &[f32]) -> f32 {
        buffer.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn config_validation() {
        let bad_rate = EngineConfig {
            sample_rate: 0.0,
            ..EngineConfig::default()
        };
        assert_eq!(bad_rate.validate(), Err(EngineError::InvalidSampleRate(0.0)));
        let bad_block = EngineConfig {
            block_size: MAX_BLOCK_SIZE + 1,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Synth::new(bad_block),
            Err(EngineError::InvalidBlockSize(_))
        ));
    }

    #[test]
    fn small_pool_fails_at_construction() {
        let config = EngineConfig {
            initial_instrument: Instrument::Bow,
            delay_pool_size: NUM_POLYPHONY,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Synth::new(config),
            Err(EngineError::DelayPoolExhausted { .. })
        ));
    }

    #[test]
    fn only_active_family_holds_lines() {
        let mut synth = synth(Instrument::String);
        assert_eq!(synth.delay_lines_available(), DELAY_POOL_SIZE - NUM_POLYPHONY);
        synth.set_instrument(Instrument::Bow).unwrap();
        assert_eq!(synth.delay_lines_available(), 0);
        assert!(synth.bank().string.voices().iter().all(|v| !v.has_delay_lines()));
        synth.set_instrument(Instrument::Reed).unwrap();
        assert_eq!(synth.delay_lines_available(), DELAY_POOL_SIZE - NUM_POLYPHONY);
    }

    #[test]
    fn failed_switch_keeps_old_family() {
        let mut synth = Synth::new(EngineConfig {
            delay_pool_size: NUM_POLYPHONY,
            ..EngineConfig::default()
        })
        .unwrap();
        let err = synth.set_instrument(Instrument::Bow).unwrap_err();
        assert!(matches!(err, EngineError::DelayPoolExhausted { .. }));
        assert_eq!(synth.instrument(), Instrument::String);
        assert!(synth.bank().string.voices().iter().all(|v| v.has_delay_lines()));
    }

    #[test]
    fn switching_stops_sounding_voices() {
        let mut synth = synth(Instrument::String);
        let mut buffer = [0.0f32; 480];
        let mut aux = [0.0f32; 480];
        synth.note_on(0, 60, 100);
        synth.note_on(0, 64, 100);
        synth.process(&mut buffer, &mut aux);
        assert_eq!(synth.active_voice_count(), 2);

        synth.set_instrument(Instrument::Reed).unwrap();
        assert_eq!(synth.active_voice_count(), 0);
        assert_eq!(synth.bank().string.active_count(), 0);
        synth.process(&mut buffer, &mut aux);
        assert_eq!(peak(&buffer), 0.0);
    }

    #[test]
    fn messages_are_drained_each_block() {
        let mut synth = synth(Instrument::String);
        let mut tx = synth.message_channel(16);
        tx.push(SynthMessage::NoteOn {
            channel: 0,
            note: 69,
            velocity: 100,
        })
        .unwrap();
        tx.push(SynthMessage::SetInstrument(Instrument::String)).unwrap();
        let mut buffer = [0.0f32; 480];
        let mut aux = [0.0f32; 480];
        synth.process(&mut buffer, &mut aux);
        assert_eq!(synth.active_voice_count(), 1);
        assert!(peak(&buffer) > 1e-3);
    }

    #[test]
    fn queued_switch_reports_outcome() {
        let mut synth = Synth::new(EngineConfig {
            delay_pool_size: NUM_POLYPHONY,
            ..EngineConfig::default()
        })
        .unwrap();
        let mut tx = synth.message_channel(16);
        let mut buffer = [0.0f32; 64];
        let mut aux = [0.0f32; 64];
        assert!(synth.take_queued_switch().is_none());

        tx.push(SynthMessage::SetInstrument(Instrument::Bow)).unwrap();
        synth.process(&mut buffer, &mut aux);
        assert!(matches!(
            synth.take_queued_switch(),
            Some(Err(EngineError::DelayPoolExhausted { .. }))
        ));
        assert_eq!(synth.instrument(), Instrument::String);

        tx.push(SynthMessage::SetInstrument(Instrument::Reed)).unwrap();
        synth.process(&mut buffer, &mut aux);
        assert_eq!(synth.take_queued_switch(), Some(Ok(Instrument::Reed)));
        assert_eq!(synth.instrument(), Instrument::Reed);
        assert!(synth.take_queued_switch().is_none());
    }

    #[test]
    fn stages_run_after_voices() {
        let mut synth = synth(Instrument::String);
        synth.add_stage(Box::new(|buffer: &mut [f32], aux: &mut [f32]| {
            for (b, a) in buffer.iter_mut().zip(aux.iter_mut()) {
                *a = *b;
                *b = 0.25;
            }
        }));
        synth.note_on(0, 60, 127);
        let mut buffer = [0.0f32; 256];
        let mut aux = [1.0f32; 256];
        synth.process(&mut buffer, &mut aux);
        assert!(buffer.iter().all(|s| *s == 0.25));
        assert!(peak(&aux) > 1e-3, "stage did not see the voices");
    }

    #[test]
    fn parameter_changes_land_next_block() {
        let mut synth = synth(Instrument::String);
        let mut buffer = [0.0f32; 64];
        let mut aux = [0.0f32; 64];
        synth.process(&mut buffer, &mut aux);
        synth.set_param("global.volume", 0.0).unwrap();
        assert!(synth.output_gain() < 1.0);
        synth.process(&mut buffer, &mut aux);
        assert!((synth.output_gain() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn set_param_checks_kind() {
        let synth = synth(Instrument::String);
        assert!(matches!(
            synth.set_param("string.loss_in_low", 40.0),
            Err(EngineError::ParamKindMismatch { .. })
        ));
        assert!(matches!(
            synth.set_param("string.missing", 1.0),
            Err(EngineError::UnknownParam(_))
        ));
    }

    #[test]
    fn preset_switches_instrument() {
        let mut synth = synth(Instrument::Bow);
        synth.params().bow.speed.set_float(0.2);
        let preset = synth.capture_preset("loud bow");
        synth.set_instrument(Instrument::String).unwrap();
        synth.params().bow.speed.reset();

        let applied = synth.apply_preset(&preset).unwrap();
        assert_eq!(applied, preset.values.len());
        assert_eq!(synth.instrument(), Instrument::Bow);
        assert_eq!(synth.params().bow.speed.get_float(), 0.2);
    }

    #[test]
    fn instrument_index_round_trip() {
        for instrument in Instrument::ALL {
            assert_eq!(Instrument::from_index(instrument.index()), Ok(instrument));
        }
        assert_eq!(Instrument::from_index(7), Err(EngineError::UnknownInstrument(7)));
    }
}
