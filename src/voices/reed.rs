//! Reed - a single-reed wind voice (clarinet family).
//!
//! # How It Works
//!
//! 1. A breath envelope rises toward the note's sustain level (velocity maps
//!    to 0.8..1.0 of full pressure)
//! 2. Air pressure is the breath squared plus a little noise and tremolo
//! 3. The pressure difference across the reed (air minus the returning
//!    bore wave) goes through a tanh reflection table bounded by the
//!    `inhaling` and `active` offsets
//! 4. The reflected wave passes a highpass and a lowpass, both tracking the
//!    note in semitone offsets, then re-enters the bore inverted
//! 5. The loop gain is normalized by the filters' gain at the geometric
//!    centre of their cutoffs, so `loss_gain` reads the same at every pitch
//!
//! # Variations
//!
//! - Larger `blend` = harder reed, buzzier tone
//! - `loss_lp` lower = darker, woodier bore
//! - `loss_gain` near -1 = stable oscillation; toward 0 = breathy, no tone
//! - Positive `loss_gain` = odd squeaks and overblown partials

use crate::dsp::note::{lerp, midi_to_freq};
use crate::dsp::smoother::ExpSmoother;
use crate::dsp::{DelayLine, LoopFilterType, Lowpass, Noise, OnePoleFilter, TuningFilter};
use crate::synth::voice::{BlockCtx, WaveguideVoice};

use super::{Modulation, TremoloMode, VibratoMode, READ_LATENCY, SILENCE_THRESHOLD};

const REFLECT_MIN: f32 = 0.02;
const REFLECT_MAX: f32 = 0.98;
const MIN_BLEND: f32 = 0.1;
const MIN_FILTER_GAIN: f32 = 1e-6;

pub struct Reed {
    sample_rate: f32,
    channel: u8,
    note: u8,
    lines: [Option<DelayLine>; 1],

    loss_lp: Lowpass,
    loss_hp: OnePoleFilter,
    envelope: ExpSmoother,
    noise: Noise,
    tuning: TuningFilter,
    modulation: Modulation,

    inhaling: f32,
    active: f32,
    blend: f32,
    blend_add: f32,
    noise_gain: f32,
    loss_gain: f32,
    loop_gain_add: f32,
    air_gain: f32,
    lp_offset: f32,
    hp_offset: f32,
    bend_range: f32,

    // derived from the table and loss settings
    slope: f32,
    effective_blend: f32,
    scale_fix: f32,
    filter_gain: f32,
    real_decay: f32,

    sustain: f32,
    note_held: bool,
    loop_len: f32,
    bend_len_delta: f32,
    tremolo: f32,
    peak: f32,
}

impl Reed {
    pub fn new(sample_rate: f32, index: usize) -> Self {
        let mut loss_lp = Lowpass::new(sample_rate);
        loss_lp.set_filter_type(LoopFilterType::Lpf1);
        let mut loss_hp = OnePoleFilter::new(sample_rate);
        loss_hp.set_highpass(midi_to_freq(48.0));

        let mut modulation = Modulation::new(sample_rate, 5.73, 5.73);
        modulation.set_vibrato_attack(5000.0);
        modulation.set_tremolo_attack(3000.0);

        let mut reed = Self {
            sample_rate,
            channel: 0,
            note: 60,
            lines: [None],
            loss_lp,
            loss_hp,
            envelope: ExpSmoother::new(sample_rate, 3.0, 10.0),
            noise: Noise::new(0x0B0E_0000 ^ index as u32),
            tuning: TuningFilter::new(),
            modulation,
            inhaling: -0.24,
            active: 0.6,
            blend: 4.0,
            blend_add: 0.0,
            noise_gain: 0.3,
            loss_gain: -1.05,
            loop_gain_add: 0.0,
            air_gain: 0.55,
            lp_offset: 13.0,
            hp_offset: -12.0,
            bend_range: 2.0,
            slope: 0.0,
            effective_blend: 0.0,
            scale_fix: 1.0,
            filter_gain: 1.0,
            real_decay: 0.0,
            sustain: 0.0,
            note_held: false,
            loop_len: 0.0,
            bend_len_delta: 0.0,
            tremolo: 0.0,
            peak: 0.0,
        };
        reed.update_table();
        reed.update_loss_filters();
        reed
    }

    /// Pressure difference below which the reed is shut.
    pub fn set_inhaling(&mut self, offset: f32) {
        self.inhaling = offset;
        self.update_table();
    }

    /// Pressure difference above which the reed is fully open.
    pub fn set_active(&mut self, offset: f32) {
        self.active = offset;
        self.update_table();
    }

    pub fn set_blend(&mut self, blend: f32) {
        self.blend = blend;
        self.update_table();
    }

    pub fn set_blend_add(&mut self, amount: f32) {
        self.blend_add = amount;
        self.update_table();
    }

    pub fn set_noise_gain(&mut self, gain: f32) {
        self.noise_gain = gain;
    }

    pub fn set_loss_gain(&mut self, gain: f32) {
        self.loss_gain = gain;
        self.update_real_decay();
    }

    pub fn set_loop_gain_add(&mut self, amount: f32) {
        self.loop_gain_add = amount;
        self.update_real_decay();
    }

    pub fn set_air_gain(&mut self, gain: f32) {
        self.air_gain = gain;
    }

    /// Lowpass cutoff in semitones relative to the note.
    pub fn set_loss_lp(&mut self, semitones: f32) {
        self.lp_offset = semitones;
        self.update_loss_filters();
    }

    /// Highpass cutoff in semitones relative to the note.
    pub fn set_loss_hp(&mut self, semitones: f32) {
        self.hp_offset = semitones;
        self.update_loss_filters();
    }

    pub fn set_loss_faster(&mut self, faster: bool) {
        self.loss_lp.set_filter_type(if faster {
            LoopFilterType::Lpf2
        } else {
            LoopFilterType::Lpf1
        });
        self.update_real_decay();
    }

    pub fn set_attack(&mut self, ms: f32) {
        self.envelope.set_attack(ms);
    }

    pub fn set_release(&mut self, ms: f32) {
        self.envelope.set_release(ms);
    }

    pub fn set_bend_range(&mut self, semitones: f32) {
        self.bend_range = semitones;
    }

    pub fn set_vibrato_mode(&mut self, mode: VibratoMode) {
        self.modulation.vibrato_mode = mode;
    }

    pub fn set_vibrato_depth(&mut self, depth: f32) {
        self.modulation.vibrato_depth = depth;
    }

    pub fn set_vibrato_rate(&mut self, rate_hz: f32) {
        self.modulation.set_vibrato_rate(rate_hz);
    }

    pub fn set_vibrato_attack(&mut self, ms: f32) {
        self.modulation.set_vibrato_attack(ms);
    }

    pub fn set_tremolo_mode(&mut self, mode: TremoloMode) {
        self.modulation.tremolo_mode = mode;
    }

    pub fn set_tremolo_depth(&mut self, depth: f32) {
        self.modulation.tremolo_depth = depth;
    }

    pub fn set_tremolo_rate(&mut self, rate_hz: f32) {
        self.modulation.set_tremolo_rate(rate_hz);
    }

    pub fn set_tremolo_attack(&mut self, ms: f32) {
        self.modulation.set_tremolo_attack(ms);
    }

    pub fn loop_len(&self) -> f32 {
        self.loop_len
    }

    pub fn loop_delay(&self) -> usize {
        self.lines[0]
            .as_ref()
            .map(|line| line.delay() + READ_LATENCY as usize)
            .unwrap_or(0)
    }

    /// Bore loop gain after filter normalization.
    pub fn real_decay(&self) -> f32 {
        self.real_decay
    }

    /// Reed reflection for a pressure difference `delta`.
    pub fn reflection(&self, delta: f32) -> f32 {
        if delta < self.inhaling {
            REFLECT_MIN
        } else if delta > self.active {
            REFLECT_MAX
        } else {
            let x = (delta - self.inhaling) * self.slope;
            let v = ((x * 2.0 - 1.0) * self.effective_blend).tanh() * self.scale_fix * 0.5 + 0.5;
            v.clamp(REFLECT_MIN, REFLECT_MAX)
        }
    }

    fn update_table(&mut self) {
        let span = self.active - self.inhaling;
        self.slope = if span.abs() > f32::EPSILON { 1.0 / span } else { 0.0 };
        self.effective_blend = (self.blend + self.blend_add).max(MIN_BLEND);
        // tanh(blend) rescales the table so it spans the full 0..1 range
        self.scale_fix = 1.0 / self.effective_blend.tanh();
    }

    fn update_loss_filters(&mut self) {
        let note = self.note as f32;
        self.loss_hp.set_highpass(midi_to_freq(note + self.hp_offset));
        self.loss_lp.set_cutoff(midi_to_freq(note + self.lp_offset));
        self.update_real_decay();
    }

    fn update_real_decay(&mut self) {
        let centre = (self.loss_lp.cutoff() * self.loss_hp.cutoff()).sqrt();
        let omega = centre / self.sample_rate * std::f32::consts::TAU;
        let power = self.loss_lp.mag_power_response(omega) * self.loss_hp.mag_power_response(omega);
        self.filter_gain = power.sqrt().max(MIN_FILTER_GAIN);
        self.real_decay = (self.loss_gain + self.loop_gain_add) / self.filter_gain;
    }

    fn retune(&mut self, len: f32) {
        let integer = self.tuning.set_delay(len - READ_LATENCY);
        if let Some(line) = self.lines[0].as_mut() {
            line.set_delay(integer);
        }
    }
}

impl WaveguideVoice for Reed {
    fn delay_slots(&self) -> &[Option<DelayLine>] {
        &self.lines
    }

    fn delay_slots_mut(&mut self) -> &mut [Option<DelayLine>] {
        &mut self.lines
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: f32) {
        self.channel = channel;
        self.note = note;
        self.sustain = lerp(0.8, 1.0, velocity);
        self.update_loss_filters();

        let freq = midi_to_freq(note as f32);
        let filter_len = self.loss_lp.phase_delay(freq) + self.loss_hp.phase_delay(freq);
        let len = self.sample_rate / freq - filter_len;
        self.loop_len = len;

        let bend_freq = midi_to_freq(note as f32 + self.bend_range);
        let bend_len = self.sample_rate / bend_freq - filter_len;
        self.bend_len_delta = (len - bend_len).max(0.0);
        self.retune(len);

        self.note_held = true;
        self.modulation.restart();
    }

    fn note_off(&mut self) {
        self.sustain = 0.0;
        self.note_held = false;
    }

    fn begin_block(&mut self, block_len: usize, ctx: &BlockCtx) {
        self.peak = 0.0;
        let (pitch, tremolo) =
            self.modulation
                .advance(block_len, ctx.bend(self.channel), ctx.pressure(self.channel));
        self.tremolo = tremolo;
        self.retune(self.loop_len - pitch * self.bend_len_delta);
    }

    #[inline]
    fn process_single(&mut self) -> f32 {
        let env = self.envelope.process(self.sustain);
        let noise = self.noise.next01() * self.noise_gain;
        let air = (self.air_gain + self.tremolo + noise) * env * env * 0.5;

        let Some(bore) = self.lines[0].as_ref() else {
            return 0.0;
        };
        let returning = bore.last() * self.real_decay;
        let delta = air - returning;
        let inject = air - self.reflection(delta) * delta;

        let out = self.loss_lp.process(self.loss_hp.process(inject));
        let back = -self.tuning.process(out);
        if let Some(bore) = self.lines[0].as_mut() {
            bore.push(back);
        }

        self.peak = self.peak.max(out.abs());
        out
    }

    fn end_block(&mut self) -> bool {
        self.peak < SILENCE_THRESHOLD && !self.note_held
    }

    fn can_play(&self, note: u8) -> bool {
        self.peak < SILENCE_THRESHOLD || self.note == note
    }

    fn is_playing(&self, note: u8) -> bool {
        note == self.note
    }

    fn panic(&mut self) {
        self.sustain = 0.0;
        self.note_held = false;
        self.peak = 0.0;
        self.envelope.reset();
        self.loss_lp.reset();
        self.loss_hp.reset();
        self.tuning.reset();
        if let Some(line) = self.lines[0].as_mut() {
            line.clear();
        }
    }

    fn note(&self) -> u8 {
        self.note
    }

    fn channel(&self) -> u8 {
        self.channel
    }

    fn peak(&self) -> f32 {
        self.peak
    }
}
