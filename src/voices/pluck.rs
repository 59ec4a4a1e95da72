//! Plucked string - Karplus-Strong style loop with a shaped pluck burst.
//!
//! # How It Works
//!
//! 1. Note-on sizes the loop: `sample_rate / freq`, minus the phase delay of
//!    the dispersion cascade and the loss lowpass at the fundamental
//! 2. The tuning allpass takes the fractional remainder, the delay line the
//!    integer part
//! 3. The pluck is a square pulse (+0.5 up to the pluck position, -0.5 to one
//!    loop length) crossfaded with a noise burst and its delayed, inverted
//!    copy. `color` sets the mix
//! 4. The burst runs through a DC blocker and a key-tracked exciter lowpass
//!    before entering the loop
//! 5. Each pass: loss lowpass, dispersion, tuning, clamp, decay gain
//!
//! # Variations
//!
//! - Higher `position` = thinner, more nasal (comb notch moves down)
//! - `color` toward 1 = noisier, brighter attack
//! - Negative decay = inverted loop gain, a hollow odd-harmonic string
//! - Dispersion > 0 = stiff, piano-like inharmonic partials

use crate::dsp::note::{lerp, midi_to_freq, KeyTracking};
use crate::dsp::{
    DcBlocker, DelayLine, LoopFilterType, Lowpass, Noise, ThiranDispersion, TuningFilter,
};
use crate::synth::voice::{BlockCtx, WaveguideVoice};

use super::{READ_LATENCY, SILENCE_THRESHOLD};

const MAX_DECAY_GAIN: f32 = 0.9999;
const LOOP_CLAMP: f32 = 4.0;
const POSITION_MIN: f32 = 0.0;
const POSITION_MAX: f32 = 0.5;

pub struct PluckString {
    sample_rate: f32,
    channel: u8,
    note: u8,
    lines: [Option<DelayLine>; 1],

    dispersion: ThiranDispersion,
    loss: Lowpass,
    exciter: Lowpass,
    tuning: TuningFilter,
    dc_blocker: DcBlocker,
    burst: Noise,
    burst_echo: Noise,
    seeds: Noise,

    decay_ms: f32,
    position: f32,
    position_add: f32,
    color: f32,
    dispersion_ratio: f32,
    vibrate_depth: f32,
    bend_range: f32,
    touch_x: f32,
    loss_tracking: KeyTracking,
    exciter_tracking: KeyTracking,

    decay_gain: f32,
    loop_len: f32,
    bend_len_delta: f32,
    pulse_len: f32,
    burst_phase: f32,
    exciting: bool,
    peak: f32,
}

impl PluckString {
    pub fn new(sample_rate: f32, index: usize) -> Self {
        let mut loss = Lowpass::new(sample_rate);
        loss.set_filter_type(LoopFilterType::Lpf2);
        let mut exciter = Lowpass::new(sample_rate);
        exciter.set_filter_type(LoopFilterType::Lpf1);

        Self {
            sample_rate,
            channel: 0,
            note: 0,
            lines: [None],
            dispersion: ThiranDispersion::new(sample_rate),
            loss,
            exciter,
            tuning: TuningFilter::new(),
            dc_blocker: DcBlocker::default(),
            burst: Noise::default(),
            burst_echo: Noise::default(),
            seeds: Noise::new(0x5EED_0000 ^ index as u32),
            decay_ms: 1000.0,
            position: 0.13,
            position_add: 0.0,
            color: 0.55,
            dispersion_ratio: 0.0,
            vibrate_depth: 0.1,
            bend_range: 2.0,
            touch_x: 0.5,
            loss_tracking: KeyTracking::new(36.0, 100.0, 105.0, 123.0),
            exciter_tracking: KeyTracking::new(36.0, 100.0, 105.0, 123.0),
            decay_gain: 0.0,
            loop_len: 0.0,
            bend_len_delta: 0.0,
            pulse_len: 0.0,
            burst_phase: 0.0,
            exciting: false,
            peak: 0.0,
        }
    }

    /// Loop decay time in ms. Negative inverts the loop gain; zero keeps
    /// the current gain.
    pub fn set_decay(&mut self, decay_ms: f32) {
        self.decay_ms = decay_ms;
        self.update_decay_gain();
    }

    fn update_decay_gain(&mut self) {
        let d = self.decay_ms;
        if d > 0.0 {
            let gain = 10.0_f32.powf(-self.loop_len / (self.sample_rate * d / 1000.0));
            self.decay_gain = gain.min(MAX_DECAY_GAIN);
        } else if d < 0.0 {
            let gain = -10.0_f32.powf(-self.loop_len / (self.sample_rate * -d / 1000.0));
            self.decay_gain = gain.max(-MAX_DECAY_GAIN);
        }
    }

    pub fn set_dispersion(&mut self, ratio: f32) {
        self.dispersion_ratio = ratio;
    }

    pub fn set_position(&mut self, position: f32) {
        self.position = position;
    }

    pub fn set_position_add(&mut self, amount: f32) {
        self.position_add = amount;
    }

    pub fn set_color(&mut self, color: f32) {
        self.color = color;
    }

    pub fn set_vibrate_depth(&mut self, depth: f32) {
        self.vibrate_depth = depth;
    }

    pub fn set_bend_range(&mut self, semitones: f32) {
        self.bend_range = semitones;
    }

    /// Touch-strip position, 0 to 1. Offsets the pluck position at the next note.
    pub fn set_touch_x(&mut self, x: f32) {
        self.touch_x = x.clamp(0.0, 1.0);
    }

    pub fn set_loss_faster(&mut self, faster: bool) {
        self.loss.set_filter_type(if faster {
            LoopFilterType::Lpf2
        } else {
            LoopFilterType::Lpf1
        });
    }

    pub fn set_exciter_faster(&mut self, faster: bool) {
        self.exciter.set_filter_type(if faster {
            LoopFilterType::Lpf2
        } else {
            LoopFilterType::Lpf1
        });
    }

    pub fn set_loss_tracking(&mut self, tracking: KeyTracking) {
        self.loss_tracking = tracking;
    }

    pub fn set_exciter_tracking(&mut self, tracking: KeyTracking) {
        self.exciter_tracking = tracking;
    }

    /// Real-valued loop length after filter compensation
    pub fn loop_len(&self) -> f32 {
        self.loop_len
    }

    /// Integer samples in the delay path of the loop, read latency included.
    pub fn loop_delay(&self) -> usize {
        self.lines[0]
            .as_ref()
            .map(|line| line.delay() + READ_LATENCY as usize)
            .unwrap_or(0)
    }

    pub fn decay_gain(&self) -> f32 {
        self.decay_gain
    }

    fn retune(&mut self, len: f32) {
        let integer = self.tuning.set_delay(len - READ_LATENCY);
        if let Some(line) = self.lines[0].as_mut() {
            line.set_delay(integer);
        }
    }
}

impl WaveguideVoice for PluckString {
    fn delay_slots(&self) -> &[Option<DelayLine>] {
        &self.lines
    }

    fn delay_slots_mut(&mut self) -> &mut [Option<DelayLine>] {
        &mut self.lines
    }

    fn note_on(&mut self, channel: u8, note: u8, _velocity: f32) {
        self.channel = channel;
        self.note = note;
        let freq = midi_to_freq(note as f32);

        self.loss
            .set_cutoff(midi_to_freq(self.loss_tracking.map(note as f32)));
        let mut len = self.sample_rate / freq;
        self.dispersion.set_group_delay(self.dispersion_ratio * len);
        let dispersion_len = self.dispersion.phase_delay(freq);
        let loss_len = self.loss.phase_delay(freq);
        let filter_len = dispersion_len + loss_len;
        len -= filter_len;
        self.loop_len = len;
        self.retune(len);

        let bend_freq = midi_to_freq(note as f32 + self.bend_range);
        let bend_len = self.sample_rate / bend_freq - filter_len;
        self.bend_len_delta = (len - bend_len).max(0.0);

        let touch = 2.0 * self.touch_x - 1.0;
        let position = (self.position + touch * self.position_add).clamp(POSITION_MIN, POSITION_MAX);
        self.pulse_len = len * position;
        self.burst_phase = 0.0;
        self.exciting = true;

        let seed = self.seeds.next_u32();
        self.burst.set_seed(seed);
        self.burst_echo.set_seed(seed);

        self.exciter
            .set_cutoff(midi_to_freq(self.exciter_tracking.map(note as f32)));
        self.update_decay_gain();
    }

    fn note_off(&mut self) {
        // Plucked strings ring out on their own.
    }

    fn begin_block(&mut self, _block_len: usize, ctx: &BlockCtx) {
        self.peak = 0.0;
        let bend = ctx.bend(self.channel) * self.vibrate_depth;
        self.retune(self.loop_len - bend * self.bend_len_delta);
    }

    #[inline]
    fn process_single(&mut self) -> f32 {
        let mut excitation = 0.0;
        if self.exciting {
            let phase = self.burst_phase;
            let mut dc = 0.0;
            let mut noise = 0.0;
            if phase < self.pulse_len {
                dc = 0.5;
            } else if phase < self.loop_len {
                dc = -0.5;
            }
            if phase < self.loop_len {
                noise += self.burst.next();
            }
            // Echo replays the same burst inverted, starting one pulse later.
            if phase - self.pulse_len > 0.0 {
                noise -= self.burst_echo.next();
            }
            if phase - self.pulse_len > self.loop_len {
                self.exciting = false;
            }
            self.burst_phase += 1.0;
            excitation = lerp(dc, noise, self.color);
        }
        let excitation = self.dc_blocker.process(excitation);
        let excitation = self.exciter.process(excitation) * 0.5;

        let Some(line) = self.lines[0].as_mut() else {
            return 0.0;
        };
        let mut a = line.last() + excitation;
        a = self.loss.process(a);
        a = self.dispersion.process(a);
        a = self.tuning.process(a);
        a = a.clamp(-LOOP_CLAMP, LOOP_CLAMP) * self.decay_gain;
        line.push(a);

        self.peak = self.peak.max(a.abs());
        a
    }

    fn end_block(&mut self) -> bool {
        self.peak < SILENCE_THRESHOLD
    }

    fn can_play(&self, _note: u8) -> bool {
        self.peak < SILENCE_THRESHOLD
    }

    fn is_playing(&self, note: u8) -> bool {
        note == self.note
    }

    fn panic(&mut self) {
        self.exciting = false;
        self.peak = 0.0;
        self.loss.reset();
        self.exciter.reset();
        self.dispersion.reset();
        self.tuning.reset();
        self.dc_blocker.reset();
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
