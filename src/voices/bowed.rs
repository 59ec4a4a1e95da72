//! Bowed string - two delay segments meeting at a stick-slip bow.
//!
//! # How It Works
//!
//! 1. The string is split at the bow: nut-to-bow and bow-to-bridge delay
//!    lines, their lengths set by `position`
//! 2. Bow speed follows a smoothed envelope toward the note's velocity,
//!    with lowpassed noise and tremolo riding on top
//! 3. The velocity difference between bow and string feeds a friction
//!    table `clamp((|dv * slope + offset| + 0.75)^-4, min, max)` which
//!    decides how much of the difference sticks
//! 4. The sticking velocity is added to both travelling waves. The
//!    bridge-bound wave takes the decay gain and the loss lowpass
//! 5. Once the bow lifts (speed envelope at rest after note-off) the bow
//!    junction drops out and the string rings down through the loss path
//!
//! # Variations
//!
//! - `position` near the bridge (small) = sul ponticello, glassy
//! - Higher `speed` = louder, more pressure-like
//! - Lower `slope` = steeper friction curve, grittier attack
//! - More `noise` = audible bow hair

use crate::dsp::note::{midi_to_freq, KeyTracking};
use crate::dsp::smoother::ExpSmoother;
use crate::dsp::{DelayLine, LoopFilterType, Lowpass, Noise, OnePoleFilter, TuningFilter};
use crate::synth::voice::{BlockCtx, WaveguideVoice};

use super::{Modulation, TremoloMode, VibratoMode, READ_LATENCY};

const NUT: usize = 0;
const BRIDGE: usize = 1;
const MAX_DECAY_GAIN: f32 = 0.9999;
const BOW_SILENCE: f32 = 1e-3;
const BOW_REST_SPEED: f32 = 1e-3;

pub struct Bowed {
    sample_rate: f32,
    channel: u8,
    note: u8,
    lines: [Option<DelayLine>; 2],

    loss: Lowpass,
    noise_lp: OnePoleFilter,
    speed_env: ExpSmoother,
    noise: Noise,
    tuning: TuningFilter,
    modulation: Modulation,

    position: f32,
    speed: f32,
    table_offset: f32,
    table_slope: f32,
    table_min: f32,
    table_max: f32,
    decay_ms: f32,
    noise_amount: f32,
    bend_range: f32,
    loss_tracking: KeyTracking,

    sustain: f32,
    current_speed: f32,
    note_held: bool,
    bow_on_string: bool,
    decay_gain: f32,
    total_len: f32,
    loop_len: f32,
    bend_len_delta: f32,
    tremolo: f32,
    peak: f32,
}

impl Bowed {
    pub fn new(sample_rate: f32, index: usize) -> Self {
        let mut loss = Lowpass::new(sample_rate);
        loss.set_filter_type(LoopFilterType::Lpf1);
        let mut noise_lp = OnePoleFilter::new(sample_rate);
        noise_lp.set_lowpass(midi_to_freq(80.0));

        let mut modulation = Modulation::new(sample_rate, 6.33, 6.57);
        modulation.set_vibrato_attack(1500.0);
        modulation.set_tremolo_attack(2000.0);
        modulation.tremolo_depth = 0.01;

        Self {
            sample_rate,
            channel: 0,
            note: 60,
            lines: [None, None],
            loss,
            noise_lp,
            speed_env: ExpSmoother::new(sample_rate, 5.0, 60.0),
            noise: Noise::new(0xB0_0000 ^ index as u32),
            tuning: TuningFilter::new(),
            modulation,
            position: 0.13,
            speed: 0.08,
            table_offset: 0.03,
            table_slope: Self::table_slope(0.5),
            table_min: 0.01,
            table_max: 0.98,
            decay_ms: 300.0,
            noise_amount: 0.03,
            bend_range: 2.0,
            loss_tracking: KeyTracking::new(48.0, 100.0, 105.0, 123.0),
            sustain: 0.0,
            current_speed: 0.0,
            note_held: false,
            bow_on_string: false,
            decay_gain: 0.0,
            total_len: 0.0,
            loop_len: 0.0,
            bend_len_delta: 0.0,
            tremolo: 0.0,
            peak: 0.0,
        }
    }

    // 0..1 control onto a friction slope of 5..1
    fn table_slope(slope: f32) -> f32 {
        5.0 - 4.0 * slope
    }

    /// Bow position as a fraction of the string from the nut side.
    pub fn set_position(&mut self, position: f32) {
        self.position = position;
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn set_table_offset(&mut self, offset: f32) {
        self.table_offset = offset;
    }

    pub fn set_table_slope(&mut self, slope: f32) {
        self.table_slope = Self::table_slope(slope);
    }

    pub fn set_table_min(&mut self, min: f32) {
        self.table_min = min;
    }

    pub fn set_table_max(&mut self, max: f32) {
        self.table_max = max;
    }

    /// Ring-down time in ms; takes effect at the next note.
    pub fn set_decay(&mut self, decay_ms: f32) {
        self.decay_ms = decay_ms;
    }

    pub fn set_noise(&mut self, amount: f32) {
        self.noise_amount = amount;
    }

    /// Bow noise lowpass as a MIDI note number.
    pub fn set_noise_lp(&mut self, note: f32) {
        self.noise_lp.set_lowpass(midi_to_freq(note));
    }

    pub fn set_loss_faster(&mut self, faster: bool) {
        self.loss.set_filter_type(if faster {
            LoopFilterType::Lpf2
        } else {
            LoopFilterType::Lpf1
        });
    }

    pub fn set_loss_tracking(&mut self, tracking: KeyTracking) {
        self.loss_tracking = tracking;
    }

    pub fn set_attack(&mut self, ms: f32) {
        self.speed_env.set_attack(ms);
    }

    pub fn set_release(&mut self, ms: f32) {
        self.speed_env.set_release(ms);
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

    /// Friction reflection for a bow/string velocity difference.
    pub fn reflection(&self, delta_v: f32) -> f32 {
        let x = (delta_v * self.table_slope + self.table_offset).abs() + 0.75;
        x.powi(-4).clamp(self.table_min, self.table_max)
    }

    pub fn loop_len(&self) -> f32 {
        self.loop_len
    }

    /// Integer samples across both segments, read latency included.
    pub fn loop_delay(&self) -> usize {
        self.lines
            .iter()
            .flatten()
            .map(|line| line.delay() + READ_LATENCY as usize)
            .sum()
    }

    pub fn decay_gain(&self) -> f32 {
        self.decay_gain
    }

    /// Whether the bow is still in contact with the string.
    pub fn is_bowing(&self) -> bool {
        self.bow_on_string
    }

    fn update_decay_gain(&mut self) {
        let d = self.decay_ms;
        self.decay_gain = if d > 0.0 {
            10.0_f32
                .powf(-self.total_len / (self.sample_rate * d / 1000.0))
                .min(MAX_DECAY_GAIN)
        } else {
            0.0
        };
    }

    fn retune(&mut self, len: f32) {
        let len = (len - 2.0 * READ_LATENCY).max(0.0);
        let nut_len = len * self.position;
        let nut_floor = nut_len.floor();
        let bridge_len = len - nut_len + (nut_len - nut_floor);
        let bridge_delay = self.tuning.set_delay(bridge_len);
        if let Some(nut) = self.lines[NUT].as_mut() {
            nut.set_delay(nut_floor as i32);
        }
        if let Some(bridge) = self.lines[BRIDGE].as_mut() {
            bridge.set_delay(bridge_delay);
        }
    }

    #[inline]
    fn process_bowing(&mut self) -> f32 {
        let env = self.speed_env.process(self.sustain);
        self.current_speed = env;
        let noise = self.noise_lp.process(self.noise.next()) * self.noise_amount;
        let bow_speed = (self.speed + self.tremolo + noise) * env;

        let (Some(nut), Some(bridge)) = (self.lines[NUT].as_ref(), self.lines[BRIDGE].as_ref())
        else {
            return 0.0;
        };
        let from_bridge = self.tuning.process(-bridge.last());
        let from_nut = -nut.last();

        let delta_v = bow_speed - (from_nut + from_bridge);
        let stick = self.reflection(delta_v) * delta_v;

        let to_bridge = (stick + from_nut) * self.decay_gain;
        let out = self.loss.process(to_bridge);
        if let Some(nut) = self.lines[NUT].as_mut() {
            nut.push(stick + from_bridge);
        }
        if let Some(bridge) = self.lines[BRIDGE].as_mut() {
            bridge.push(out);
        }
        out
    }

    #[inline]
    fn process_ringing(&mut self) -> f32 {
        let (Some(nut), Some(bridge)) = (self.lines[NUT].as_ref(), self.lines[BRIDGE].as_ref())
        else {
            return 0.0;
        };
        let from_bridge = self.tuning.process(-bridge.last());
        let from_nut = -nut.last();

        let out = self.loss.process(from_nut * self.decay_gain);
        if let Some(nut) = self.lines[NUT].as_mut() {
            nut.push(from_bridge);
        }
        if let Some(bridge) = self.lines[BRIDGE].as_mut() {
            bridge.push(out);
        }
        out
    }
}

impl WaveguideVoice for Bowed {
    fn delay_slots(&self) -> &[Option<DelayLine>] {
        &self.lines
    }

    fn delay_slots_mut(&mut self) -> &mut [Option<DelayLine>] {
        &mut self.lines
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: f32) {
        self.channel = channel;
        self.note = note;
        self.sustain = velocity;
        self.note_held = true;
        self.bow_on_string = true;

        self.loss
            .set_cutoff(midi_to_freq(self.loss_tracking.map(note as f32)));
        let freq = midi_to_freq(note as f32);
        let filter_len = self.loss.phase_delay(freq);
        self.total_len = self.sample_rate / freq;
        self.loop_len = self.total_len - filter_len;

        let bend_len = self.sample_rate / midi_to_freq(note as f32 + self.bend_range) - filter_len;
        self.bend_len_delta = (self.loop_len - bend_len).max(0.0);
        self.retune(self.loop_len);

        self.modulation.restart();
        self.update_decay_gain();
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
        let out = if self.bow_on_string {
            self.process_bowing()
        } else {
            self.process_ringing()
        };
        self.peak = self.peak.max(out.abs());
        out
    }

    fn end_block(&mut self) -> bool {
        if self.current_speed < BOW_REST_SPEED && !self.note_held {
            self.bow_on_string = false;
        }
        self.peak < BOW_SILENCE && !self.bow_on_string && !self.note_held
    }

    fn can_play(&self, note: u8) -> bool {
        self.peak < BOW_SILENCE || self.note == note
    }

    fn is_playing(&self, note: u8) -> bool {
        note == self.note
    }

    fn panic(&mut self) {
        self.sustain = 0.0;
        self.current_speed = 0.0;
        self.note_held = false;
        self.bow_on_string = false;
        self.peak = 0.0;
        self.speed_env.reset();
        self.loss.reset();
        self.noise_lp.reset();
        self.tuning.reset();
        for line in self.lines.iter_mut().flatten() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::DelayAllocator;

    const SR: f32 = 48_000.0;

    fn bow_with_lines() -> (Bowed, DelayAllocator) {
        let mut pool = DelayAllocator::new(2);
        let mut bow = Bowed::new(SR, 0);
        assert!(bow.attach_delay_lines(&mut pool));
        (bow, pool)
    }

    fn render(voice: &mut Bowed, blocks: usize) -> (f32, bool) {
        let ctx = BlockCtx::new();
        let mut buffer = [0.0f32; 480];
        let mut peak = 0.0f32;
        let mut silent = false;
        for _ in 0..blocks {
            silent = voice.process(&mut buffer, &ctx);
            assert!(buffer.iter().all(|s| s.is_finite()), "bow blew up");
            peak = peak.max(buffer.iter().fold(0.0f32, |m, s| m.max(s.abs())));
        }
        (peak, silent)
    }

    #[test]
    fn needs_two_lines() {
        let mut pool = DelayAllocator::new(1);
        let mut bow = Bowed::new(SR, 0);
        assert!(!bow.attach_delay_lines(&mut pool));
        assert_eq!(pool.available(), 1, "partial checkout leaked");
    }

    #[test]
    fn reflection_peaks_at_zero_difference() {
        let mut bow = Bowed::new(SR, 0);
        bow.set_table_offset(0.0);
        bow.set_table_min(0.0);
        bow.set_table_max(1.0);
        let at_rest = bow.reflection(0.0);
        // 0.75^-4 clamps to the max
        assert_eq!(at_rest, 1.0);
        assert!(bow.reflection(0.5) < bow.reflection(0.1));
        assert_eq!(bow.reflection(0.3), bow.reflection(-0.3));
    }

    #[test]
    fn reflection_respects_bounds() {
        let bow = Bowed::new(SR, 0);
        for i in -50..=50 {
            let r = bow.reflection(i as f32 / 10.0);
            assert!((0.01..=0.98).contains(&r), "reflection {} out of bounds", r);
        }
    }

    #[test]
    fn segments_add_up_to_loop() {
        let (mut bow, _pool) = bow_with_lines();
        bow.set_position(0.25);
        bow.note_on(0, 57, 1.0);
        let nut = bow.lines[NUT].as_ref().map(|l| l.delay()).unwrap_or(0);
        let total = bow.loop_delay() as f32;
        let expected = bow.loop_len();
        let tuned = total + bow.tuning.fractional_delay();
        assert!(
            (tuned - expected).abs() < 1e-3,
            "segments {} vs loop {}",
            tuned,
            expected
        );
        let ratio = nut as f32 / total;
        assert!((ratio - 0.25).abs() < 0.02, "nut share {}", ratio);
    }

    #[test]
    fn bowing_builds_up_sound() {
        let (mut bow, _pool) = bow_with_lines();
        bow.note_on(0, 55, 1.0);
        let (peak, silent) = render(&mut bow, 50);
        assert!(peak > 1e-3, "bow never caught the string: {}", peak);
        assert!(!silent);
        assert!(bow.is_bowing());
    }

    #[test]
    fn lifts_bow_and_rings_down() {
        let (mut bow, _pool) = bow_with_lines();
        bow.note_on(0, 55, 1.0);
        render(&mut bow, 30);
        bow.note_off();
        render(&mut bow, 60);
        assert!(!bow.is_bowing(), "bow never lifted");
        let (_, silent) = render(&mut bow, 400);
        assert!(silent, "string still ringing, peak {}", bow.peak());
        assert!(bow.can_play(40));
    }

    #[test]
    fn zero_decay_mutes_the_loop() {
        let (mut bow, _pool) = bow_with_lines();
        bow.set_decay(0.0);
        bow.note_on(0, 55, 1.0);
        assert_eq!(bow.decay_gain(), 0.0);
    }

    #[test]
    fn longer_decay_keeps_more_gain() {
        let (mut bow, _pool) = bow_with_lines();
        bow.set_decay(100.0);
        bow.note_on(0, 55, 1.0);
        let short = bow.decay_gain();
        bow.set_decay(2000.0);
        bow.note_on(0, 55, 1.0);
        assert!(bow.decay_gain() > short);
        assert!(bow.decay_gain() <= MAX_DECAY_GAIN);
    }
}
