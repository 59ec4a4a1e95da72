//! The engine's parameter surface.
//!
//! Registration order fixes each parameter's dirty-bit slot, so fields are
//! constructed top to bottom exactly as declared: reed, string, bow, then the
//! globals. Names are stable `"<group>.<name>"` strings used by presets and
//! [`SynthParams::find`].

use std::sync::Arc;

use super::callback::ThreadSafeCallback;
use super::desc::ParamDesc;
use crate::error::{EngineError, EngineResult};
use crate::synth::engine::Instrument;

pub const VIBRATO_MODES: &[&str] = &["auto", "bend_to_depth", "manual"];
pub const TREMOLO_MODES: &[&str] = &["auto", "pressure_to_depth", "manual"];

/// Highest note value the key-tracking maps accept
const TRACKING_MAX: i32 = 139;

pub struct ReedParams {
    pub inhaling: ParamDesc,
    pub active: ParamDesc,
    pub blend: ParamDesc,
    pub noise_gain: ParamDesc,
    pub loss_gain: ParamDesc,
    pub attack: ParamDesc,
    pub release: ParamDesc,
    pub air_gain: ParamDesc,
    pub loss_lp: ParamDesc,
    pub loss_hp: ParamDesc,
    pub loss_faster: ParamDesc,
    pub vibrato_mode: ParamDesc,
    pub vibrato_depth: ParamDesc,
    pub vibrato_rate: ParamDesc,
    pub vibrato_attack: ParamDesc,
    pub tremolo_mode: ParamDesc,
    pub tremolo_depth: ParamDesc,
    pub tremolo_rate: ParamDesc,
    pub tremolo_attack: ParamDesc,
    pub loop_gain_add: ParamDesc,
    pub blend_add: ParamDesc,
}

impl ReedParams {
    fn new(cb: &Arc<ThreadSafeCallback>) -> Self {
        Self {
            inhaling: ParamDesc::float(cb, "reed.inhaling", -2.0, 2.0, 0.01, -0.24, 10),
            active: ParamDesc::float(cb, "reed.active", -2.0, 2.0, 0.01, 0.6, 10),
            blend: ParamDesc::float(cb, "reed.blend", 0.1, 8.0, 0.1, 4.0, 10),
            noise_gain: ParamDesc::float(cb, "reed.noise_gain", 0.0, 1.0, 0.01, 0.3, 10),
            loss_gain: ParamDesc::float(cb, "reed.loss_gain", -1.5, 1.5, 0.01, -1.05, 10),
            attack: ParamDesc::float(cb, "reed.attack", 1.0, 1000.0, 1.0, 3.0, 10),
            release: ParamDesc::float(cb, "reed.release", 1.0, 1000.0, 1.0, 10.0, 10),
            air_gain: ParamDesc::float(cb, "reed.air_gain", -1.0, 1.5, 0.01, 0.55, 10),
            loss_lp: ParamDesc::int(cb, "reed.loss_lp", -24, 24, 13, 12),
            loss_hp: ParamDesc::int(cb, "reed.loss_hp", -24, 24, -12, 12),
            loss_faster: ParamDesc::boolean(cb, "reed.loss_faster", false),
            vibrato_mode: ParamDesc::enumeration(cb, "reed.vibrato_mode", VIBRATO_MODES, 0),
            vibrato_depth: ParamDesc::float(cb, "reed.vibrato_depth", 0.0, 1.0, 0.01, 0.1, 10),
            vibrato_rate: ParamDesc::float(cb, "reed.vibrato_rate", 0.0, 10.0, 0.01, 5.73, 10),
            vibrato_attack: ParamDesc::float(cb, "reed.vibrato_attack", 20.0, 5000.0, 20.0, 5000.0, 10),
            tremolo_mode: ParamDesc::enumeration(cb, "reed.tremolo_mode", TREMOLO_MODES, 0),
            tremolo_depth: ParamDesc::float(cb, "reed.tremolo_depth", 0.0, 1.0, 0.01, 0.1, 10),
            tremolo_rate: ParamDesc::float(cb, "reed.tremolo_rate", 0.0, 10.0, 0.01, 5.73, 10),
            tremolo_attack: ParamDesc::float(cb, "reed.tremolo_attack", 20.0, 5000.0, 20.0, 3000.0, 10),
            loop_gain_add: ParamDesc::float(cb, "reed.loop_gain_add", -1.0, 1.0, 0.01, 0.0, 10),
            blend_add: ParamDesc::float(cb, "reed.blend_add", -8.0, 8.0, 0.05, 0.0, 10),
        }
    }

    pub fn all(&self) -> [&ParamDesc; 21] {
        [
            &self.inhaling,
            &self.active,
            &self.blend,
            &self.noise_gain,
            &self.loss_gain,
            &self.attack,
            &self.release,
            &self.air_gain,
            &self.loss_lp,
            &self.loss_hp,
            &self.loss_faster,
            &self.vibrato_mode,
            &self.vibrato_depth,
            &self.vibrato_rate,
            &self.vibrato_attack,
            &self.tremolo_mode,
            &self.tremolo_depth,
            &self.tremolo_rate,
            &self.tremolo_attack,
            &self.loop_gain_add,
            &self.blend_add,
        ]
    }
}

pub struct StringParams {
    pub decay: ParamDesc,
    pub exciter_faster: ParamDesc,
    pub dispersion: ParamDesc,
    pub position: ParamDesc,
    pub color: ParamDesc,
    pub loss_faster: ParamDesc,
    pub loss_in_low: ParamDesc,
    pub loss_in_high: ParamDesc,
    pub loss_out_low: ParamDesc,
    pub loss_out_high: ParamDesc,
    pub vibrate_depth: ParamDesc,
    pub exciter_in_low: ParamDesc,
    pub exciter_in_high: ParamDesc,
    pub exciter_out_low: ParamDesc,
    pub exciter_out_high: ParamDesc,
    pub position_add: ParamDesc,
}

impl StringParams {
    fn new(cb: &Arc<ThreadSafeCallback>) -> Self {
        Self {
            decay: ParamDesc::float(cb, "string.decay", -6000.0, 6000.0, 25.0, 1000.0, 10),
            exciter_faster: ParamDesc::boolean(cb, "string.exciter_faster", false),
            dispersion: ParamDesc::float(cb, "string.dispersion", 0.0, 0.25, 0.0025, 0.0, 10),
            position: ParamDesc::float(cb, "string.position", 0.0, 0.5, 0.01, 0.13, 10),
            color: ParamDesc::float(cb, "string.color", 0.0, 1.0, 0.01, 0.55, 10),
            loss_faster: ParamDesc::boolean(cb, "string.loss_faster", true),
            loss_in_low: ParamDesc::int(cb, "string.loss_in_low", 0, TRACKING_MAX, 36, 12),
            loss_in_high: ParamDesc::int(cb, "string.loss_in_high", 0, TRACKING_MAX, 100, 12),
            loss_out_low: ParamDesc::int(cb, "string.loss_out_low", 0, TRACKING_MAX, 105, 12),
            loss_out_high: ParamDesc::int(cb, "string.loss_out_high", 0, TRACKING_MAX, 123, 12),
            vibrate_depth: ParamDesc::float(cb, "string.vibrate_depth", 0.0, 1.0, 0.01, 0.1, 10),
            exciter_in_low: ParamDesc::int(cb, "string.exciter_in_low", 0, TRACKING_MAX, 36, 12),
            exciter_in_high: ParamDesc::int(cb, "string.exciter_in_high", 0, TRACKING_MAX, 100, 12),
            exciter_out_low: ParamDesc::int(cb, "string.exciter_out_low", 0, TRACKING_MAX, 105, 12),
            exciter_out_high: ParamDesc::int(cb, "string.exciter_out_high", 0, TRACKING_MAX, 123, 12),
            position_add: ParamDesc::float(cb, "string.position_add", 0.0, 0.25, 0.01, 0.0, 10),
        }
    }

    pub fn all(&self) -> [&ParamDesc; 16] {
        [
            &self.decay,
            &self.exciter_faster,
            &self.dispersion,
            &self.position,
            &self.color,
            &self.loss_faster,
            &self.loss_in_low,
            &self.loss_in_high,
            &self.loss_out_low,
            &self.loss_out_high,
            &self.vibrate_depth,
            &self.exciter_in_low,
            &self.exciter_in_high,
            &self.exciter_out_low,
            &self.exciter_out_high,
            &self.position_add,
        ]
    }
}

pub struct BowParams {
    pub position: ParamDesc,
    pub speed: ParamDesc,
    pub offset: ParamDesc,
    pub slope: ParamDesc,
    pub reflect_min: ParamDesc,
    pub reflect_max: ParamDesc,
    pub decay: ParamDesc,
    pub loss_faster: ParamDesc,
    pub noise: ParamDesc,
    pub noise_lp: ParamDesc,
    pub vibrato_mode: ParamDesc,
    pub vibrato_depth: ParamDesc,
    pub vibrato_rate: ParamDesc,
    pub vibrato_attack: ParamDesc,
    pub tremolo_mode: ParamDesc,
    pub tremolo_depth: ParamDesc,
    pub tremolo_rate: ParamDesc,
    pub tremolo_attack: ParamDesc,
    pub attack: ParamDesc,
    pub release: ParamDesc,
    pub loss_in_low: ParamDesc,
    pub loss_in_high: ParamDesc,
    pub loss_out_low: ParamDesc,
    pub loss_out_high: ParamDesc,
}

impl BowParams {
    fn new(cb: &Arc<ThreadSafeCallback>) -> Self {
        Self {
            position: ParamDesc::float(cb, "bow.position", 0.01, 0.49, 0.01, 0.13, 10),
            speed: ParamDesc::float(cb, "bow.speed", 0.0, 1.0, 0.01, 0.08, 10),
            offset: ParamDesc::float(cb, "bow.offset", -1.0, 1.0, 0.01, 0.03, 10),
            slope: ParamDesc::float(cb, "bow.slope", 0.0, 1.0, 0.01, 0.5, 10),
            reflect_min: ParamDesc::float(cb, "bow.reflect_min", 0.0, 1.0, 0.01, 0.01, 10),
            reflect_max: ParamDesc::float(cb, "bow.reflect_max", 0.0, 1.0, 0.01, 0.98, 10),
            decay: ParamDesc::float(cb, "bow.decay", 0.0, 6000.0, 25.0, 300.0, 10),
            loss_faster: ParamDesc::boolean(cb, "bow.loss_faster", false),
            noise: ParamDesc::float(cb, "bow.noise", 0.0, 0.5, 0.01, 0.03, 10),
            noise_lp: ParamDesc::int(cb, "bow.noise_lp", 0, TRACKING_MAX, 80, 12),
            vibrato_mode: ParamDesc::enumeration(cb, "bow.vibrato_mode", VIBRATO_MODES, 0),
            vibrato_depth: ParamDesc::float(cb, "bow.vibrato_depth", 0.0, 1.0, 0.01, 0.1, 10),
            vibrato_rate: ParamDesc::float(cb, "bow.vibrato_rate", 0.0, 20.0, 0.01, 6.33, 10),
            vibrato_attack: ParamDesc::float(cb, "bow.vibrato_attack", 20.0, 5000.0, 20.0, 1500.0, 10),
            tremolo_mode: ParamDesc::enumeration(cb, "bow.tremolo_mode", TREMOLO_MODES, 0),
            tremolo_depth: ParamDesc::float(cb, "bow.tremolo_depth", 0.0, 1.0, 0.001, 0.01, 10),
            tremolo_rate: ParamDesc::float(cb, "bow.tremolo_rate", 0.0, 20.0, 0.01, 6.57, 10),
            tremolo_attack: ParamDesc::float(cb, "bow.tremolo_attack", 20.0, 5000.0, 20.0, 2000.0, 10),
            attack: ParamDesc::float(cb, "bow.attack", 1.0, 1000.0, 5.0, 5.0, 10),
            release: ParamDesc::float(cb, "bow.release", 1.0, 1000.0, 5.0, 60.0, 10),
            loss_in_low: ParamDesc::int(cb, "bow.loss_in_low", 0, TRACKING_MAX, 48, 12),
            loss_in_high: ParamDesc::int(cb, "bow.loss_in_high", 0, TRACKING_MAX, 100, 12),
            loss_out_low: ParamDesc::int(cb, "bow.loss_out_low", 0, TRACKING_MAX, 105, 12),
            loss_out_high: ParamDesc::int(cb, "bow.loss_out_high", 0, TRACKING_MAX, 123, 12),
        }
    }

    pub fn all(&self) -> [&ParamDesc; 24] {
        [
            &self.position,
            &self.speed,
            &self.offset,
            &self.slope,
            &self.reflect_min,
            &self.reflect_max,
            &self.decay,
            &self.loss_faster,
            &self.noise,
            &self.noise_lp,
            &self.vibrato_mode,
            &self.vibrato_depth,
            &self.vibrato_rate,
            &self.vibrato_attack,
            &self.tremolo_mode,
            &self.tremolo_depth,
            &self.tremolo_rate,
            &self.tremolo_attack,
            &self.attack,
            &self.release,
            &self.loss_in_low,
            &self.loss_in_high,
            &self.loss_out_low,
            &self.loss_out_high,
        ]
    }
}

pub struct GlobalParams {
    /// Output level in dB
    pub volume: ParamDesc,
    /// Semitones covered by a full pitch-bend swing
    pub pitch_bend_range: ParamDesc,
}

impl GlobalParams {
    fn new(cb: &Arc<ThreadSafeCallback>) -> Self {
        Self {
            volume: ParamDesc::float(cb, "global.volume", -60.0, 24.0, 0.5, -12.0, 10),
            pitch_bend_range: ParamDesc::int(cb, "global.pitch_bend_range", 0, 48, 2, 12),
        }
    }

    pub fn all(&self) -> [&ParamDesc; 2] {
        [&self.volume, &self.pitch_bend_range]
    }
}

/// Every parameter of the engine, sharing one dirty-bit table.
pub struct SynthParams {
    callbacks: Arc<ThreadSafeCallback>,
    pub reed: ReedParams,
    pub string: StringParams,
    pub bow: BowParams,
    pub global: GlobalParams,
}

impl SynthParams {
    pub fn new() -> Self {
        let callbacks = Arc::new(ThreadSafeCallback::new());
        let reed = ReedParams::new(&callbacks);
        let string = StringParams::new(&callbacks);
        let bow = BowParams::new(&callbacks);
        let global = GlobalParams::new(&callbacks);
        Self {
            callbacks,
            reed,
            string,
            bow,
            global,
        }
    }

    pub fn callbacks(&self) -> &Arc<ThreadSafeCallback> {
        &self.callbacks
    }

    pub fn all(&self) -> impl Iterator<Item = &ParamDesc> {
        self.reed
            .all()
            .into_iter()
            .chain(self.string.all())
            .chain(self.bow.all())
            .chain(self.global.all())
    }

    /// Parameters of one instrument family.
    pub fn family(&self, instrument: Instrument) -> Vec<&ParamDesc> {
        match instrument {
            Instrument::String => self.string.all().to_vec(),
            Instrument::Reed => self.reed.all().to_vec(),
            Instrument::Bow => self.bow.all().to_vec(),
        }
    }

    pub fn find(&self, name: &str) -> EngineResult<&ParamDesc> {
        self.all()
            .find(|param| param.name() == name)
            .ok_or_else(|| EngineError::UnknownParam(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.callbacks.proxy_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SynthParams {
    fn default() -> Self {
        Self::new()
    }
}
