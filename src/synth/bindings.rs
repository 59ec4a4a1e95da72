//! Parameter slot → voice setter bindings.
//!
//! Every [`ParamDesc`] slot gets one plain `fn(&mut InstrumentBank)` that
//! reads the parameter's current value and pushes it into every voice of
//! its family. They run on the audio thread, between blocks, from
//! [`ThreadSafeCallback::handle_dirty_callbacks`].
//!
//! [`ParamDesc`]: crate::params::ParamDesc
//! [`ThreadSafeCallback::handle_dirty_callbacks`]: crate::params::ThreadSafeCallback::handle_dirty_callbacks

use crate::dsp::note::{db_to_gain, KeyTracking};
use crate::params::{CallbackTable, SynthParams};
use crate::synth::engine::InstrumentBank;
use crate::voices::{TremoloMode, VibratoMode};

macro_rules! bind {
    ($table:ident, $params:ident, $group:ident . $param:ident => $family:ident . $setter:ident, $read:ident) => {
        $table.bind($params.$group.$param.slot(), |bank: &mut InstrumentBank| {
            let value = bank.params.$group.$param.$read();
            for voice in bank.$family.voices_mut() {
                voice.$setter(value);
            }
        });
    };
    ($table:ident, $params:ident, $group:ident . $param:ident => $family:ident . $setter:ident) => {
        bind!($table, $params, $group.$param => $family.$setter, get_float);
    };
}

fn tracking(in_low: i32, in_high: i32, out_low: i32, out_high: i32) -> KeyTracking {
    KeyTracking::new(in_low as f32, in_high as f32, out_low as f32, out_high as f32)
}

fn string_loss_tracking(bank: &mut InstrumentBank) {
    let p = &bank.params.string;
    let map = tracking(
        p.loss_in_low.get_int(),
        p.loss_in_high.get_int(),
        p.loss_out_low.get_int(),
        p.loss_out_high.get_int(),
    );
    for voice in bank.string.voices_mut() {
        voice.set_loss_tracking(map);
    }
}

fn string_exciter_tracking(bank: &mut InstrumentBank) {
    let p = &bank.params.string;
    let map = tracking(
        p.exciter_in_low.get_int(),
        p.exciter_in_high.get_int(),
        p.exciter_out_low.get_int(),
        p.exciter_out_high.get_int(),
    );
    for voice in bank.string.voices_mut() {
        voice.set_exciter_tracking(map);
    }
}

fn bow_loss_tracking(bank: &mut InstrumentBank) {
    let p = &bank.params.bow;
    let map = tracking(
        p.loss_in_low.get_int(),
        p.loss_in_high.get_int(),
        p.loss_out_low.get_int(),
        p.loss_out_high.get_int(),
    );
    for voice in bank.bowed.voices_mut() {
        voice.set_loss_tracking(map);
    }
}

fn bind_string(table: &mut CallbackTable<InstrumentBank>, params: &SynthParams) {
    bind!(table, params, string.decay => string.set_decay);
    bind!(table, params, string.exciter_faster => string.set_exciter_faster, get_bool);
    bind!(table, params, string.dispersion => string.set_dispersion);
    bind!(table, params, string.position => string.set_position);
    bind!(table, params, string.color => string.set_color);
    bind!(table, params, string.loss_faster => string.set_loss_faster, get_bool);
    bind!(table, params, string.vibrate_depth => string.set_vibrate_depth);
    bind!(table, params, string.position_add => string.set_position_add);

    let s = &params.string;
    for param in [&s.loss_in_low, &s.loss_in_high, &s.loss_out_low, &s.loss_out_high] {
        table.bind(param.slot(), string_loss_tracking);
    }
    for param in [
        &s.exciter_in_low,
        &s.exciter_in_high,
        &s.exciter_out_low,
        &s.exciter_out_high,
    ] {
        table.bind(param.slot(), string_exciter_tracking);
    }
}

fn bind_reed(table: &mut CallbackTable<InstrumentBank>, params: &SynthParams) {
    bind!(table, params, reed.inhaling => reed.set_inhaling);
    bind!(table, params, reed.active => reed.set_active);
    bind!(table, params, reed.blend => reed.set_blend);
    bind!(table, params, reed.blend_add => reed.set_blend_add);
    bind!(table, params, reed.noise_gain => reed.set_noise_gain);
    bind!(table, params, reed.loss_gain => reed.set_loss_gain);
    bind!(table, params, reed.loop_gain_add => reed.set_loop_gain_add);
    bind!(table, params, reed.attack => reed.set_attack);
    bind!(table, params, reed.release => reed.set_release);
    bind!(table, params, reed.air_gain => reed.set_air_gain);
    bind!(table, params, reed.loss_lp => reed.set_loss_lp);
    bind!(table, params, reed.loss_hp => reed.set_loss_hp);
    bind!(table, params, reed.loss_faster => reed.set_loss_faster, get_bool);
    bind!(table, params, reed.vibrato_depth => reed.set_vibrato_depth);
    bind!(table, params, reed.vibrato_rate => reed.set_vibrato_rate);
    bind!(table, params, reed.vibrato_attack => reed.set_vibrato_attack);
    bind!(table, params, reed.tremolo_depth => reed.set_tremolo_depth);
    bind!(table, params, reed.tremolo_rate => reed.set_tremolo_rate);
    bind!(table, params, reed.tremolo_attack => reed.set_tremolo_attack);

    table.bind(params.reed.vibrato_mode.slot(), |bank: &mut InstrumentBank| {
        let mode = VibratoMode::from_index(bank.params.reed.vibrato_mode.get_enum());
        for voice in bank.reed.voices_mut() {
            voice.set_vibrato_mode(mode);
        }
    });
    table.bind(params.reed.tremolo_mode.slot(), |bank: &mut InstrumentBank| {
        let mode = TremoloMode::from_index(bank.params.reed.tremolo_mode.get_enum());
        for voice in bank.reed.voices_mut() {
            voice.set_tremolo_mode(mode);
        }
    });
}

fn bind_bow(table: &mut CallbackTable<InstrumentBank>, params: &SynthParams) {
    bind!(table, params, bow.position => bowed.set_position);
    bind!(table, params, bow.speed => bowed.set_speed);
    bind!(table, params, bow.offset => bowed.set_table_offset);
    bind!(table, params, bow.slope => bowed.set_table_slope);
    bind!(table, params, bow.reflect_min => bowed.set_table_min);
    bind!(table, params, bow.reflect_max => bowed.set_table_max);
    bind!(table, params, bow.decay => bowed.set_decay);
    bind!(table, params, bow.loss_faster => bowed.set_loss_faster, get_bool);
    bind!(table, params, bow.noise => bowed.set_noise);
    bind!(table, params, bow.noise_lp => bowed.set_noise_lp);
    bind!(table, params, bow.vibrato_depth => bowed.set_vibrato_depth);
    bind!(table, params, bow.vibrato_rate => bowed.set_vibrato_rate);
    bind!(table, params, bow.vibrato_attack => bowed.set_vibrato_attack);
    bind!(table, params, bow.tremolo_depth => bowed.set_tremolo_depth);
    bind!(table, params, bow.tremolo_rate => bowed.set_tremolo_rate);
    bind!(table, params, bow.tremolo_attack => bowed.set_tremolo_attack);
    bind!(table, params, bow.attack => bowed.set_attack);
    bind!(table, params, bow.release => bowed.set_release);

    table.bind(params.bow.vibrato_mode.slot(), |bank: &mut InstrumentBank| {
        let mode = VibratoMode::from_index(bank.params.bow.vibrato_mode.get_enum());
        for voice in bank.bowed.voices_mut() {
            voice.set_vibrato_mode(mode);
        }
    });
    table.bind(params.bow.tremolo_mode.slot(), |bank: &mut InstrumentBank| {
        let mode = TremoloMode::from_index(bank.params.bow.tremolo_mode.get_enum());
        for voice in bank.bowed.voices_mut() {
            voice.set_tremolo_mode(mode);
        }
    });

    let b = &params.bow;
    for param in [&b.loss_in_low, &b.loss_in_high, &b.loss_out_low, &b.loss_out_high] {
        table.bind(param.slot(), bow_loss_tracking);
    }
}

fn bind_global(table: &mut CallbackTable<InstrumentBank>, params: &SynthParams) {
    table.bind(params.global.volume.slot(), |bank: &mut InstrumentBank| {
        bank.output_gain = db_to_gain(bank.params.global.volume.get_float());
    });
    table.bind(params.global.pitch_bend_range.slot(), |bank: &mut InstrumentBank| {
        let range = bank.params.global.pitch_bend_range.get_float();
        for voice in bank.string.voices_mut() {
            voice.set_bend_range(range);
        }
        for voice in bank.reed.voices_mut() {
            voice.set_bend_range(range);
        }
        for voice in bank.bowed.voices_mut() {
            voice.set_bend_range(range);
        }
    });
}

/// Bind a callback to every slot of `params`.
pub fn bind_all(table: &mut CallbackTable<InstrumentBank>, params: &SynthParams) {
    bind_string(table, params);
    bind_reed(table, params);
    bind_bow(table, params);
    bind_global(table, params);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn bank() -> (InstrumentBank, CallbackTable<InstrumentBank>) {
        let params = Arc::new(SynthParams::new());
        let mut table = CallbackTable::new();
        bind_all(&mut table, &params);
        (InstrumentBank::new(params, 48_000.0), table)
    }

    #[test]
    fn every_slot_is_bound() {
        let (bank, table) = bank();
        assert_eq!(table.bound_count(), bank.params.len());
        for param in bank.params.all() {
            assert!(table.is_bound(param.slot()), "{} has no callback", param.name());
        }
    }

    #[test]
    fn mark_all_fires_each_binding_once() {
        let (mut bank, table) = bank();
        let callbacks = Arc::clone(bank.params.callbacks());
        callbacks.mark_all();
        let fired = callbacks.handle_dirty_callbacks(&table, &mut bank);
        assert_eq!(fired, bank.params.len());
        assert_eq!(callbacks.handle_dirty_callbacks(&table, &mut bank), 0);
    }

    #[test]
    fn volume_reaches_output_gain() {
        let (mut bank, table) = bank();
        let callbacks = Arc::clone(bank.params.callbacks());
        bank.params.global.volume.set_float(0.0);
        callbacks.handle_dirty_callbacks(&table, &mut bank);
        assert!((bank.output_gain - 1.0).abs() < 1e-6);
    }

    #[test]
    fn reed_loss_gain_reaches_every_voice() {
        let (mut bank, table) = bank();
        let callbacks = Arc::clone(bank.params.callbacks());
        let before: Vec<f32> = bank.reed.voices().iter().map(|v| v.real_decay()).collect();
        bank.params.reed.loss_gain.set_float(-0.5);
        callbacks.handle_dirty_callbacks(&table, &mut bank);
        for (voice, old) in bank.reed.voices().iter().zip(before) {
            assert!(voice.real_decay().abs() < old.abs(), "loss gain not applied");
        }
    }
}
