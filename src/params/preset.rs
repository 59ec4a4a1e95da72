//! Raw-integer parameter snapshots.
//!
//! A preset stores the stored (scaled) integer of every parameter in one
//! instrument family plus the globals. Restoring goes through
//! [`ParamDesc::set_raw`], so values are re-clamped and the usual dirty-bit
//! path delivers them to the voices on the next block.
//!
//! [`ParamDesc::set_raw`]: super::desc::ParamDesc::set_raw

use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::synth_params::SynthParams;
use crate::synth::engine::Instrument;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PresetValue {
    pub name: String,
    pub raw: i32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub instrument: Instrument,
    pub values: Vec<PresetValue>,
}

impl Preset {
    /// Snapshot the family of `instrument` plus the global parameters.
    pub fn capture(name: impl Into<String>, instrument: Instrument, params: &SynthParams) -> Self {
        let values = params
            .family(instrument)
            .into_iter()
            .chain(params.global.all())
            .map(|param| PresetValue {
                name: param.name().to_string(),
                raw: param.raw(),
            })
            .collect();
        Self {
            name: name.into(),
            instrument,
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|v| v.name == name).map(|v| v.raw)
    }

    /// Write every known value into `params`. Returns how many were applied.
    pub fn apply_values(&self, params: &SynthParams) -> usize {
        let mut applied = 0;
        for value in &self.values {
            match params.find(&value.name) {
                Ok(param) => {
                    param.set_raw(value.raw);
                    applied += 1;
                }
                Err(err) => warn!("preset {}: skipping {}", self.name, err),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_then_apply_restores_values() {
        let params = SynthParams::new();
        params.string.decay.set_float(250.0);
        params.global.volume.set_float(-6.0);
        let preset = Preset::capture("short", Instrument::String, &params);
        assert_eq!(preset.values.len(), 16 + 2);

        params.string.decay.reset();
        params.global.volume.reset();
        assert_eq!(preset.apply_values(&params), 18);
        assert_eq!(params.string.decay.get_float(), 250.0);
        assert_eq!(params.global.volume.get_float(), -6.0);
    }

    #[test]
    fn unknown_entries_are_skipped() {
        let params = SynthParams::new();
        let preset = Preset {
            name: "legacy".into(),
            instrument: Instrument::Reed,
            values: vec![
                PresetValue {
                    name: "reed.blend".into(),
                    raw: 200_000,
                },
                PresetValue {
                    name: "reed.body_type".into(),
                    raw: 3,
                },
            ],
        };
        assert_eq!(preset.apply_values(&params), 1);
        assert_eq!(params.reed.blend.get_float(), 2.0);
    }

    #[test]
    fn out_of_range_raw_values_are_clamped() {
        let params = SynthParams::new();
        let preset = Preset {
            name: "hot".into(),
            instrument: Instrument::Bow,
            values: vec![PresetValue {
                name: "bow.position".into(),
                raw: 9_000_000,
            }],
        };
        preset.apply_values(&params);
        assert!((params.bow.position.get_float() - 0.49).abs() < 1e-6);
    }
}
