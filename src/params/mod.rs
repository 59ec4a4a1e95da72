//! Parameter surface shared between the control and audio threads.
//!
//! Control code writes through [`ParamDesc`]; the audio thread drains the
//! dirty bits once per block and pushes changed values into the voices.

pub mod callback;
pub mod desc;
pub mod preset;
pub mod synth_params;

pub use callback::{CallbackProxy, CallbackTable, ThreadSafeCallback, NUM_CALLBACKS};
pub use desc::{ParamDesc, ParamKind, FLOAT_SCALE};
pub use preset::{Preset, PresetValue};
pub use synth_params::SynthParams;
