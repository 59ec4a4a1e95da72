// Purpose: voice management, parameter bindings, engine orchestration
// This layer sits above the voices and owns one PolySynth per instrument family

pub mod bindings;
pub mod engine;
pub mod factory;
pub mod message;
pub mod poly;
pub mod voice;

pub use engine::{DownstreamStage, EngineConfig, Instrument, InstrumentBank, Synth};
pub use message::{MessageReceiver, SynthMessage};
pub use poly::PolySynth;
pub use voice::{BlockCtx, WaveguideVoice};
