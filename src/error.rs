//! Engine error types.
//!
//! Only initialization, instrument switching and the parameter surface can
//! fail. The audio path reports trouble through sentinels (`Option`, silence
//! flags) and never returns these.

use thiserror::Error;

/// Errors raised while building or reconfiguring the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The delay-line pool cannot cover every voice of an instrument family
    #[error("delay-line pool exhausted: {requested} lines requested, {available} available")]
    DelayPoolExhausted { requested: usize, available: usize },

    /// Sample rate is zero, negative or not finite
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f32),

    /// Block size is zero or larger than the engine maximum
    #[error("invalid block size: {0}")]
    InvalidBlockSize(usize),

    /// No parameter is registered under this name
    #[error("unknown parameter: {0}")]
    UnknownParam(String),

    /// A parameter was addressed as the wrong kind
    #[error("parameter {name} is not {expected}")]
    ParamKindMismatch { name: String, expected: &'static str },

    /// Instrument tag outside the known families
    #[error("unknown instrument index: {0}")]
    UnknownInstrument(u8),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
