//! Error types for the engine.
//!
//! Only setup can fail hard (`EngineError`). Parameter problems (`ParamError`) are
//! reported to whoever sent the message and never stop sample production.

use thiserror::Error;

use crate::params::Label;

/// Construction/setup failures.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EngineError {
    /// Sample rates must be finite and strictly positive.
    #[error("invalid sample rate {0} (must be finite and > 0)")]
    InvalidSampleRate(f64),

    /// Block sizes must be non-zero powers of two.
    #[error("invalid block size {0} (must be a non-zero power of two)")]
    InvalidBlockSize(usize),

    /// A generator built for one rate was attached to a controller running another.
    #[error("generator runs at {actual} Hz but the controller runs at {expected} Hz")]
    SampleRateMismatch { expected: f64, actual: f64 },
}

/// A parameter message that could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ParamError {
    #[error("unknown parameter `{0}`")]
    Unknown(Label),

    #[error("parameter `{name}` expects {expected}")]
    WrongType { name: Label, expected: &'static str },

    #[error("parameter `{0}` got a non-finite value")]
    NotFinite(Label),

    #[error("label of {len} bytes exceeds the {max}-byte limit")]
    LabelTooLong { len: usize, max: usize },

    #[error("the playback side has gone away")]
    Disconnected,
}
