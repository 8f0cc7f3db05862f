//! Realtime generator core.
//!
//! This module defines the `Generator` trait every piece implements and the
//! `AudioContext` that carries the session's sample rate and tap block size.
//!
//! Design goals
//! - No dynamic allocations in the audio thread
//! - The sample rate is fixed for a generator's lifetime and handed in explicitly
//! - Generic over the piece type, so the controller needs no trait objects

use crate::error::{EngineError, ParamError};
use crate::params::ParamValue;

/// Default tap block size (samples per oscilloscope/analyser frame).
pub const DEFAULT_BLOCK_SIZE: usize = 2048;

/// Anything that can generate one sample at a time.
pub trait Generator: Send {
    /// Rate the generator was built for. Never changes.
    fn sample_rate(&self) -> f64;

    /// Generate the next mono sample. Always finite.
    fn next_sample(&mut self) -> f64;

    /// Set a named parameter. Out-of-range numbers are clamped, unknown enum
    /// values fall back to a safe default; only unknown names and wrong value
    /// types are errors.
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError>;

    /// Canonical (`snake_case`) names accepted by [`Generator::set_param`].
    fn param_names(&self) -> &'static [&'static str];

    /// Fill `out` with consecutive samples.
    #[inline]
    fn fill(&mut self, out: &mut [f64]) {
        for s in out.iter_mut() {
            *s = self.next_sample();
        }
    }
}

/// Check that `sr` is usable as a sample rate.
#[inline]
pub fn validate_sample_rate(sr: f64) -> Result<f64, EngineError> {
    if sr.is_finite() && sr > 0.0 {
        Ok(sr)
    } else {
        Err(EngineError::InvalidSampleRate(sr))
    }
}

/// Session-wide audio settings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AudioContext {
    sample_rate: f64,
    block_size: usize,
}

impl AudioContext {
    /// `sample_rate` must be finite and > 0, `block_size` a non-zero power of two.
    pub fn new(sample_rate: f64, block_size: usize) -> Result<Self, EngineError> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        if !block_size.is_power_of_two() {
            return Err(EngineError::InvalidBlockSize(block_size));
        }
        Ok(Self { sample_rate, block_size })
    }

    /// Context with the default block size.
    pub fn with_sample_rate(sample_rate: f64) -> Result<Self, EngineError> {
        Self::new(sample_rate, DEFAULT_BLOCK_SIZE)
    }

    #[inline] pub fn sample_rate(&self) -> f64 { self.sample_rate }
    #[inline] pub fn block_size(&self) -> usize { self.block_size }

    /// Whole number of samples covering `seconds` (negative/NaN → 0).
    #[inline]
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        if seconds.is_finite() && seconds > 0.0 {
            (seconds * self.sample_rate).round() as u64
        } else {
            0
        }
    }
}
