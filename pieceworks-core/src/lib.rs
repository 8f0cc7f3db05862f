#![cfg_attr(not(feature = "std"), no_std)]
//! Pieceworks Core — no_std-ready DSP primitives for the pieceworks generators.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use the `libm` math backend
//!
//! Modules
//! - [`dsp`]       : math backend, utils (db/lin, quantize, easing, windows, meters)
//! - [`envelopes`] : sine-curve gain ramp
//! - [`filters`]   : RBJ cookbook biquads
//! - [`noise`]     : uniform and Gaussian noise sources
//!
//! Design
//! - No heap allocations; pure sample-by-sample primitives
//! - Clear separation between math helpers and filter/envelope building blocks
//! - Friendly to real-time targets

pub mod dsp;
pub mod envelopes;
pub mod filters;
pub mod noise;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        clamp, db_to_lin, finite_or_zero, fract01, kill_denormals, lerp, lin_to_db, quantize,
        sine_ease, TAU,
    };
    pub use crate::envelopes::{RampStage, SineRamp};
    pub use crate::filters::{Biquad, BiquadCoeffs, BiquadKind, MIN_Q};
    pub use crate::noise::{gaussian, white};
}
