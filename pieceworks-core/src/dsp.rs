//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Clean, side-effect free helpers that are easy to test
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Everything works in `f64`; generators hand out `f64` samples.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f64::consts::PI;

use cfg_if::cfg_if;
use num_traits::Float;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // libm (C math) in no_std
    if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_sin(x: f64) -> f64 { libm::sin(x) }
        #[inline] pub(crate) fn m_cos(x: f64) -> f64 { libm::cos(x) }
        #[inline] pub(crate) fn m_exp(x: f64) -> f64 { libm::exp(x) }
        #[inline] pub(crate) fn m_ln(x: f64) -> f64 { libm::log(x) }
        #[inline] pub(crate) fn m_sqrt(x: f64) -> f64 { libm::sqrt(x) }
        #[inline] pub(crate) fn m_pow(x: f64, y: f64) -> f64 { libm::pow(x, y) }
        #[inline] pub(crate) fn m_floor(x: f64) -> f64 { libm::floor(x) }
        #[inline] pub(crate) fn m_trunc(x: f64) -> f64 { libm::trunc(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_sin(x: f64) -> f64 { x.sin() }
        #[inline] pub(crate) fn m_cos(x: f64) -> f64 { x.cos() }
        #[inline] pub(crate) fn m_exp(x: f64) -> f64 { x.exp() }
        #[inline] pub(crate) fn m_ln(x: f64) -> f64 { x.ln() }
        #[inline] pub(crate) fn m_sqrt(x: f64) -> f64 { x.sqrt() }
        #[inline] pub(crate) fn m_pow(x: f64, y: f64) -> f64 { x.powf(y) }
        #[inline] pub(crate) fn m_floor(x: f64) -> f64 { x.floor() }
        #[inline] pub(crate) fn m_trunc(x: f64) -> f64 { x.trunc() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f64 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f64 = 1.0e-30;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Fractional part, always in [0, 1) (also for negative input).
#[inline]
pub fn fract01(x: f64) -> f64 {
    let f = x - m_floor(x);
    if f >= 1.0 { 0.0 } else { f }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f64) -> f64 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

/// Replace NaN/±Inf with zero. Generic so block helpers can share it.
#[inline]
pub fn finite_or_zero<T: Float>(x: T) -> T {
    if x.is_finite() { x } else { T::zero() }
}

/// Quantize towards zero onto a grid of `1/steps`: `trunc(x * steps) / steps`.
#[inline]
pub fn quantize(x: f64, steps: f64) -> f64 {
    m_trunc(x * steps) / steps
}

/// `base^exp` through the selected backend.
#[inline]
pub fn pow(base: f64, exp: f64) -> f64 {
    m_pow(base, exp)
}

/// Natural log through the selected backend.
#[inline]
pub fn ln(x: f64) -> f64 {
    m_ln(x)
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f64) -> f64 {
    if db <= -300.0 { 0.0 } else { m_exp(0.11512925464970229_f64 * db) } // ln(10)/20
}

/// Convert linear gain to dB: db = 20*log10(lin). Non-positive input maps to -inf.
#[inline]
pub fn lin_to_db(lin: f64) -> f64 {
    if lin <= 0.0 { f64::NEG_INFINITY }
    else { 8.685889638065036553_f64 * m_ln(lin) } // 20/ln(10)
}

// --------------------------------- Curves ----------------------------------------

/// First-quadrant sine easing: `sin(t * π/2)` for `t` clamped into [0, 1].
///
/// Starts with full slope and flattens into 1.0, so a ramp built on it leaves its
/// start point promptly and settles into the target without a corner.
#[inline]
pub fn sine_ease(t: f64) -> f64 {
    m_sin(clamp(t, 0.0, 1.0) * PI * 0.5)
}

// --------------------------------- Windows ---------------------------------------

/// Classic Blackman window coefficient (`a = 0.16`) for sample `i` of `n`.
#[inline]
pub fn blackman(i: usize, n: usize) -> f64 {
    if n <= 1 {
        return 1.0;
    }
    let a = 0.16;
    let a0 = 0.5 * (1.0 - a);
    let a1 = 0.5;
    let a2 = 0.5 * a;
    let x = i as f64 / n as f64;
    a0 - a1 * m_cos(TAU * x) + a2 * m_cos(2.0 * TAU * x)
}

// --------------------------------- Simple meters ---------------------------------

/// Peak absolute value of a block (0.0 for an empty block).
#[inline]
pub fn peak(block: &[f64]) -> f64 {
    block.iter().fold(0.0, |acc, s| acc.max(s.abs()))
}

/// RMS of a block (0.0 for an empty block).
#[inline]
pub fn rms(block: &[f64]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f64 = block.iter().map(|s| s * s).sum();
    m_sqrt(sum / block.len() as f64)
}

/// Expose the backend sine/cosine for modules in this crate.
#[inline]
pub(crate) fn sin_cos(x: f64) -> (f64, f64) {
    (m_sin(x), m_cos(x))
}

// --------------------------------- Tests (std only) ------------------------------
