//! Noise sources.
//!
//! Both sources draw from any [`rand::Rng`], so callers choose between an
//! entropy-seeded generator for playback and a fixed seed for reproducible tests.
//! Neither allocates.

use rand::Rng;

use crate::dsp::{m_ln, m_sqrt};

/// Uniform white noise in [-1, 1).
#[inline]
pub fn white<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>() * 2.0 - 1.0
}

/// Standard normal deviate (mean 0, variance 1) using the Marsaglia polar method.
///
/// Candidate points are drawn uniformly from the square [-1, 1)² until one lands
/// inside the unit circle. The exact centre is rejected too, since it can't be
/// scaled. Expected number of draws per deviate is 4/π ≈ 1.27.
#[inline]
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let v1 = white(rng);
        let v2 = white(rng);
        let s = v1 * v1 + v2 * v2;
        if s > 0.0 && s <= 1.0 {
            return v1 * m_sqrt(-2.0 * m_ln(s) / s);
        }
    }
}
