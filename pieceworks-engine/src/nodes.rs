//! Building blocks shared by the pieces.
//!
//! Contents:
//! - `Waveform` : closed set of periodic shapes, each a pure function of phase
//! - `piece_rng`: the random source a piece draws from (seeded or from entropy)
//!
//! Notes:
//! - Phase is measured in **cycles**: `1.0` is one full period. Only the
//!   fractional part matters.

use core::fmt;

use pieceworks_core::dsp::{fract01, TAU};
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    #[default]
    Triangle,
    Sawtooth,
    Square,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [Self::Sine, Self::Triangle, Self::Sawtooth, Self::Square];

    /// Sample the shape at `phase` cycles. Triangle and sawtooth start at 0.
    #[inline]
    pub fn sample(self, phase: f64) -> f64 {
        match self {
            Self::Sine => (TAU * phase).sin(),
            Self::Triangle => {
                let x = fract01(phase + 0.25);
                if x < 0.5 { 4.0 * x - 1.0 } else { 1.0 - 4.0 * (x - 0.5) }
            }
            Self::Sawtooth => 2.0 * fract01(phase + 0.5) - 1.0,
            Self::Square => {
                if fract01(phase) < 0.5 { -1.0 } else { 1.0 }
            }
        }
    }

    /// Look a waveform up by name (case-insensitive). `None` if unknown.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|w| w.name().eq_ignore_ascii_case(name)).or_else(|| {
            match name.to_ascii_lowercase().as_str() {
                "sin" => Some(Self::Sine),
                "tri" => Some(Self::Triangle),
                "saw" => Some(Self::Sawtooth),
                "sq" | "pulse" => Some(Self::Square),
                _ => None,
            }
        })
    }

    /// Like [`Waveform::parse`], falling back to the default (triangle).
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Triangle => "triangle",
            Self::Sawtooth => "sawtooth",
            Self::Square => "square",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Random source for a piece: reproducible when `seed` is given.
pub fn piece_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(s) => SmallRng::seed_from_u64(s),
        None => SmallRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn triangle_and_saw_start_at_zero() {
        assert_abs_diff_eq!(Waveform::Triangle.sample(0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Waveform::Sawtooth.sample(0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Waveform::Sine.sample(0.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn triangle_hits_its_corners() {
        assert_abs_diff_eq!(Waveform::Triangle.sample(0.25), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Waveform::Triangle.sample(0.5), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Waveform::Triangle.sample(0.75), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn square_flips_at_half_cycle() {
        assert_eq!(Waveform::Square.sample(0.1), -1.0);
        assert_eq!(Waveform::Square.sample(0.6), 1.0);
        assert_eq!(Waveform::Square.sample(1.1), -1.0);
    }

    #[test]
    fn shapes_stay_in_unit_range() {
        for w in Waveform::ALL {
            for i in 0..1000 {
                let v = w.sample(i as f64 * 0.0137 - 3.0);
                assert!((-1.0..=1.0).contains(&v), "{w} at {i}: {v}");
            }
        }
    }

    #[test]
    fn parse_names_and_fallback() {
        assert_eq!(Waveform::parse("Sine"), Some(Waveform::Sine));
        assert_eq!(Waveform::parse("sawtooth"), Some(Waveform::Sawtooth));
        assert_eq!(Waveform::parse("saw"), Some(Waveform::Sawtooth));
        assert_eq!(Waveform::parse("wobble"), None);
        assert_eq!(Waveform::parse_or_default("wobble"), Waveform::Triangle);
    }

    #[test]
    fn seeded_rngs_repeat() {
        use rand::Rng;
        let a: u64 = piece_rng(Some(7)).gen();
        let b: u64 = piece_rng(Some(7)).gen();
        assert_eq!(a, b);
    }
}
