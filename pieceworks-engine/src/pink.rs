//! PinkNoise: 1/f^alpha noise from Gaussian noise and a fractional-pole IIR filter.
//!
//! The filter is the Kasdin recursion: with `n` poles, the k-th multiplier is
//! `m[k] = (k - alpha/2) * m[k-1] / (k+1)` (starting from 1), and each output is
//! the new Gaussian draw minus the weighted sum of the last `n` outputs. `alpha`
//! of 0 is white, 1 pink, 2 brown.
//!
//! History lives in a fixed-size array, so changing the pole count never touches
//! the allocator.

use pieceworks_core::dsp::{clamp, finite_or_zero, ln};
use pieceworks_core::noise::gaussian;
use rand::rngs::SmallRng;

use crate::error::{EngineError, ParamError};
use crate::graph::{validate_sample_rate, Generator};
use crate::nodes::piece_rng;
use crate::params::{expect_number, name_matches, unknown, ParamValue};

/// Upper bound for the pole count.
pub const MAX_POLES: usize = 64;

/// Warm-up samples run after a pole change, per pole.
pub const WARMUP_PER_POLE: usize = 5;

pub const PARAMS: &[&str] = &["alpha", "poles", "amp"];

#[derive(Clone, Debug)]
pub struct PinkNoise {
    sr: f64,
    rng: SmallRng,
    alpha: f64,
    poles: usize,
    amp: f64,
    /// `amp` times the loudness correction for the current alpha.
    amp_adjusted: f64,
    multipliers: [f64; MAX_POLES],
    history: [f64; MAX_POLES],
    at: usize,
}

impl PinkNoise {
    pub fn new(sample_rate: f64) -> Result<Self, EngineError> {
        Self::build(sample_rate, None)
    }

    pub fn with_seed(sample_rate: f64, seed: u64) -> Result<Self, EngineError> {
        Self::build(sample_rate, Some(seed))
    }

    fn build(sample_rate: f64, seed: Option<u64>) -> Result<Self, EngineError> {
        let sr = validate_sample_rate(sample_rate)?;
        let mut p = Self {
            sr,
            rng: piece_rng(seed),
            alpha: 1.0,
            poles: 5,
            amp: 0.5,
            amp_adjusted: 0.0,
            multipliers: [0.0; MAX_POLES],
            history: [0.0; MAX_POLES],
            at: 0,
        };
        p.calc_multipliers();
        p.calc_amp();
        p.reseed_history();
        Ok(p)
    }

    /// Spectral slope, clamped into `[0, 2]`. History is kept.
    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = clamp(finite_or_zero(alpha), 0.0, 2.0);
        self.calc_multipliers();
        self.calc_amp();
    }

    /// Filter order, clamped into `[1, MAX_POLES]`. A change clears and refills the history.
    pub fn set_poles(&mut self, poles: usize) {
        let poles = poles.clamp(1, MAX_POLES);
        if poles != self.poles {
            self.poles = poles;
            self.calc_multipliers();
            self.reseed_history();
        }
    }

    pub fn set_amp(&mut self, amp: f64) {
        self.amp = finite_or_zero(amp).max(0.0);
        self.calc_amp();
    }

    #[inline] pub fn alpha(&self) -> f64 { self.alpha }
    #[inline] pub fn poles(&self) -> usize { self.poles }
    #[inline] pub fn amp(&self) -> f64 { self.amp }

    /// Current filter history (one value per pole, in storage order).
    #[inline]
    pub fn history(&self) -> &[f64] {
        &self.history[..self.poles]
    }

    #[inline]
    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers[..self.poles]
    }

    fn calc_multipliers(&mut self) {
        let mut a = 1.0;
        for (i, m) in self.multipliers.iter_mut().enumerate().take(self.poles) {
            a = (i as f64 - self.alpha / 2.0) * a / (i as f64 + 1.0);
            *m = a;
        }
    }

    // Empirical: keeps most samples within [-1, 1] across the alpha range.
    fn calc_amp(&mut self) {
        self.amp_adjusted = self.amp * (ln(1.05 + (2.0 - self.alpha)) / 4.5);
    }

    fn reseed_history(&mut self) {
        self.history = [0.0; MAX_POLES];
        self.at = 0;
        for _ in 0..WARMUP_PER_POLE * self.poles {
            self.step();
        }
    }

    /// Advance the filter one step and return the raw (unscaled) value.
    #[inline]
    fn step(&mut self) -> f64 {
        let n = self.poles;
        let mut x = gaussian(&mut self.rng);
        for i in 0..n {
            x -= self.multipliers[i] * self.history[(self.at + i) % n];
        }
        if !x.is_finite() {
            self.history = [0.0; MAX_POLES];
            self.at = 0;
            return 0.0;
        }
        self.at = (self.at + 1) % n;
        self.history[self.at] = x;
        x
    }
}

impl Generator for PinkNoise {
    #[inline]
    fn sample_rate(&self) -> f64 {
        self.sr
    }

    #[inline]
    fn next_sample(&mut self) -> f64 {
        let x = self.step();
        clamp(finite_or_zero(x * self.amp_adjusted), -1.0, 1.0)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        if name_matches(name, "alpha") {
            self.set_alpha(expect_number(name, value)?);
        } else if name_matches(name, "poles") {
            let n = expect_number(name, value)?;
            // negative and fractional counts round into range
            self.set_poles(n.round().max(0.0) as usize);
        } else if name_matches(name, "amp") {
            self.set_amp(expect_number(name, value)?);
        } else {
            return Err(unknown(name));
        }
        Ok(())
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn multipliers_follow_recursion() {
        let p = PinkNoise::with_seed(48_000.0, 1).unwrap();
        // alpha = 1: -0.5, -0.125, -0.0625, ...
        let m = p.multipliers();
        assert_abs_diff_eq!(m[0], -0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(m[1], -0.125, epsilon = 1e-15);
        assert_abs_diff_eq!(m[2], -0.0625, epsilon = 1e-15);
    }

    #[test]
    fn alpha_zero_is_white() {
        let mut p = PinkNoise::with_seed(48_000.0, 1).unwrap();
        p.set_alpha(0.0);
        assert!(p.multipliers().iter().all(|m| *m == 0.0));
    }

    #[test]
    fn warm_up_fills_history() {
        let p = PinkNoise::with_seed(48_000.0, 2).unwrap();
        assert!(p.history().iter().all(|h| *h != 0.0));
    }

    #[test]
    fn pole_change_resets_and_clamps() {
        let mut p = PinkNoise::with_seed(48_000.0, 3).unwrap();
        p.set_param("poles", ParamValue::Number(1_000.0)).unwrap();
        assert_eq!(p.poles(), MAX_POLES);
        assert_eq!(p.history().len(), MAX_POLES);
        p.set_param("poles", ParamValue::Number(-4.0)).unwrap();
        assert_eq!(p.poles(), 1);
    }

    #[test]
    fn same_pole_count_keeps_history() {
        let mut p = PinkNoise::with_seed(48_000.0, 4).unwrap();
        let before = p.history().to_vec();
        p.set_poles(5);
        assert_eq!(p.history(), &before[..]);
    }

    #[test]
    fn non_finite_settings_keep_it_sounding() {
        let mut p = PinkNoise::with_seed(48_000.0, 6).unwrap();
        p.set_alpha(f64::NAN);
        assert_eq!(p.alpha(), 0.0);
        p.set_alpha(f64::INFINITY);
        assert_eq!(p.alpha(), 0.0);
        p.set_amp(f64::NAN);
        assert_eq!(p.amp(), 0.0);
        p.set_amp(0.5);
        let sounding = (0..10_000).filter(|_| p.next_sample() != 0.0).count();
        assert!(sounding > 9_000, "{sounding}");
    }

    #[test]
    fn brown_noise_stays_clamped() {
        let mut p = PinkNoise::with_seed(48_000.0, 5).unwrap();
        p.set_alpha(2.0);
        p.set_poles(64);
        p.set_amp(10.0);
        for _ in 0..20_000 {
            let s = p.next_sample();
            assert!(s.is_finite() && s.abs() <= 1.0);
        }
    }
}
