//! ResonantFilter: uniform white noise through a single RBJ biquad.
//!
//! With a band-pass at high Q this rings like a whistled tone; low-pass and
//! high-pass give colored noise beds. Coefficients are recomputed whenever a
//! filter parameter changes, while the filter history is kept so retuning never
//! clicks.

use pieceworks_core::dsp::{clamp, finite_or_zero};
use pieceworks_core::filters::{Biquad, BiquadCoeffs, BiquadKind, MIN_Q};
use pieceworks_core::noise::white;
use rand::rngs::SmallRng;

use crate::error::{EngineError, ParamError};
use crate::graph::{validate_sample_rate, Generator};
use crate::nodes::piece_rng;
use crate::params::{expect_number, expect_text, name_matches, unknown, ParamValue};

/// Lowest centre frequency, Hz.
pub const MIN_F0: f64 = 1.0;

/// Highest centre frequency as a fraction of the sample rate.
pub const MAX_F0_RATIO: f64 = 0.49;

/// Input and output gains are clamped into `[0, MAX_GAIN]`.
pub const MAX_GAIN: f64 = 10.0;

pub const PARAMS: &[&str] = &["filter_type", "f0", "q", "in_amp", "out_amp"];

#[derive(Clone, Debug)]
pub struct ResonantFilter {
    sr: f64,
    rng: SmallRng,
    kind: BiquadKind,
    f0: f64,
    q: f64,
    in_amp: f64,
    out_amp: f64,
    biquad: Biquad,
}

impl ResonantFilter {
    pub fn new(sample_rate: f64) -> Result<Self, EngineError> {
        Self::build(sample_rate, None)
    }

    pub fn with_seed(sample_rate: f64, seed: u64) -> Result<Self, EngineError> {
        Self::build(sample_rate, Some(seed))
    }

    fn build(sample_rate: f64, seed: Option<u64>) -> Result<Self, EngineError> {
        let sr = validate_sample_rate(sample_rate)?;
        let mut f = Self {
            sr,
            rng: piece_rng(seed),
            kind: BiquadKind::Bandpass,
            f0: 440.0,
            q: 10.0,
            in_amp: 1.0,
            out_amp: 0.5,
            biquad: Biquad::new(BiquadCoeffs::SILENT),
        };
        f.update_coeffs();
        Ok(f)
    }

    pub fn set_kind(&mut self, kind: BiquadKind) {
        self.kind = kind;
        self.update_coeffs();
    }

    /// Centre/corner frequency in Hz, clamped into `[1, 0.49 * sample_rate]`.
    pub fn set_f0(&mut self, hz: f64) {
        self.f0 = clamp(finite_or_zero(hz), MIN_F0, self.sr * MAX_F0_RATIO);
        self.update_coeffs();
    }

    /// Resonance; anything below [`MIN_Q`] (or not finite) is raised to it.
    pub fn set_q(&mut self, q: f64) {
        self.q = finite_or_zero(q).max(MIN_Q);
        self.update_coeffs();
    }

    pub fn set_in_amp(&mut self, amp: f64) {
        self.in_amp = clamp(finite_or_zero(amp), 0.0, MAX_GAIN);
    }

    pub fn set_out_amp(&mut self, amp: f64) {
        self.out_amp = clamp(finite_or_zero(amp), 0.0, MAX_GAIN);
    }

    #[inline] pub fn kind(&self) -> BiquadKind { self.kind }
    #[inline] pub fn f0(&self) -> f64 { self.f0 }
    #[inline] pub fn q(&self) -> f64 { self.q }
    #[inline] pub fn coeffs(&self) -> &BiquadCoeffs { self.biquad.coeffs() }

    fn update_coeffs(&mut self) {
        self.biquad
            .set_coeffs(BiquadCoeffs::compute(self.kind, self.f0, self.q, self.sr));
    }
}

impl Generator for ResonantFilter {
    #[inline]
    fn sample_rate(&self) -> f64 {
        self.sr
    }

    #[inline]
    fn next_sample(&mut self) -> f64 {
        let x0 = white(&mut self.rng) * self.in_amp;
        let y0 = self.biquad.process(x0);
        clamp(finite_or_zero(y0 * self.out_amp), -1.0, 1.0)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        if name_matches(name, "filter_type") || name_matches(name, "type") {
            let label = expect_text(name, value)?;
            self.set_kind(BiquadKind::parse(label.as_str()).unwrap_or_default());
            return Ok(());
        }
        let setter: fn(&mut Self, f64) = if name_matches(name, "f0") || name_matches(name, "freq") {
            Self::set_f0
        } else if name_matches(name, "q") {
            Self::set_q
        } else if name_matches(name, "in_amp") {
            Self::set_in_amp
        } else if name_matches(name, "out_amp") || name_matches(name, "amp") {
            Self::set_out_amp
        } else {
            return Err(unknown(name));
        };
        setter(self, expect_number(name, value)?);
        Ok(())
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }
}
