//! Filters: RBJ "Audio-EQ-Cookbook" biquads.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Coefficient computation is a pure function of `(kind, f0, q, sr)`
//! - Stable for every parameter the setters let through
//!
//! Contents
//! - `BiquadKind`   : LP/HP/BP/Notch responses
//! - `BiquadCoeffs` : normalized direct-form coefficients
//! - `Biquad`       : direct form I state (two inputs, two outputs of history)
//!
//! Notes
//! - Band-pass is the "constant skirt gain" variant (`b0 = Q·alpha`), so the peak
//!   gain grows with Q.
//! - Q is floored at [`MIN_Q`]; `alpha = sin(w0)/(2Q)` would otherwise blow up.

use crate::dsp::{kill_denormals, sin_cos, TAU};

/// Smallest Q the filters accept.
pub const MIN_Q: f64 = 0.0001;

/// Filter response selection.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BiquadKind {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

impl BiquadKind {
    /// Parse a response name. Accepts `band-pass`, `band_pass`, `bandpass` (and so on),
    /// case-insensitively. Returns `None` for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        let mut key = [0u8; 16];
        let mut len = 0;
        for b in name.bytes() {
            if b == b'-' || b == b'_' || b == b' ' {
                continue;
            }
            if len == key.len() {
                return None;
            }
            key[len] = b.to_ascii_lowercase();
            len += 1;
        }
        match &key[..len] {
            b"lowpass" | b"lp" => Some(Self::Lowpass),
            b"highpass" | b"hp" => Some(Self::Highpass),
            b"bandpass" | b"bp" => Some(Self::Bandpass),
            b"notch" | b"bandstop" => Some(Self::Notch),
            _ => None,
        }
    }

    /// Canonical hyphenated name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Lowpass => "low-pass",
            Self::Highpass => "high-pass",
            Self::Bandpass => "band-pass",
            Self::Notch => "notch",
        }
    }
}

/// Normalized biquad coefficients, named after the history element they weight:
///
/// `y0 = x0·x0 + x1·x1 + x2·x2 + y1·y1 + y2·y2`
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BiquadCoeffs {
    pub x0: f64,
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

impl BiquadCoeffs {
    /// All-zero coefficients: the filter outputs silence.
    pub const SILENT: Self = Self { x0: 0.0, x1: 0.0, x2: 0.0, y1: 0.0, y2: 0.0 };

    /// Cookbook coefficients for `kind` at `f0` Hz with quality `q`.
    ///
    /// `q` is floored at [`MIN_Q`]. A non-positive sample rate yields [`Self::SILENT`].
    pub fn compute(kind: BiquadKind, f0: f64, q: f64, sr: f64) -> Self {
        if sr.is_nan() || sr <= 0.0 || !f0.is_finite() {
            return Self::SILENT;
        }
        let q = if q > MIN_Q { q } else { MIN_Q };
        let w0 = TAU * f0 / sr;
        let (sin_w0, cos_w0) = sin_cos(w0);
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2) = match kind {
            BiquadKind::Lowpass => {
                let b = (1.0 - cos_w0) * 0.5;
                (b, 1.0 - cos_w0, b)
            }
            BiquadKind::Highpass => {
                let b = (1.0 + cos_w0) * 0.5;
                (b, -(1.0 + cos_w0), b)
            }
            BiquadKind::Bandpass => (q * alpha, 0.0, -q * alpha),
            BiquadKind::Notch => (1.0, -2.0 * cos_w0, 1.0),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        if a0 == 0.0 {
            return Self::SILENT;
        }
        Self {
            x0: b0 / a0,
            x1: b1 / a0,
            x2: b2 / a0,
            y1: -a1 / a0,
            y2: -a2 / a0,
        }
    }
}

/// Direct form I biquad.
#[derive(Copy, Clone, Debug, Default)]
pub struct Biquad {
    co: BiquadCoeffs,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    #[inline]
    pub fn new(co: BiquadCoeffs) -> Self {
        Self { co, ..Self::default() }
    }

    /// Swap in new coefficients, keeping the delay history.
    #[inline]
    pub fn set_coeffs(&mut self, co: BiquadCoeffs) {
        self.co = co;
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.co
    }

    /// Clear the delay history.
    #[inline]
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Process one sample.
    ///
    /// If the recursion ever produces a non-finite value the history is cleared and
    /// 0.0 is returned.
    #[inline]
    pub fn process(&mut self, x0: f64) -> f64 {
        let c = &self.co;
        let y0 = c.x0 * x0 + c.x1 * self.x1 + c.x2 * self.x2 + c.y1 * self.y1 + c.y2 * self.y2;
        if !y0.is_finite() {
            self.reset();
            return 0.0;
        }
        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = kill_denormals(y0);
        y0
    }
}

// ------------------------------------ Tests --------------------------------------
