//! ParametricTriangle: a four-segment triangle-like wave with three symmetry biases.
//!
//! One cycle is split into four linear segments:
//!
//! - A : rise from 0 to 1
//! - B : fall from 1 to 0
//! - C : fall from 0 to -1
//! - D : rise from -1 to 0
//!
//! Each bias in (-1, 1) breaks exactly one symmetry of the plain triangle and
//! leaves the other two alone:
//!
//! - `up_bias`  : upward vs. downward slopes (A+D vs. B+C)
//! - `pos_bias` : positive vs. negative half (A+B vs. C+D)
//! - `amp_bias` : moving away from zero vs. towards it (A+C vs. B+D)
//!
//! The wave is rendered at 4x the output rate and box-averaged down, which tames
//! the worst of the aliasing from the sharp corners.

use pieceworks_core::dsp::{clamp, finite_or_zero};

use crate::error::{EngineError, ParamError};
use crate::graph::{validate_sample_rate, Generator};
use crate::params::{expect_number, name_matches, unknown, ParamValue};

/// Subsamples rendered per output sample.
pub const OVERSAMPLE: usize = 4;

/// Smallest share of a cycle any segment may take.
pub const MIN_WIDTH: f64 = 0.005;

/// Biases are clamped into `[-MAX_BIAS, MAX_BIAS]`.
pub const MAX_BIAS: f64 = 0.999;

pub const PARAMS: &[&str] = &["freq", "amp", "up_bias", "pos_bias", "amp_bias"];

/// Share of one cycle taken by each segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentWidths {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl SegmentWidths {
    /// Widths for the given biases. Biases are clamped to `±MAX_BIAS`.
    ///
    /// The result sums to 1 and every segment is at least [`MIN_WIDTH`], so a
    /// cycle never skips over a zero crossing.
    pub fn from_biases(up: f64, pos: f64, amp: f64) -> Self {
        let up = clamp(finite_or_zero(up), -MAX_BIAS, MAX_BIAS);
        let pos = clamp(finite_or_zero(pos), -MAX_BIAS, MAX_BIAS);
        let amp = clamp(finite_or_zero(amp), -MAX_BIAS, MAX_BIAS);

        let mut w = [
            (1.0 + up) * (1.0 + pos) * (1.0 + amp),
            (1.0 - up) * (1.0 + pos) * (1.0 - amp),
            (1.0 - up) * (1.0 - pos) * (1.0 + amp),
            (1.0 + up) * (1.0 - pos) * (1.0 - amp),
        ];
        let total: f64 = w.iter().sum();
        for x in &mut w {
            *x /= total;
        }

        // Pin undersized segments to the floor and scale the rest to fill what's
        // left. Each pass pins at least one more segment, so this ends within 4.
        let mut pinned = [false; 4];
        for _ in 0..4 {
            let mut changed = false;
            for (x, p) in w.iter_mut().zip(pinned.iter_mut()) {
                if !*p && *x < MIN_WIDTH {
                    *x = MIN_WIDTH;
                    *p = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            let fixed = MIN_WIDTH * pinned.iter().filter(|p| **p).count() as f64;
            let free: f64 = w.iter().zip(&pinned).filter(|(_, p)| !**p).map(|(x, _)| *x).sum();
            if free > 0.0 {
                let scale = (1.0 - fixed) / free;
                for (x, p) in w.iter_mut().zip(&pinned) {
                    if !*p {
                        *x *= scale;
                    }
                }
            }
        }

        Self { a: w[0], b: w[1], c: w[2], d: w[3] }
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.a + self.b + self.c + self.d
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.a.min(self.b).min(self.c).min(self.d)
    }
}

impl Default for SegmentWidths {
    fn default() -> Self {
        Self { a: 0.25, b: 0.25, c: 0.25, d: 0.25 }
    }
}

#[derive(Clone, Debug)]
pub struct ParametricTriangle {
    sr: f64,
    // internal (oversampled) rate
    sub_sr: f64,
    freq: f64,
    amp: f64,
    up_bias: f64,
    pos_bias: f64,
    amp_bias: f64,

    // derived
    idx_rate: f64,
    widths: SegmentWidths,
    idx_b: f64,
    idx_c: f64,
    idx_d: f64,

    dirty: bool,
    /// Position within the cycle, [0, 1].
    idx: f64,
}

impl ParametricTriangle {
    pub fn new(sample_rate: f64) -> Result<Self, EngineError> {
        let sr = validate_sample_rate(sample_rate)?;
        let mut tri = Self {
            sr,
            sub_sr: sr * OVERSAMPLE as f64,
            freq: 440.0,
            amp: 0.75,
            up_bias: 0.0,
            pos_bias: 0.0,
            amp_bias: 0.0,
            idx_rate: 0.0,
            widths: SegmentWidths::default(),
            idx_b: 0.0,
            idx_c: 0.0,
            idx_d: 0.0,
            dirty: false,
            idx: 0.0,
        };
        tri.recalc();
        Ok(tri)
    }

    /// Frequency in Hz, clamped to `[0, sample_rate/2]`. Applied at the next cycle.
    pub fn set_freq(&mut self, hz: f64) {
        self.freq = clamp(finite_or_zero(hz), 0.0, self.sr * 0.5);
        self.dirty = true;
    }

    /// Output amplitude, clamped to `[0, 1]`. Applied immediately.
    pub fn set_amp(&mut self, amp: f64) {
        self.amp = clamp(finite_or_zero(amp), 0.0, 1.0);
    }

    pub fn set_up_bias(&mut self, b: f64) {
        self.up_bias = clamp(finite_or_zero(b), -MAX_BIAS, MAX_BIAS);
        self.dirty = true;
    }

    pub fn set_pos_bias(&mut self, b: f64) {
        self.pos_bias = clamp(finite_or_zero(b), -MAX_BIAS, MAX_BIAS);
        self.dirty = true;
    }

    pub fn set_amp_bias(&mut self, b: f64) {
        self.amp_bias = clamp(finite_or_zero(b), -MAX_BIAS, MAX_BIAS);
        self.dirty = true;
    }

    #[inline] pub fn freq(&self) -> f64 { self.freq }
    #[inline] pub fn amp(&self) -> f64 { self.amp }
    #[inline] pub fn widths(&self) -> SegmentWidths { self.widths }
    /// Whether a setter change is still waiting for the next cycle.
    #[inline] pub fn is_dirty(&self) -> bool { self.dirty }

    fn recalc(&mut self) {
        self.idx_rate = self.freq / self.sub_sr;
        self.widths = SegmentWidths::from_biases(self.up_bias, self.pos_bias, self.amp_bias);
        self.idx_b = self.widths.a;
        self.idx_c = self.idx_b + self.widths.b;
        self.idx_d = self.idx_c + self.widths.c;
        self.dirty = false;
    }

    #[inline]
    fn shape(&self, idx: f64) -> f64 {
        let w = &self.widths;
        if idx < self.idx_b {
            idx / w.a
        } else if idx < self.idx_c {
            1.0 - (idx - self.idx_b) / w.b
        } else if idx < self.idx_d {
            -(idx - self.idx_c) / w.c
        } else {
            (idx - self.idx_d) / w.d - 1.0
        }
    }
}

impl Generator for ParametricTriangle {
    #[inline]
    fn sample_rate(&self) -> f64 {
        self.sr
    }

    fn next_sample(&mut self) -> f64 {
        // a stopped oscillator never wraps, so take changes right away
        if self.dirty && self.idx_rate == 0.0 {
            self.recalc();
        }

        let mut idx = self.idx;
        let mut acc = 0.0;
        for _ in 0..OVERSAMPLE {
            acc += self.shape(idx);
            idx += self.idx_rate;
            if idx > 1.0 {
                idx %= 1.0;
                if self.dirty {
                    self.recalc();
                }
            }
        }
        self.idx = idx;

        clamp(finite_or_zero(acc / OVERSAMPLE as f64 * self.amp), -1.0, 1.0)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        let setter: fn(&mut Self, f64) = match PARAMS.iter().find(|p| name_matches(name, p)) {
            Some(&"freq") => Self::set_freq,
            Some(&"amp") => Self::set_amp,
            Some(&"up_bias") => Self::set_up_bias,
            Some(&"pos_bias") => Self::set_pos_bias,
            Some(&"amp_bias") => Self::set_amp_bias,
            _ => return Err(unknown(name)),
        };
        setter(self, expect_number(name, value)?);
        Ok(())
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }
}
