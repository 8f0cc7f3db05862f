//! Frequency analyser with the semantics of a Web Audio `AnalyserNode`.
//!
//! Each analysis takes the most recent `fft_size` samples, applies a Blackman
//! window, runs a forward FFT, scales magnitudes by `1/fft_size`, blends them
//! with the previous frame (`smoothing`), and converts to dB. Only the first
//! `fft_size/2` bins are reported.
//!
//! The FFT plan, the complex buffer and the scratch space are all allocated up
//! front, so [`Analyser::process`] is safe to call from the audio thread.

use std::sync::Arc;

use pieceworks_core::dsp::{blackman, clamp, lin_to_db};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::EngineError;
use crate::graph::validate_sample_rate;

/// Magnitudes below this are reported as this (instead of -inf).
pub const DB_FLOOR: f64 = -300.0;

/// Analyser settings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AnalyserConfig {
    /// Power of two.
    pub fft_size: usize,
    /// Blend factor with the previous frame, in [0, 1).
    pub smoothing: f64,
    /// Display range forwarded to harmonics sinks.
    pub min_db: f64,
    pub max_db: f64,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self { fft_size: 2048, smoothing: 0.1, min_db: -100.0, max_db: -10.0 }
    }
}

pub struct Analyser {
    config: AnalyserConfig,
    sample_rate: f64,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    /// Last `fft_size` input samples, oldest first.
    input: Vec<f64>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    smoothed: Vec<f64>,
    db: Vec<f64>,
}

impl Analyser {
    pub fn new(config: AnalyserConfig, sample_rate: f64) -> Result<Self, EngineError> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        let n = config.fft_size;
        if n < 2 || !n.is_power_of_two() {
            return Err(EngineError::InvalidBlockSize(n));
        }
        let config = AnalyserConfig {
            smoothing: clamp(config.smoothing, 0.0, 0.999),
            ..config
        };

        let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Ok(Self {
            config,
            sample_rate,
            window: (0..n).map(|i| blackman(i, n)).collect(),
            input: vec![0.0; n],
            buffer: vec![Complex::default(); n],
            scratch,
            smoothed: vec![0.0; n / 2],
            db: vec![DB_FLOOR; n / 2],
            fft,
        })
    }

    #[inline] pub fn config(&self) -> &AnalyserConfig { &self.config }
    #[inline] pub fn fft_size(&self) -> usize { self.config.fft_size }
    #[inline] pub fn frequency_bin_count(&self) -> usize { self.config.fft_size / 2 }
    #[inline] pub fn min_db(&self) -> f64 { self.config.min_db }
    #[inline] pub fn max_db(&self) -> f64 { self.config.max_db }

    /// Centre frequency of bin `k`, Hz.
    #[inline]
    pub fn bin_frequency(&self, k: usize) -> f64 {
        k as f64 * self.sample_rate / self.config.fft_size as f64
    }

    /// Append samples to the rolling input window.
    pub fn push(&mut self, samples: &[f64]) {
        let n = self.input.len();
        if samples.len() >= n {
            self.input.copy_from_slice(&samples[samples.len() - n..]);
        } else {
            self.input.rotate_left(samples.len());
            self.input[n - samples.len()..].copy_from_slice(samples);
        }
    }

    /// Analyse the current window and return the dB magnitudes.
    pub fn analyse(&mut self) -> &[f64] {
        for ((c, x), w) in self.buffer.iter_mut().zip(&self.input).zip(&self.window) {
            *c = Complex::new(x * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / self.config.fft_size as f64;
        let tau = self.config.smoothing;
        for ((s, d), c) in self.smoothed.iter_mut().zip(&mut self.db).zip(&self.buffer) {
            let mag = c.norm() * scale;
            let mut next = tau * *s + (1.0 - tau) * mag;
            if !next.is_finite() {
                next = 0.0;
            }
            *s = next;
            *d = lin_to_db(next).max(DB_FLOOR);
        }
        &self.db
    }

    /// `push` then `analyse`.
    pub fn process(&mut self, samples: &[f64]) -> &[f64] {
        self.push(samples);
        self.analyse()
    }

    /// Most recent dB magnitudes.
    #[inline]
    pub fn magnitudes_db(&self) -> &[f64] {
        &self.db
    }

    /// Frequency of the strongest non-DC bin, refined by parabolic interpolation.
    /// `None` until something non-silent has been analysed.
    pub fn dominant_frequency(&self) -> Option<f64> {
        let (k, peak) = self
            .smoothed
            .iter()
            .enumerate()
            .skip(1)
            .fold((0, 0.0), |best, (k, m)| if *m > best.1 { (k, *m) } else { best });
        if k == 0 || peak <= 0.0 {
            return None;
        }
        let mut offset = 0.0;
        if let (Some(l), Some(r)) = (self.smoothed.get(k - 1), self.smoothed.get(k + 1)) {
            let denom = l - 2.0 * peak + r;
            if denom.abs() > f64::EPSILON {
                offset = clamp(0.5 * (l - r) / denom, -0.5, 0.5);
            }
        }
        Some((k as f64 + offset) * self.sample_rate / self.config.fft_size as f64)
    }
}

impl core::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Analyser")
            .field("config", &self.config)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
