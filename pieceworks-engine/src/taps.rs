//! Visualization taps.
//!
//! The controller pushes every full block of post-gain samples to an
//! [`OscilloscopeSink`] and the analyser's dB magnitudes to a [`HarmonicsSink`].
//! Both calls happen on the audio thread, so implementations must not block or
//! allocate.
//!
//! [`SharedScope`] implements both and lets another thread copy out the latest
//! frame. The audio side only ever `try_lock`s: if a reader holds the lock, that
//! frame is skipped.

use std::sync::{Arc, Mutex, TryLockError};

/// Receives blocks of time-domain samples.
pub trait OscilloscopeSink: Send {
    fn set_buffer(&mut self, samples: &[f64]);
    fn set_sample_rate(&mut self, sample_rate: f64);
}

/// Receives magnitude spectra in dB, with the display range.
pub trait HarmonicsSink: Send {
    fn set_buffer(&mut self, magnitudes_db: &[f64]);
    fn set_min_value(&mut self, db: f64);
    fn set_max_value(&mut self, db: f64);
}

/// Latest visualization state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopeFrame {
    pub samples: Vec<f64>,
    pub magnitudes_db: Vec<f64>,
    pub sample_rate: f64,
    pub min_db: f64,
    pub max_db: f64,
    /// Blocks written so far.
    pub blocks: u64,
}

impl ScopeFrame {
    /// Frequency of the loudest non-DC bin in `magnitudes_db`, assuming it holds
    /// the lower half of an FFT taken at `sample_rate`.
    pub fn peak_frequency(&self) -> Option<f64> {
        let bins = self.magnitudes_db.len();
        if bins < 2 || self.sample_rate <= 0.0 {
            return None;
        }
        let (k, _) = self
            .magnitudes_db
            .iter()
            .enumerate()
            .skip(1)
            .fold((0, f64::NEG_INFINITY), |best, (k, db)| if *db > best.1 { (k, *db) } else { best });
        (k > 0).then(|| k as f64 * self.sample_rate / (2 * bins) as f64)
    }
}

/// Scope/harmonics state shared between the audio thread and a reader.
#[derive(Clone, Debug, Default)]
pub struct SharedScope {
    inner: Arc<Mutex<ScopeFrame>>,
}

impl SharedScope {
    /// Pre-size both buffers so the audio thread never grows them: one tap
    /// block of samples and `fft_size / 2` spectrum bins.
    pub fn with_capacity(block_size: usize, fft_size: usize) -> Self {
        let frame = ScopeFrame {
            samples: Vec::with_capacity(block_size),
            magnitudes_db: Vec::with_capacity(fft_size / 2),
            ..ScopeFrame::default()
        };
        Self { inner: Arc::new(Mutex::new(frame)) }
    }

    /// Copy of the latest frame. `None` if the lock is poisoned.
    pub fn snapshot(&self) -> Option<ScopeFrame> {
        self.inner.lock().ok().map(|f| f.clone())
    }

    fn with_frame(&self, f: impl FnOnce(&mut ScopeFrame)) {
        match self.inner.try_lock() {
            Ok(mut frame) => f(&mut frame),
            Err(TryLockError::WouldBlock | TryLockError::Poisoned(_)) => {}
        }
    }
}

// Writes stay within the capacity reserved in `with_capacity` as long as
// blocks are no larger than the block size it was given.
fn copy_into(dst: &mut Vec<f64>, src: &[f64]) {
    dst.clear();
    dst.extend_from_slice(src);
}

impl OscilloscopeSink for SharedScope {
    fn set_buffer(&mut self, samples: &[f64]) {
        self.with_frame(|f| {
            copy_into(&mut f.samples, samples);
            f.blocks += 1;
        });
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.with_frame(|f| f.sample_rate = sample_rate);
    }
}

impl HarmonicsSink for SharedScope {
    fn set_buffer(&mut self, magnitudes_db: &[f64]) {
        self.with_frame(|f| copy_into(&mut f.magnitudes_db, magnitudes_db));
    }

    fn set_min_value(&mut self, db: f64) {
        self.with_frame(|f| f.min_db = db);
    }

    fn set_max_value(&mut self, db: f64) {
        self.with_frame(|f| f.max_db = db);
    }
}

/// Pick a stable window for drawing: half the block, starting at the first
/// upward zero crossing found in the first half.
///
/// Skips any leading non-negative run, then the negative run after it; the
/// window starts where the signal turns non-negative again. Falls back to the
/// start of the block when no crossing is found early enough.
pub fn trigger_window(samples: &[f64]) -> &[f64] {
    let half = samples.len() / 2;
    let mut base = 0;
    while base < samples.len() && samples[base] >= 0.0 {
        base += 1;
    }
    while base < samples.len() && samples[base] < 0.0 {
        base += 1;
    }
    if base >= half {
        base = 0;
    }
    &samples[base..base + half]
}
