//! HarmonicTone: two decaying notes drawn from a two-octave pentatonic scale.
//!
//! Every few seconds a new primary note is picked and the previous primary becomes
//! the secondary (played at half level). Between note pairs the output decays
//! geometrically to silence before the new pair starts, which removes the click a
//! hard cut would produce. Samples are quantized to 1/64 steps, giving the piece
//! its shimmering, lo-fi texture.

use pieceworks_core::dsp::{finite_or_zero, pow, quantize};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::error::{EngineError, ParamError};
use crate::graph::{validate_sample_rate, Generator};
use crate::nodes::{piece_rng, Waveform};
use crate::params::{expect_text, name_matches, unknown, ParamValue};

/// Lowest note of the scale, Hz (close to E3).
pub const BASE_FREQ: f64 = 160.0;

/// Fifth root of 1/2: one step of an equal-tempered pentatonic scale.
pub const PENTATONIC_STEP: f64 = 0.870_550_6;

/// Number of scale degrees to pick from (two octaves).
pub const SCALE_DEGREES: u32 = 10;

/// Per-sample decay factor while declicking.
pub const DECLICK_FACTOR: f64 = 0.99;

/// Declicking ends once the output is this close to zero.
pub const DECLICK_FLOOR: f64 = 1e-6;

const QUANT_STEPS: f64 = 64.0;

pub const PARAMS: &[&str] = &["waveform"];

/// What the next call to `next_sample` does.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ToneMode {
    Steady,
    Declick,
}

#[derive(Clone, Debug)]
pub struct HarmonicTone {
    sr: f64,
    rng: SmallRng,
    waveform: Waveform,
    /// Samples it takes a note to lose 10% of its volume.
    decay_rate: f64,
    primary: f64,
    secondary: f64,
    idx: u64,
    dur: u64,
    last: f64,
    mode: ToneMode,
}

impl HarmonicTone {
    pub fn new(sample_rate: f64) -> Result<Self, EngineError> {
        Self::build(sample_rate, None)
    }

    /// Same as [`HarmonicTone::new`] with a reproducible note sequence.
    pub fn with_seed(sample_rate: f64, seed: u64) -> Result<Self, EngineError> {
        Self::build(sample_rate, Some(seed))
    }

    fn build(sample_rate: f64, seed: Option<u64>) -> Result<Self, EngineError> {
        let sr = validate_sample_rate(sample_rate)?;
        let mut tone = Self {
            sr,
            rng: piece_rng(seed),
            waveform: Waveform::Triangle,
            decay_rate: sr / 10.0,
            primary: 0.0,
            secondary: 0.0,
            idx: 0,
            // zero duration: the first call starts a note pair
            dur: 0,
            last: 0.0,
            mode: ToneMode::Steady,
        };
        tone.primary = tone.random_wavelength();
        Ok(tone)
    }

    /// A random wavelength (samples per cycle) from the piece's scale.
    pub fn random_wavelength(&mut self) -> f64 {
        let degree = self.rng.gen_range(0..SCALE_DEGREES);
        (self.sr / BASE_FREQ) * pow(PENTATONIC_STEP, f64::from(degree))
    }

    pub fn set_waveform(&mut self, w: Waveform) {
        self.waveform = w;
    }

    /// End the current note pair; the next call starts a new one.
    pub fn retrigger(&mut self) {
        self.dur = self.idx;
    }

    #[inline] pub fn waveform(&self) -> Waveform { self.waveform }
    #[inline] pub fn mode(&self) -> ToneMode { self.mode }
    #[inline] pub fn primary_wavelength(&self) -> f64 { self.primary }
    #[inline] pub fn secondary_wavelength(&self) -> f64 { self.secondary }
    #[inline] pub fn last_sample(&self) -> f64 { self.last }

    fn start_note_pair(&mut self) {
        self.secondary = self.primary;
        self.primary = self.random_wavelength();
        if self.primary == self.secondary {
            // same note twice: drop an octave instead
            self.primary *= 2.0;
        }
        let secs_x4 = self.rng.gen::<f64>() * 10.0 + 5.0;
        self.dur = (secs_x4 * self.sr / 4.0) as u64;
        self.idx = 0;
        self.mode = ToneMode::Declick;
    }
}

impl Generator for HarmonicTone {
    #[inline]
    fn sample_rate(&self) -> f64 {
        self.sr
    }

    fn next_sample(&mut self) -> f64 {
        if self.mode == ToneMode::Declick {
            self.last *= DECLICK_FACTOR;
            if self.last.abs() <= DECLICK_FLOOR {
                self.mode = ToneMode::Steady;
            }
            return self.last;
        }

        if self.idx >= self.dur {
            self.start_note_pair();
            return self.last;
        }

        let t = self.idx as f64;
        // the small floor keeps a long note from ever going fully silent
        let vol = pow(0.9, t / self.decay_rate) * 0.95 + 0.05;
        let a = self.waveform.sample(t / self.primary) * 0.5;
        let b = self.waveform.sample(t / self.secondary) * 0.25;
        let s = finite_or_zero(quantize(vol * (a + b), QUANT_STEPS));

        self.idx += 1;
        self.last = s;
        s
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        if name_matches(name, "waveform") {
            let w = expect_text(name, value)?;
            self.waveform = Waveform::parse_or_default(w.as_str());
            Ok(())
        } else {
            Err(unknown(name))
        }
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }
}
