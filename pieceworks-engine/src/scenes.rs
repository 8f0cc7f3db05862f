//! The piece catalogue: every generator behind one [`Generator`] type.
//!
//! Pieces are **mono** generators; the CLI duplicates the sample to however many
//! channels the device needs. `Piece` dispatches by `match`, so the controller can
//! stay generic over a single concrete type while the piece is picked at runtime.

use core::fmt;
use std::str::FromStr;

use crate::error::{EngineError, ParamError};
use crate::graph::Generator;
use crate::params::ParamValue;
use crate::pink::{self, PinkNoise};
use crate::resonant::{self, ResonantFilter};
use crate::tone::{self, HarmonicTone};
use crate::triangle::{self, ParametricTriangle};

/// Which piece to build.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Tone,
    Triangle,
    Filter,
    Pink,
}

impl PieceKind {
    pub const ALL: [PieceKind; 4] = [Self::Tone, Self::Triangle, Self::Filter, Self::Pink];

    /// Look a piece up by name or alias (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tone" | "awk" | "harmonic" => Some(Self::Tone),
            "triangle" | "tri" => Some(Self::Triangle),
            "filter" | "resonant" => Some(Self::Filter),
            "pink" | "pink-noise" | "pink_noise" => Some(Self::Pink),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tone => "tone",
            Self::Triangle => "triangle",
            Self::Filter => "filter",
            Self::Pink => "pink",
        }
    }

    /// Canonical parameter names.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            Self::Tone => tone::PARAMS,
            Self::Triangle => triangle::PARAMS,
            Self::Filter => resonant::PARAMS,
            Self::Pink => pink::PARAMS,
        }
    }

    /// Starting values, in `name=value` wire form.
    pub fn defaults(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Tone => &[("waveform", "triangle")],
            Self::Triangle => &[
                ("freq", "440"),
                ("amp", "0.75"),
                ("up_bias", "0"),
                ("pos_bias", "0"),
                ("amp_bias", "0"),
            ],
            Self::Filter => &[
                ("filter_type", "band-pass"),
                ("in_amp", "1"),
                ("f0", "440"),
                ("q", "10"),
                ("out_amp", "0.5"),
            ],
            Self::Pink => &[("alpha", "1"), ("poles", "5"), ("amp", "0.5")],
        }
    }

    /// Build the piece with an entropy-seeded random source.
    pub fn build(self, sample_rate: f64) -> Result<Piece, EngineError> {
        Ok(match self {
            Self::Tone => Piece::Tone(HarmonicTone::new(sample_rate)?),
            Self::Triangle => Piece::Triangle(ParametricTriangle::new(sample_rate)?),
            Self::Filter => Piece::Filter(ResonantFilter::new(sample_rate)?),
            Self::Pink => Piece::Pink(PinkNoise::new(sample_rate)?),
        })
    }

    /// Build the piece with a fixed seed (the triangle has no random source).
    pub fn build_seeded(self, sample_rate: f64, seed: u64) -> Result<Piece, EngineError> {
        Ok(match self {
            Self::Tone => Piece::Tone(HarmonicTone::with_seed(sample_rate, seed)?),
            Self::Triangle => Piece::Triangle(ParametricTriangle::new(sample_rate)?),
            Self::Filter => Piece::Filter(ResonantFilter::with_seed(sample_rate, seed)?),
            Self::Pink => Piece::Pink(PinkNoise::with_seed(sample_rate, seed)?),
        })
    }
}

impl FromStr for PieceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            let names: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
            format!("unknown piece `{s}` (expected one of: {})", names.join(", "))
        })
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Any one of the pieces.
#[derive(Clone, Debug)]
pub enum Piece {
    Tone(HarmonicTone),
    Triangle(ParametricTriangle),
    Filter(ResonantFilter),
    Pink(PinkNoise),
}

impl Piece {
    pub fn kind(&self) -> PieceKind {
        match self {
            Self::Tone(_) => PieceKind::Tone,
            Self::Triangle(_) => PieceKind::Triangle,
            Self::Filter(_) => PieceKind::Filter,
            Self::Pink(_) => PieceKind::Pink,
        }
    }
}

impl Generator for Piece {
    #[inline]
    fn sample_rate(&self) -> f64 {
        match self {
            Self::Tone(g) => g.sample_rate(),
            Self::Triangle(g) => g.sample_rate(),
            Self::Filter(g) => g.sample_rate(),
            Self::Pink(g) => g.sample_rate(),
        }
    }

    #[inline]
    fn next_sample(&mut self) -> f64 {
        match self {
            Self::Tone(g) => g.next_sample(),
            Self::Triangle(g) => g.next_sample(),
            Self::Filter(g) => g.next_sample(),
            Self::Pink(g) => g.next_sample(),
        }
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        match self {
            Self::Tone(g) => g.set_param(name, value),
            Self::Triangle(g) => g.set_param(name, value),
            Self::Filter(g) => g.set_param(name, value),
            Self::Pink(g) => g.set_param(name, value),
        }
    }

    fn param_names(&self) -> &'static [&'static str] {
        self.kind().param_names()
    }

    // one dispatch per block instead of per sample
    fn fill(&mut self, out: &mut [f64]) {
        match self {
            Self::Tone(g) => g.fill(out),
            Self::Triangle(g) => g.fill(out),
            Self::Filter(g) => g.fill(out),
            Self::Pink(g) => g.fill(out),
        }
    }
}
