//! Pieceworks Engine — generators, parameter channel, playback and analysis.
//!
//! Crate layout:
//! - [`graph`]      : `Generator` trait and `AudioContext`
//! - [`nodes`]      : waveforms and the shared random source
//! - [`tone`], [`triangle`], [`resonant`], [`pink`] : the four pieces
//! - [`scenes`]     : `PieceKind` catalogue and the `Piece` enum over all pieces
//! - [`params`]     : `ParamMessage` and the bounded drop-oldest parameter queue
//! - [`controller`] : `PlaybackController` (fades, transport, taps) and `ControlHandle`
//! - [`analysis`]   : FFT analyser with Web Audio semantics
//! - [`taps`]       : visualization sink traits and `SharedScope`
//! - [`error`]      : `EngineError` / `ParamError`
//!
//! The audio path never allocates, locks or logs. Pieces are plain structs;
//! parameters arrive as `Copy` messages applied between blocks.

pub mod analysis;
pub mod controller;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod params;
pub mod pink;
pub mod resonant;
pub mod scenes;
pub mod taps;
pub mod tone;
pub mod triangle;

pub use pieceworks_core;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use analysis::{Analyser, AnalyserConfig};
pub use controller::{ControlHandle, PlaybackConfig, PlaybackController, Transport};
pub use error::{EngineError, ParamError};
pub use graph::{AudioContext, Generator, DEFAULT_BLOCK_SIZE};
pub use nodes::Waveform;
pub use params::{Label, ParamMessage, ParamValue};
pub use pink::PinkNoise;
pub use resonant::ResonantFilter;
pub use scenes::{Piece, PieceKind};
pub use taps::{HarmonicsSink, OscilloscopeSink, ScopeFrame, SharedScope};
pub use tone::HarmonicTone;
pub use triangle::{ParametricTriangle, SegmentWidths};
