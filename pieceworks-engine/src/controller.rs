//! Playback controller: pulls samples from a generator block by block, applies
//! click-free fades, and feeds the visualization taps.
//!
//! The controller lives on the audio thread. Everything the control side wants
//! (parameter changes, play/pause, stop) goes through the [`ControlHandle`]
//! returned alongside it and is picked up at the start of the next block:
//! parameters and transport requests each through their own bounded queue, in
//! the order they were posted. The controller publishes its transport state and
//! gain back through atomics.
//!
//! ```text
//!            play_pause                     fade done
//!  Stopped ─────────────▶ FadingIn ───────────────────▶ Playing
//!     ▲                      │ play_pause / stop           │ play_pause / stop
//!     │     fade done        ▼                             │
//!     └───────────────── FadingOut ◀──────────────────────┘
//!                          │  ▲ play_pause / stop (fast fade from current gain)
//!                          └──┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info};
use pieceworks_core::envelopes::SineRamp;

use crate::analysis::{Analyser, AnalyserConfig};
use crate::error::{EngineError, ParamError};
use crate::graph::{AudioContext, Generator};
use crate::params::{self, ParamMessage, ParamReceiver, ParamSender, ParamValue, DEFAULT_QUEUE_CAPACITY};
use crate::taps::{HarmonicsSink, OscilloscopeSink};

/// Where the controller is in its play/stop cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Transport {
    Stopped = 0,
    FadingIn = 1,
    Playing = 2,
    FadingOut = 3,
}

impl Transport {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::FadingIn,
            2 => Self::Playing,
            3 => Self::FadingOut,
            _ => Self::Stopped,
        }
    }

    /// Whether samples are being pulled from the generator.
    #[inline]
    pub fn is_audible(self) -> bool {
        self != Self::Stopped
    }
}

/// Controller settings. Times are in seconds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlaybackConfig {
    pub fade_in: f64,
    pub fade_out: f64,
    /// Fade used by `stop()` and by a toggle during a fade-out.
    pub fast_fade: f64,
    pub queue_capacity: usize,
    pub analyser: AnalyserConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fade_in: 0.25,
            fade_out: 1.0,
            fast_fade: 0.1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            analyser: AnalyserConfig::default(),
        }
    }
}

/// Transport requests pending more than this are dropped.
const TRANSPORT_QUEUE_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TransportCmd {
    PlayPause,
    Stop,
}

/// State shared between the controller and its handles.
#[derive(Debug, Default)]
struct Shared {
    transport: AtomicU8,
    gain_bits: AtomicU64,
    rejected: AtomicU64,
    alive: AtomicBool,
}

/// Control-side view of a [`PlaybackController`]. Cheap to clone.
#[derive(Clone)]
pub struct ControlHandle {
    params: ParamSender,
    commands: Sender<TransportCmd>,
    shared: Arc<Shared>,
}

impl ControlHandle {
    /// Queue a parameter change for the next block.
    pub fn send_param(&self, name: &str, value: impl Into<ParamValue>) -> Result<(), ParamError> {
        self.send(ParamMessage::new(name, value.into())?)
    }

    /// Queue a pre-built message (e.g. parsed from `name=value`).
    pub fn send(&self, msg: ParamMessage) -> Result<(), ParamError> {
        if !self.shared.alive.load(Ordering::Acquire) {
            return Err(ParamError::Disconnected);
        }
        self.params.send(msg)
    }

    /// Request a play/pause toggle.
    pub fn play_pause(&self) {
        self.post(TransportCmd::PlayPause);
    }

    /// Request a fast fade to silence.
    pub fn stop(&self) {
        self.post(TransportCmd::Stop);
    }

    fn post(&self, cmd: TransportCmd) {
        match self.commands.try_send(cmd) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => debug!("transport queue full, {cmd:?} dropped"),
        }
    }

    /// Transport state as of the last rendered block.
    pub fn transport(&self) -> Transport {
        Transport::from_u8(self.shared.transport.load(Ordering::Acquire))
    }

    /// Fade gain as of the last rendered block.
    pub fn gain(&self) -> f64 {
        f64::from_bits(self.shared.gain_bits.load(Ordering::Acquire))
    }

    /// Parameter messages the generator refused so far.
    pub fn rejected_params(&self) -> u64 {
        self.shared.rejected.load(Ordering::Acquire)
    }

    /// Parameter messages lost to a full queue so far.
    pub fn dropped_params(&self) -> u64 {
        self.params.dropped()
    }

    /// False once the controller has been dropped.
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }
}

/// Owns one generator and renders it into output blocks.
pub struct PlaybackController<G: Generator> {
    ctx: AudioContext,
    config: PlaybackConfig,
    gen: Option<G>,
    params: ParamReceiver,
    commands: Receiver<TransportCmd>,
    shared: Arc<Shared>,

    transport: Transport,
    ramp: SineRamp,
    connected: bool,
    rejected: u64,

    // visualization
    tap: Vec<f64>,
    tap_len: usize,
    analyser: Analyser,
    scope: Option<Box<dyn OscilloscopeSink>>,
    harmonics: Option<Box<dyn HarmonicsSink>>,
}

impl<G: Generator> PlaybackController<G> {
    /// Build a controller (no generator yet) and its control handle.
    pub fn new(ctx: AudioContext, config: PlaybackConfig) -> Result<(Self, ControlHandle), EngineError> {
        let analyser = Analyser::new(config.analyser, ctx.sample_rate())?;
        let (tx, rx) = params::channel(config.queue_capacity);
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(TRANSPORT_QUEUE_CAPACITY);
        let shared = Arc::new(Shared::default());
        shared.alive.store(true, Ordering::Release);

        info!(
            "playback controller: {} Hz, tap block {}, fades in {}s / out {}s / fast {}s",
            ctx.sample_rate(),
            ctx.block_size(),
            config.fade_in,
            config.fade_out,
            config.fast_fade
        );

        let controller = Self {
            ctx,
            config,
            gen: None,
            params: rx,
            commands: cmd_rx,
            shared: Arc::clone(&shared),
            transport: Transport::Stopped,
            ramp: SineRamp::new(0.0),
            connected: false,
            rejected: 0,
            tap: vec![0.0; ctx.block_size()],
            tap_len: 0,
            analyser,
            scope: None,
            harmonics: None,
        };
        Ok((controller, ControlHandle { params: tx, commands: cmd_tx, shared }))
    }

    /// Attach a generator, returning the one it replaces.
    ///
    /// Parameter messages queued while nothing was attached are applied to it
    /// before its first sample.
    pub fn attach_generator(&mut self, gen: G) -> Result<Option<G>, EngineError> {
        let (expected, actual) = (self.ctx.sample_rate(), gen.sample_rate());
        if expected != actual {
            return Err(EngineError::SampleRateMismatch { expected, actual });
        }
        info!("generator attached ({} params)", gen.param_names().len());
        Ok(self.gen.replace(gen))
    }

    /// Detach the generator; playback drops to `Stopped`.
    pub fn detach_generator(&mut self) -> Option<G> {
        let old = self.gen.take();
        if old.is_some() {
            info!("generator detached");
        }
        self.halt();
        self.publish();
        old
    }

    pub fn set_oscilloscope(&mut self, mut sink: Box<dyn OscilloscopeSink>) {
        sink.set_sample_rate(self.ctx.sample_rate());
        self.scope = Some(sink);
    }

    pub fn set_harmonics(&mut self, mut sink: Box<dyn HarmonicsSink>) {
        sink.set_min_value(self.analyser.min_db());
        sink.set_max_value(self.analyser.max_db());
        self.harmonics = Some(sink);
    }

    /// Toggle between playing and fading out. No-op without a generator.
    pub fn play_pause(&mut self) {
        if self.gen.is_none() {
            return;
        }
        match self.transport {
            Transport::Stopped => {
                self.connected = true;
                self.transport = Transport::FadingIn;
                self.ramp.jump_to(0.0);
                self.ramp.start_to(1.0, self.ctx.seconds_to_samples(self.config.fade_in));
            }
            Transport::FadingIn | Transport::Playing => {
                self.transport = Transport::FadingOut;
                self.ramp.start_to(0.0, self.ctx.seconds_to_samples(self.config.fade_out));
            }
            Transport::FadingOut => {
                self.ramp.start_to(0.0, self.ctx.seconds_to_samples(self.config.fast_fade));
            }
        }
        self.settle();
    }

    /// Fade quickly to silence. Safe to call in any state.
    pub fn stop(&mut self) {
        if self.gen.is_none() || self.transport == Transport::Stopped {
            return;
        }
        self.transport = Transport::FadingOut;
        self.ramp.start_to(0.0, self.ctx.seconds_to_samples(self.config.fast_fade));
        self.settle();
    }

    #[inline] pub fn transport(&self) -> Transport { self.transport }
    #[inline] pub fn gain(&self) -> f64 { self.ramp.value() }
    #[inline] pub fn is_connected(&self) -> bool { self.connected }
    #[inline] pub fn context(&self) -> &AudioContext { &self.ctx }
    #[inline] pub fn config(&self) -> &PlaybackConfig { &self.config }
    #[inline] pub fn generator(&self) -> Option<&G> { self.gen.as_ref() }
    #[inline] pub fn generator_mut(&mut self) -> Option<&mut G> { self.gen.as_mut() }
    #[inline] pub fn rejected_params(&self) -> u64 { self.rejected }

    /// Render `out.len()` samples.
    ///
    /// Pending parameter messages and transport requests are handled first.
    /// Without a generator, or while stopped, the block is silence.
    pub fn fill_block(&mut self, out: &mut [f64]) {
        self.apply_pending();

        let n = out.len();
        let mut done = 0;
        while done < n {
            let Some(gen) = self.gen.as_mut() else { break };
            if !self.connected {
                break;
            }

            let end = if self.transport == Transport::Playing && !self.ramp.is_moving() {
                // steady: gain is exactly 1
                gen.fill(&mut out[done..]);
                n
            } else {
                let mut k = done;
                while k < n {
                    let g = self.ramp.next();
                    out[k] = gen.next_sample() * g;
                    k += 1;
                    if !self.ramp.is_moving() {
                        break;
                    }
                }
                k
            };

            self.push_taps(&out[done..end]);
            done = end;
            if !self.ramp.is_moving() {
                self.finish_ramp();
            }
        }
        out[done..].fill(0.0);

        self.publish();
    }

    fn apply_pending(&mut self) {
        if let Some(gen) = self.gen.as_mut() {
            let stats = self.params.drain_into(gen);
            self.rejected += u64::from(stats.rejected);
        }

        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                TransportCmd::PlayPause => self.play_pause(),
                TransportCmd::Stop => self.stop(),
            }
        }
    }

    // A ramp that ended right away (zero-length fade) still has to move the
    // transport along.
    fn settle(&mut self) {
        if !self.ramp.is_moving() {
            self.finish_ramp();
        }
    }

    fn finish_ramp(&mut self) {
        match self.transport {
            Transport::FadingIn => self.transport = Transport::Playing,
            Transport::FadingOut => self.halt(),
            Transport::Stopped | Transport::Playing => {}
        }
    }

    fn halt(&mut self) {
        self.ramp.jump_to(0.0);
        self.connected = false;
        self.transport = Transport::Stopped;
    }

    fn push_taps(&mut self, mut samples: &[f64]) {
        if self.scope.is_none() && self.harmonics.is_none() {
            return;
        }
        while !samples.is_empty() {
            let room = self.tap.len() - self.tap_len;
            let take = room.min(samples.len());
            self.tap[self.tap_len..self.tap_len + take].copy_from_slice(&samples[..take]);
            self.tap_len += take;
            samples = &samples[take..];

            if self.tap_len == self.tap.len() {
                self.tap_len = 0;
                if let Some(scope) = self.scope.as_mut() {
                    scope.set_buffer(&self.tap);
                }
                if let Some(harmonics) = self.harmonics.as_mut() {
                    harmonics.set_buffer(self.analyser.process(&self.tap));
                }
            }
        }
    }

    fn publish(&self) {
        self.shared.transport.store(self.transport as u8, Ordering::Release);
        self.shared.gain_bits.store(self.ramp.value().to_bits(), Ordering::Release);
        self.shared.rejected.store(self.rejected, Ordering::Release);
    }
}

impl<G: Generator> Drop for PlaybackController<G> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
        debug!("playback controller dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taps::SharedScope;

    /// Constant-output generator that records what it was told.
    #[derive(Debug)]
    struct Dc {
        sr: f64,
        level: f64,
        pulls: u64,
    }

    impl Generator for Dc {
        fn sample_rate(&self) -> f64 { self.sr }
        fn next_sample(&mut self) -> f64 {
            self.pulls += 1;
            self.level
        }
        fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
            if name == "level" {
                self.level = value.as_number().unwrap_or(0.0);
                Ok(())
            } else {
                Err(params::unknown(name))
            }
        }
        fn param_names(&self) -> &'static [&'static str] { &["level"] }
    }

    fn dc(sr: f64) -> Dc {
        Dc { sr, level: 1.0, pulls: 0 }
    }

    fn setup(sr: f64) -> (PlaybackController<Dc>, ControlHandle) {
        let ctx = AudioContext::new(sr, 256).unwrap();
        PlaybackController::new(ctx, PlaybackConfig::default()).unwrap()
    }

    #[test]
    fn silent_without_generator() {
        let (mut c, h) = setup(1_000.0);
        h.play_pause();
        let mut out = [1.0; 64];
        c.fill_block(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(c.transport(), Transport::Stopped);
    }

    #[test]
    fn mismatched_rate_is_refused() {
        let (mut c, _h) = setup(48_000.0);
        assert_eq!(
            c.attach_generator(dc(44_100.0)).unwrap_err(),
            EngineError::SampleRateMismatch { expected: 48_000.0, actual: 44_100.0 }
        );
    }

    #[test]
    fn fade_in_then_steady() {
        let (mut c, h) = setup(1_000.0);
        c.attach_generator(dc(1_000.0)).unwrap();
        h.play_pause();
        // fade in is 0.25 s = 250 samples
        let mut out = vec![0.0; 300];
        c.fill_block(&mut out);
        let mut prev = 0.0;
        for s in &out[..250] {
            assert!(*s >= prev && *s <= 1.0);
            prev = *s;
        }
        assert_eq!(out[249], 1.0);
        assert!(out[250..].iter().all(|s| *s == 1.0));
        assert_eq!(h.transport(), Transport::Playing);
        assert_eq!(h.gain(), 1.0);
    }

    #[test]
    fn fade_out_disconnects_and_silences_rest_of_block() {
        let (mut c, _h) = setup(1_000.0);
        c.attach_generator(dc(1_000.0)).unwrap();
        c.play_pause();
        let mut out = vec![0.0; 250];
        c.fill_block(&mut out);
        c.play_pause();
        assert_eq!(c.transport(), Transport::FadingOut);
        let mut out = vec![1.0; 1_200];
        c.fill_block(&mut out);
        assert_eq!(out[999], 0.0);
        assert!(out[1_000..].iter().all(|s| *s == 0.0));
        assert_eq!(c.transport(), Transport::Stopped);
        assert!(!c.is_connected());
        // generator not pulled past the end of the fade
        assert_eq!(c.generator().unwrap().pulls, 1_250);
    }

    #[test]
    fn stop_during_fade_in_fades_fast_from_current_gain() {
        let (mut c, _h) = setup(1_000.0);
        c.attach_generator(dc(1_000.0)).unwrap();
        c.play_pause();
        let mut out = vec![0.0; 100];
        c.fill_block(&mut out);
        let g = c.gain();
        assert!(g > 0.0 && g < 1.0);
        c.stop();
        let mut out = vec![0.0; 100];
        c.fill_block(&mut out);
        assert!(out[0] <= g);
        // fast fade is 0.1 s = 100 samples
        assert_eq!(out[99], 0.0);
        assert_eq!(c.transport(), Transport::Stopped);
    }

    #[test]
    fn queued_params_wait_for_a_generator() {
        let (mut c, h) = setup(1_000.0);
        h.send_param("level", 0.5).unwrap();
        h.send_param("bogus", 1.0).unwrap();
        let mut out = [0.0; 8];
        c.fill_block(&mut out);
        c.attach_generator(dc(1_000.0)).unwrap();
        c.fill_block(&mut out);
        assert_eq!(c.generator().unwrap().level, 0.5);
        assert_eq!(h.rejected_params(), 1);
    }

    #[test]
    fn zero_length_fades_jump() {
        let ctx = AudioContext::new(1_000.0, 256).unwrap();
        let cfg = PlaybackConfig { fade_in: 0.0, fade_out: 0.0, ..PlaybackConfig::default() };
        let (mut c, _h) = PlaybackController::new(ctx, cfg).unwrap();
        c.attach_generator(dc(1_000.0)).unwrap();
        c.play_pause();
        assert_eq!(c.transport(), Transport::Playing);
        c.play_pause();
        assert_eq!(c.transport(), Transport::Stopped);
    }

    #[test]
    fn taps_receive_full_blocks() {
        let (mut c, h) = setup(1_000.0);
        let scope = SharedScope::with_capacity(256, 2048);
        c.set_oscilloscope(Box::new(scope.clone()));
        c.set_harmonics(Box::new(scope.clone()));
        c.attach_generator(dc(1_000.0)).unwrap();
        h.play_pause();
        let mut out = vec![0.0; 600];
        c.fill_block(&mut out);
        let frame = scope.snapshot().unwrap();
        assert_eq!(frame.blocks, 2);
        assert_eq!(frame.samples.len(), 256);
        assert_eq!(frame.magnitudes_db.len(), 1024);
        assert_eq!(frame.sample_rate, 1_000.0);
        assert_eq!((frame.min_db, frame.max_db), (-100.0, -10.0));
        // the latest block starts after the 250-sample fade
        assert!(frame.samples.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn transport_requests_keep_their_order() {
        let (mut c, h) = setup(1_000.0);
        c.attach_generator(dc(1_000.0)).unwrap();
        h.stop();
        h.play_pause();
        let mut out = [0.0; 64];
        c.fill_block(&mut out);
        assert_eq!(h.transport(), Transport::FadingIn);
        for _ in 0..40 {
            c.fill_block(&mut out);
        }
        assert_eq!(h.transport(), Transport::Playing);
        assert_eq!(h.gain(), 1.0);

        // play then stop within one block ends silent
        h.play_pause();
        h.stop();
        for _ in 0..40 {
            c.fill_block(&mut out);
        }
        assert_eq!(h.transport(), Transport::Stopped);
    }

    #[test]
    fn handle_notices_dropped_controller() {
        let (c, h) = setup(1_000.0);
        assert!(h.is_alive());
        drop(c);
        assert!(!h.is_alive());
        assert_eq!(h.send_param("level", 1.0), Err(ParamError::Disconnected));
    }
}
