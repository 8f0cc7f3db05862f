//! Pieceworks CLI — real-time player with a line-based control console.
//!
//! ```text
//! pieceworks --piece=filter --set=q=30 --autoplay
//! ```
//!
//! Console commands (one per line on stdin):
//! - `p`            play / pause (fades in or out)
//! - `s`            stop (fast fade)
//! - `name=value`   set a parameter on the running piece
//! - `params`       list parameters and the values sent so far
//! - `scope`        print level, dominant frequency and a waveform sketch
//! - `q`            quit

use std::collections::BTreeMap;
use std::io::BufRead;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use cfg_if::cfg_if;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::RecvTimeoutError;
use log::{error, info, warn};
use pieceworks_engine::pieceworks_core::dsp::{peak, rms};
use pieceworks_engine::taps::trigger_window;
use pieceworks_engine::{
    AudioContext, ControlHandle, ParamMessage, Piece, PieceKind, PlaybackConfig,
    PlaybackController, SharedScope, Transport, DEFAULT_BLOCK_SIZE,
};

cfg_if! {
    if #[cfg(feature = "no-std-core")] {
        const MATH_BACKEND: &str = "libm";
    } else {
        const MATH_BACKEND: &str = "std";
    }
}

/// Frames rendered per controller call inside the device callback.
const RENDER_CHUNK: usize = 4096;

#[derive(Debug, Default)]
struct Args {
    list_devices: bool,
    device_name: Option<String>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
    duration_sec: Option<f64>,
    piece: Option<String>,
    gain: Option<f64>,
    sets: Vec<String>,
    fade_in: Option<f64>,
    fade_out: Option<f64>,
    block_size: Option<usize>,
    seed: Option<u64>,
    autoplay: bool,
}

fn parse_args() -> Args {
    let mut a = Args::default();
    for s in std::env::args().skip(1) {
        if s == "--list-devices" { a.list_devices = true; continue; }
        if s == "--autoplay"     { a.autoplay = true;     continue; }
        if let Some(rest) = s.strip_prefix("--device=")       { a.device_name  = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--sample-rate=")  { a.sample_rate  = parse_or_warn(&s, rest); continue; }
        if let Some(rest) = s.strip_prefix("--channels=")     { a.channels     = parse_or_warn(&s, rest); continue; }
        if let Some(rest) = s.strip_prefix("--duration=")     { a.duration_sec = parse_seconds(&s, rest); continue; }
        if let Some(rest) = s.strip_prefix("--piece=")        { a.piece        = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--gain=")         { a.gain         = parse_or_warn(&s, rest); continue; }
        if let Some(rest) = s.strip_prefix("--set=")          { a.sets.push(rest.to_string());          continue; }
        if let Some(rest) = s.strip_prefix("--fade-in=")      { a.fade_in      = parse_seconds(&s, rest); continue; }
        if let Some(rest) = s.strip_prefix("--fade-out=")     { a.fade_out     = parse_seconds(&s, rest); continue; }
        if let Some(rest) = s.strip_prefix("--block-size=")   { a.block_size   = parse_or_warn(&s, rest); continue; }
        if let Some(rest) = s.strip_prefix("--seed=")         { a.seed         = parse_or_warn(&s, rest); continue; }
        warn!("unknown arg: {s}");
    }
    a
}

fn parse_or_warn<T: std::str::FromStr>(arg: &str, value: &str) -> Option<T> {
    let parsed = value.parse().ok();
    if parsed.is_none() {
        warn!("ignoring unparsable value in {arg}");
    }
    parsed
}

/// A non-negative, finite number of seconds.
fn parse_seconds(arg: &str, value: &str) -> Option<f64> {
    let secs = parse_or_warn::<f64>(arg, value)?;
    if secs.is_finite() && secs >= 0.0 {
        Some(secs)
    } else {
        warn!("ignoring out-of-range seconds in {arg}");
        None
    }
}

fn list_output_devices() -> Result<()> {
    let host = cpal::default_host();
    println!("Available output devices:");
    for dev in host.output_devices()? {
        println!("- {}", dev.name()?);
    }
    Ok(())
}

fn pick_device(args: &Args) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = &args.device_name {
        for d in host.output_devices()? {
            if d.name()? == *name { return Ok(d); }
        }
        bail!("requested device not found: {name}");
    }
    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device"))
}

fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig> {
    // If nothing requested, default is already concrete.
    if req_sr.is_none() && req_ch.is_none() {
        return Ok(device.default_output_config()?);
    }

    // Pick a SupportedStreamConfigRange first.
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let ch     = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        let ch_pen = match req_ch { Some(c) => (i64::from(ch) - i64::from(c)).unsigned_abs(), None => 0 };
        let sr_pen = match req_sr {
            Some(sr) => if (sr_min..=sr_max).contains(&sr) { 0 } else { u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))) },
            None => 0,
        };

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| anyhow!("no supported output configs"))?;

    let pick_sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };

    Ok(range.with_sample_rate(pick_sr))
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut controller: PlaybackController<Piece>,
    gain: f64,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels).max(1);
    let mut scratch = vec![0.0f64; RENDER_CHUNK];

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            let mut left = output.len() / channels;
            let mut frames = output.chunks_mut(channels);
            while left > 0 {
                let n = left.min(scratch.len());
                controller.fill_block(&mut scratch[..n]);
                for (s, frame) in scratch[..n].iter().zip(frames.by_ref()) {
                    let v: T = T::from_sample((s * gain).clamp(-1.0, 1.0) as f32);
                    frame.fill(v);
                }
                left -= n;
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Forward stdin lines to the main loop. Ends when stdin closes.
fn spawn_console() -> crossbeam_channel::Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_params(kind: PieceKind, sent: &BTreeMap<String, String>) {
    println!("{kind} parameters:");
    for (name, default) in kind.defaults() {
        let current = sent.get(*name).map_or(*default, String::as_str);
        println!("  {name:<12} = {current:<10} (default {default})");
    }
}

fn print_scope(scope: &SharedScope, handle: &ControlHandle) {
    let Some(frame) = scope.snapshot() else {
        println!("scope unavailable");
        return;
    };
    println!(
        "{:?}  gain {:.3}  blocks {}  peak {:.3}  rms {:.3}  dominant {}",
        handle.transport(),
        handle.gain(),
        frame.blocks,
        peak(&frame.samples),
        rms(&frame.samples),
        frame.peak_frequency().map_or_else(|| "-".to_string(), |f| format!("{f:.1} Hz")),
    );
    println!("{}", sketch(trigger_window(&frame.samples), 64));
}

/// One-line waveform sketch, `width` columns.
fn sketch(samples: &[f64], width: usize) -> String {
    const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    if samples.is_empty() {
        return String::new();
    }
    let step = (samples.len() / width).max(1);
    samples
        .iter()
        .step_by(step)
        .take(width)
        .map(|s| {
            let level = ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * 8.0).round() as usize;
            LEVELS[level.min(8)]
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = parse_args();

    if args.list_devices {
        list_output_devices()?;
        return Ok(());
    }

    println!("pieceworks — real-time piece player\n");

    let kind: PieceKind = args
        .piece
        .as_deref()
        .unwrap_or("tone")
        .parse()
        .map_err(|e: String| anyhow!(e))?;

    let device  = pick_device(&args)?;
    let sup_cfg = choose_config(&device, args.sample_rate, args.channels)?;
    let sample_format = sup_cfg.sample_format();
    let mut cfg = sup_cfg.config();

    if let Some(sr) = args.sample_rate { cfg.sample_rate = cpal::SampleRate(sr); }
    if let Some(ch) = args.channels    { cfg.channels    = ch; }

    let sr = f64::from(cfg.sample_rate.0);
    let ctx = AudioContext::new(sr, args.block_size.unwrap_or(DEFAULT_BLOCK_SIZE))
        .context("invalid audio settings")?;
    let defaults = PlaybackConfig::default();
    let config = PlaybackConfig {
        fade_in: args.fade_in.unwrap_or(defaults.fade_in),
        fade_out: args.fade_out.unwrap_or(defaults.fade_out),
        ..defaults
    };

    let piece = match args.seed {
        Some(seed) => kind.build_seeded(sr, seed)?,
        None => kind.build(sr)?,
    };
    let (mut controller, handle) = PlaybackController::new(ctx, config)?;
    let scope = SharedScope::with_capacity(ctx.block_size(), config.analyser.fft_size);
    controller.set_oscilloscope(Box::new(scope.clone()));
    controller.set_harmonics(Box::new(scope.clone()));
    controller.attach_generator(piece)?;

    let mut sent = BTreeMap::new();
    for set in &args.sets {
        match set.parse::<ParamMessage>().and_then(|m| handle.send(m).map(|()| m)) {
            Ok(m) => { sent.insert(m.name.to_string(), m.value.to_string()); }
            Err(e) => warn!("--set={set}: {e}"),
        }
    }

    let gain = args.gain.unwrap_or(0.8);

    info!("device: {}", device.name()?);
    info!("stream config: {cfg:?} (sample_format: {sample_format:?}, math: {MATH_BACKEND})");
    info!("piece: {kind}  | gain: {gain:.2}");
    if let Some(d) = args.duration_sec { info!("auto-stop after {d} seconds"); }
    println!("Commands: p (play/pause), s (stop), name=value, params, scope, q\n");

    let err_fn = |e: cpal::StreamError| error!("stream error: {e}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, controller, gain, err_fn)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, controller, gain, err_fn)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, controller, gain, err_fn)?,
        other => bail!("unsupported device sample format: {other:?}"),
    };

    stream.play()?;
    if args.autoplay {
        handle.play_pause();
    }

    let console = spawn_console();
    let deadline = args
        .duration_sec
        .and_then(|d| Duration::try_from_secs_f64(d).ok())
        .map(|d| Instant::now() + d);
    let mut console_open = true;
    let mut quitting = false;

    loop {
        if let Some(end) = deadline {
            if !quitting && Instant::now() >= end {
                info!("duration reached");
                handle.stop();
                quitting = true;
            }
        }
        // leave once the fade-out has run its course
        if quitting && handle.transport() == Transport::Stopped {
            break;
        }

        if !console_open {
            std::thread::sleep(Duration::from_millis(100));
            continue;
        }
        let line = match console.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                console_open = false;
                continue;
            }
        };

        match line.trim() {
            "" => {}
            "p" | "play" | "pause" => handle.play_pause(),
            "s" | "stop" => handle.stop(),
            "params" => print_params(kind, &sent),
            "scope" => print_scope(&scope, &handle),
            "q" | "quit" | "exit" => {
                handle.stop();
                quitting = true;
            }
            cmd if cmd.contains('=') => match cmd.parse::<ParamMessage>() {
                Ok(msg) => match handle.send(msg) {
                    Ok(()) => { sent.insert(msg.name.to_string(), msg.value.to_string()); }
                    Err(e) => warn!("{e}"),
                },
                Err(e) => warn!("{cmd}: {e}"),
            },
            other => warn!("unknown command: {other}"),
        }
    }

    let rejected = handle.rejected_params();
    if rejected > 0 {
        warn!("{rejected} parameter message(s) were rejected by the piece");
    }
    drop(stream);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sketch_maps_levels() {
        assert_eq!(sketch(&[-1.0, 0.0, 1.0], 3), " ▄█");
        assert_eq!(sketch(&[], 8), "");
        assert_eq!(sketch(&[0.0; 128], 8).chars().count(), 8);
    }

    #[test]
    fn seconds_must_be_finite_and_non_negative() {
        assert_eq!(parse_seconds("--duration=2.5", "2.5"), Some(2.5));
        assert_eq!(parse_seconds("--duration=0", "0"), Some(0.0));
        assert_eq!(parse_seconds("--duration=inf", "inf"), None);
        assert_eq!(parse_seconds("--duration=NaN", "NaN"), None);
        assert_eq!(parse_seconds("--fade-in=-1", "-1"), None);
        assert_eq!(parse_seconds("--fade-out=x", "x"), None);
    }
}
