//! End-to-end playback: controller + real pieces + taps.

use pieceworks_engine::{
    AudioContext, Generator, ParamValue, PieceKind, PlaybackConfig, PlaybackController,
    ResonantFilter, SharedScope, Transport,
};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

fn controller<G: Generator>(
    sr: f64,
    config: PlaybackConfig,
) -> (PlaybackController<G>, pieceworks_engine::ControlHandle) {
    let ctx = AudioContext::new(sr, 2048).unwrap();
    PlaybackController::new(ctx, config).unwrap()
}

#[test]
fn band_pass_peak_sits_on_f0() {
    let sr = 48_000.0;
    let cfg = PlaybackConfig { fade_in: 0.0, ..PlaybackConfig::default() };
    let (mut c, h) = controller::<ResonantFilter>(sr, cfg);

    // queued before the generator exists; replayed on attach
    h.send("filterType=band-pass".parse().unwrap()).unwrap();
    h.send_param("f0", 440.0).unwrap();
    h.send_param("q", 10.0).unwrap();
    c.attach_generator(ResonantFilter::with_seed(sr, 2024).unwrap()).unwrap();
    h.play_pause();

    // Bartlett: average one-second power spectra (1 Hz bins)
    let n = sr as usize;
    let segments = 32;
    let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
    let mut power = vec![0.0; n / 2];
    let mut block = vec![0.0; n];
    let mut buf = vec![Complex::default(); n];
    for _ in 0..segments {
        c.fill_block(&mut block);
        for (b, x) in buf.iter_mut().zip(&block) {
            *b = Complex::new(*x, 0.0);
        }
        fft.process(&mut buf);
        for (p, b) in power.iter_mut().zip(&buf) {
            *p += b.norm_sqr();
        }
    }
    assert_eq!(c.transport(), Transport::Playing);

    // light smoothing across neighbouring bins
    let smooth: Vec<f64> = (0..power.len())
        .map(|k| {
            let lo = k.saturating_sub(3);
            let hi = (k + 4).min(power.len());
            power[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect();

    let (peak_bin, peak) = smooth
        .iter()
        .enumerate()
        .skip(20)
        .fold((0, 0.0), |best, (k, p)| if *p > best.1 { (k, *p) } else { best });

    // centroid of the contiguous region above half the peak
    let mut lo = peak_bin;
    while lo > 0 && smooth[lo - 1] >= peak * 0.5 {
        lo -= 1;
    }
    let mut hi = peak_bin;
    while hi + 1 < smooth.len() && smooth[hi + 1] >= peak * 0.5 {
        hi += 1;
    }
    let (num, den) = (lo..=hi).fold((0.0, 0.0), |(num, den), k| {
        (num + k as f64 * smooth[k], den + smooth[k])
    });
    let centre = num / den; // bins are 1 Hz wide
    assert!((centre - 440.0).abs() <= 5.0, "peak at {centre} Hz (argmax bin {peak_bin})");
}

#[test]
fn second_toggle_fades_down_from_current_gain() {
    let sr = 8_000.0;
    let (mut c, h) = controller(sr, PlaybackConfig::default());
    let mut tri = PieceKind::Triangle.build(sr).unwrap();
    tri.set_param("freq", ParamValue::Number(0.0)).unwrap();
    c.attach_generator(tri).unwrap();

    h.play_pause();
    let mut out = vec![0.0; 1_000];
    c.fill_block(&mut out);
    assert_eq!(h.transport(), Transport::FadingIn);
    let mid = h.gain();
    assert!(mid > 0.0 && mid < 1.0);

    h.play_pause();
    let mut gains = Vec::new();
    for _ in 0..200 {
        let mut one = [0.0; 64];
        c.fill_block(&mut one);
        gains.push(h.gain());
        if h.transport() == Transport::Stopped {
            break;
        }
    }
    assert!(gains[0] <= mid, "{} > {mid}", gains[0]);
    assert!(gains.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(h.transport(), Transport::Stopped);
    assert_eq!(h.gain(), 0.0);
}

#[test]
fn fade_in_envelope_is_monotonic_and_exact() {
    let sr = 4_000.0;
    let (mut c, h) = controller(sr, PlaybackConfig::default());
    c.attach_generator(PieceKind::Triangle.build(sr).unwrap()).unwrap();
    h.play_pause();

    let mut gains = vec![0.0];
    for _ in 0..40 {
        let mut block = [0.0; 32];
        c.fill_block(&mut block);
        gains.push(h.gain());
    }
    assert!(gains.windows(2).all(|w| w[1] >= w[0]));
    assert_eq!(*gains.last().unwrap(), 1.0);
    assert_eq!(h.transport(), Transport::Playing);
}

#[test]
fn taps_see_post_gain_samples() {
    let sr = 8_000.0;
    let ctx = AudioContext::new(sr, 256).unwrap();
    let cfg = PlaybackConfig { fade_in: 1.0, ..PlaybackConfig::default() };
    let (mut c, h) = PlaybackController::new(ctx, cfg).unwrap();
    let scope = SharedScope::with_capacity(256, 2048);
    c.set_oscilloscope(Box::new(scope.clone()));
    c.attach_generator(PieceKind::Pink.build_seeded(sr, 9).unwrap()).unwrap();
    h.play_pause();

    let mut out = vec![0.0; 256];
    c.fill_block(&mut out);
    let frame = scope.snapshot().unwrap();
    assert_eq!(frame.samples, out);
    // 256 samples into a one-second fade
    assert!(h.gain() < 0.5);
}

#[test]
fn stop_is_safe_in_every_state() {
    let sr = 8_000.0;
    let (mut c, h) = controller(sr, PlaybackConfig::default());
    h.stop();
    let mut out = [0.0; 128];
    c.fill_block(&mut out);
    c.attach_generator(PieceKind::Tone.build_seeded(sr, 1).unwrap()).unwrap();
    h.stop();
    c.fill_block(&mut out);
    assert_eq!(h.transport(), Transport::Stopped);

    h.play_pause();
    c.fill_block(&mut out);
    h.stop();
    h.stop();
    for _ in 0..20 {
        c.fill_block(&mut out);
    }
    assert_eq!(h.transport(), Transport::Stopped);
    assert!(out.iter().all(|s| *s == 0.0));
}

#[test]
fn full_queue_keeps_newest_messages() {
    let sr = 8_000.0;
    let cfg = PlaybackConfig { queue_capacity: 4, ..PlaybackConfig::default() };
    let (mut c, h) = controller(sr, cfg);
    for i in 0..10 {
        h.send_param("freq", 100.0 + f64::from(i)).unwrap();
    }
    assert_eq!(h.dropped_params(), 6);
    c.attach_generator(PieceKind::Triangle.build(sr).unwrap()).unwrap();
    let mut out = [0.0; 16];
    c.fill_block(&mut out);
    match c.generator().unwrap() {
        pieceworks_engine::Piece::Triangle(t) => assert_eq!(t.freq(), 109.0),
        other => panic!("unexpected piece {:?}", other.kind()),
    }
    assert_eq!(h.rejected_params(), 0);
}
