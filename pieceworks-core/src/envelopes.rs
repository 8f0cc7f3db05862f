//! Gain ramps for click-free starts and stops.
//!
//! Provided envelopes:
//! - `SineRamp` : moves from its current value to a target along a
//!   first-quadrant sine curve, one step per sample
//!
//! `no_std` friendly, no heap allocations.

use crate::dsp::{clamp, sine_ease};

/// Where a [`SineRamp`] is in its travel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RampStage {
    /// Sitting at the target; `next()` is a constant.
    Idle,
    /// Moving towards the target.
    Moving,
}

/// Sine-curve ramp.
///
/// For a ramp started at value `start` towards `target` over `total` samples, the
/// value after `k` steps is
///
/// `start + (target - start) * sin((k / total) * π/2)`
///
/// which is monotonic between the two end points, never overshoots, and lands on
/// `target` exactly after `total` steps. Starting a new ramp mid-flight begins from
/// the current value, so the output stays continuous.
#[derive(Copy, Clone, Debug)]
pub struct SineRamp {
    start:   f64,
    target:  f64,
    value:   f64,
    elapsed: u64,
    total:   u64,
    stage:   RampStage,
}

impl SineRamp {
    /// A ramp resting at `value`.
    #[inline]
    pub fn new(value: f64) -> Self {
        Self {
            start: value,
            target: value,
            value,
            elapsed: 0,
            total: 0,
            stage: RampStage::Idle,
        }
    }

    /// Start moving from the current value to `target` over `samples` steps.
    ///
    /// `samples == 0` jumps straight to the target.
    #[inline]
    pub fn start_to(&mut self, target: f64, samples: u64) {
        self.start = self.value;
        self.target = target;
        self.elapsed = 0;
        self.total = samples;
        if samples == 0 || self.start == target {
            self.jump_to(target);
        } else {
            self.stage = RampStage::Moving;
        }
    }

    /// Set the value immediately and stop moving.
    #[inline]
    pub fn jump_to(&mut self, value: f64) {
        self.start = value;
        self.target = value;
        self.value = value;
        self.elapsed = 0;
        self.total = 0;
        self.stage = RampStage::Idle;
    }

    /// Advance by one sample and return the new value.
    #[inline]
    pub fn next(&mut self) -> f64 {
        if self.stage == RampStage::Moving {
            self.elapsed += 1;
            if self.elapsed >= self.total {
                self.value = self.target;
                self.stage = RampStage::Idle;
            } else {
                let f = self.elapsed as f64 / self.total as f64;
                let v = self.start + (self.target - self.start) * sine_ease(f);
                // keep rounding from stepping past either end
                let (lo, hi) = if self.start <= self.target {
                    (self.start, self.target)
                } else {
                    (self.target, self.start)
                };
                self.value = clamp(v, lo, hi);
            }
        }
        self.value
    }

    #[inline] pub fn value(&self) -> f64 { self.value }
    #[inline] pub fn target(&self) -> f64 { self.target }
    #[inline] pub fn stage(&self) -> RampStage { self.stage }
    #[inline] pub fn is_moving(&self) -> bool { self.stage == RampStage::Moving }

    /// Steps left until the target is reached.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.elapsed)
    }
}

impl Default for SineRamp {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ------------------------------------ Tests --------------------------------------
