//! Easing curves and deterministic value sweeps.
//!
//! A [`Tween`] interpolates one scalar from a start to an end value over a
//! fixed duration, advanced explicitly by elapsed time. There is no clock
//! inside: the same sequence of `advance` calls always produces the same
//! values.

use std::f32::consts::PI;

/// Easing curve mapping normalized progress `t ∈ [0, 1]` to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ease {
    Linear,
    /// Quadratic deceleration.
    #[default]
    QuadOut,
    /// Cubic acceleration.
    CubicIn,
    CubicInOut,
    /// Quartic deceleration.
    QuartOut,
    QuartInOut,
    SineInOut,
}

impl Ease {
    pub fn sample(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Ease::CubicIn => t * t * t,
            Ease::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Ease::QuartOut => 1.0 - (1.0 - t).powi(4),
            Ease::QuartInOut => {
                if t < 0.5 {
                    8.0 * t.powi(4)
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
                }
            }
            Ease::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
        }
    }
}

/// Time-based interpolation of a single value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    from: f32,
    to: f32,
    duration: f32,
    ease: Ease,
    elapsed: f32,
}

impl Tween {
    /// A sweep from `from` to `to` lasting `duration` seconds.
    ///
    /// A non-positive duration is finished immediately.
    pub fn new(from: f32, to: f32, duration: f32, ease: Ease) -> Self {
        Self {
            from,
            to,
            duration: duration.max(0.0),
            ease,
            elapsed: 0.0,
        }
    }

    /// Advance by `delta` seconds and return the new value.
    pub fn advance(&mut self, delta: f32) -> f32 {
        if delta.is_finite() && delta > 0.0 {
            self.elapsed = (self.elapsed + delta).min(self.duration);
        }
        self.value()
    }

    /// Normalized progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.duration <= f32::EPSILON {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn value(&self) -> f32 {
        let progress = self.progress();
        if progress >= 1.0 {
            return self.to;
        }
        self.from + (self.to - self.from) * self.ease.sample(progress)
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }

    /// Jump straight to `value` and finish.
    pub fn settle(&mut self, value: f32) {
        self.from = value;
        self.to = value;
        self.elapsed = self.duration;
    }
}
