//! Pointer trail rasterized into a small single-channel texture.
//!
//! Pointer moves arrive as normalized `(u, v)` coordinates on the field. Each
//! becomes a [`TrailPoint`] that ages by one tick per [`TouchTrail::update`]
//! and is drawn as a soft radial falloff whose strength follows a
//! rise/hold/decay envelope. The particle shader samples the resulting
//! raster to push particles around.
//!
//! The raster is square, `size x size`, stored top row first: a point at
//! `v = 1` lands on row 0.
//!
//! # Example
//!
//! ```ignore
//! let mut trail = TouchTrail::new(TouchConfig::default());
//! trail.add_touch(Vec2::new(0.40, 0.5));
//! trail.add_touch(Vec2::new(0.45, 0.5));
//! trail.update();
//! queue.write_texture(/* ... */, trail.pixels(), /* ... */);
//! ```

use std::f32::consts::PI;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::params::{ParamName, ParamValues};

/// Gain applied to the squared distance between consecutive points.
const FORCE_GAIN: f32 = 10_000.0;
/// Gain applied to a point's force when scaling its intensity.
const FORCE_INTENSITY_GAIN: f32 = 1.5;
/// Peak opacity of a point at full intensity.
const PEAK_ALPHA: f32 = 0.4;
/// Radial gradient stops as `(distance / radius, relative alpha)`.
const GRADIENT_STOPS: [(f32, f32); 4] = [(0.0, 1.0), (0.4, 0.6), (0.8, 0.2), (1.0, 0.0)];

/// End of the rise phase, as a fraction of `max_age`.
pub const RISE_END: f32 = 0.2;
/// Start of the decay phase, as a fraction of `max_age`.
pub const DECAY_START: f32 = 0.7;

/// Largest raster edge accepted; bigger sizes are clamped down to it.
pub const MAX_SIZE: u32 = 2048;

/// Trail raster settings.
///
/// The radius is not here: it is the `touch_radius` parameter, seeded from
/// the configured defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TouchConfig {
    /// Raster edge length in pixels, at most [`MAX_SIZE`].
    pub size: u32,
    /// Ticks a point lives before eviction.
    pub max_age: u32,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self { size: 128, max_age: 180 }
    }
}

impl TouchConfig {
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.clamp(1, MAX_SIZE);
        self
    }

    pub fn with_max_age(mut self, max_age: u32) -> Self {
        self.max_age = max_age.max(1);
        self
    }
}

/// One recorded pointer sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub u: f32,
    pub v: f32,
    pub age: u32,
    /// Derived from the distance to the previous point; fixed at creation.
    pub force: f32,
}

/// Ease-out rise over the first phase. `t` is the normalized age.
pub fn envelope_rise(t: f32) -> f32 {
    let s = t / RISE_END;
    s * (2.0 - s)
}

/// Ease-in-out fall over the last phase. `t` is the normalized age.
pub fn envelope_decay(t: f32) -> f32 {
    let s = 1.0 - (t - DECAY_START) / (1.0 - DECAY_START);
    -((PI * s).cos() - 1.0) / 2.0
}

/// Three-phase intensity envelope over normalized age.
pub fn envelope(t: f32) -> f32 {
    if t < RISE_END {
        envelope_rise(t)
    } else if t < DECAY_START {
        1.0
    } else {
        envelope_decay(t.min(1.0))
    }
}

fn gradient(d: f32) -> f32 {
    for pair in GRADIENT_STOPS.windows(2) {
        let (d0, a0) = pair[0];
        let (d1, a1) = pair[1];
        if d <= d1 {
            let t = ((d - d0) / (d1 - d0)).clamp(0.0, 1.0);
            return a0 + (a1 - a0) * t;
        }
    }
    0.0
}

/// Decaying trail of pointer samples and its raster.
#[derive(Debug, Clone)]
pub struct TouchTrail {
    size: u32,
    max_age: u32,
    radius: f32,
    trail: Vec<TrailPoint>,
    coverage: Vec<f32>,
    pixels: Vec<u8>,
    dirty: bool,
}

impl TouchTrail {
    pub fn new(config: TouchConfig) -> Self {
        if config.size > MAX_SIZE {
            tracing::warn!(size = config.size, max = MAX_SIZE, "touch raster size clamped");
        }
        let size = config.size.clamp(1, MAX_SIZE);
        let len = size as usize * size as usize;
        Self {
            size,
            max_age: config.max_age.max(1),
            radius: ParamValues::default().touch_radius,
            trail: Vec::new(),
            coverage: vec![0.0; len],
            pixels: vec![0; len],
            dirty: true,
        }
    }

    /// Record a pointer sample at `uv`.
    ///
    /// The first point of an empty trail has zero force; later points get
    /// `min(dd * 10000, 1)` where `dd` is the squared distance to the previous
    /// point, so fast strokes hit harder than slow ones. A lone first touch
    /// therefore draws nothing: the pointer has to move before the raster
    /// shows anything.
    pub fn add_touch(&mut self, uv: Vec2) {
        let force = match self.trail.last() {
            Some(last) => {
                let dd = Vec2::new(last.u, last.v).distance_squared(uv);
                (dd * FORCE_GAIN).min(1.0)
            }
            None => 0.0,
        };
        self.trail.push(TrailPoint {
            u: uv.x,
            v: uv.y,
            age: 0,
            force,
        });
    }

    /// Age, evict, and redraw. Call once per tick.
    pub fn update(&mut self) {
        let max_age = self.max_age;
        for point in &mut self.trail {
            point.age += 1;
        }
        self.trail.retain(|point| point.age <= max_age);

        self.coverage.fill(0.0);
        for i in 0..self.trail.len() {
            let point = self.trail[i];
            self.draw_point(&point);
        }

        for (px, c) in self.pixels.iter_mut().zip(&self.coverage) {
            *px = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        self.dirty = true;
    }

    /// Final intensity of `point`: envelope times capped force.
    pub fn intensity(&self, point: &TrailPoint) -> f32 {
        let t = point.age as f32 / self.max_age as f32;
        envelope(t) * (point.force * FORCE_INTENSITY_GAIN).min(1.0)
    }

    fn draw_point(&mut self, point: &TrailPoint) {
        let size = self.size as f32;
        let cx = point.u * size;
        let cy = (1.0 - point.v) * size;

        let intensity = self.intensity(point);
        let radius = (size * self.radius * intensity).max(1.0);
        let alpha = intensity * PEAK_ALPHA;
        if alpha <= 0.0 {
            return;
        }

        let x0 = (cx - radius).floor().max(0.0) as u32;
        let y0 = (cy - radius).floor().max(0.0) as u32;
        let x1 = ((cx + radius).ceil().max(0.0) as u32).min(self.size);
        let y1 = ((cy + radius).ceil().max(0.0) as u32).min(self.size);

        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt() / radius;
                if d >= 1.0 {
                    continue;
                }
                let a = alpha * gradient(d);
                let cell = &mut self.coverage[y as usize * self.size as usize + x as usize];
                *cell = 1.0 - (1.0 - *cell) * (1.0 - a);
            }
        }
    }

    pub fn points(&self) -> &[TrailPoint] {
        &self.trail
    }

    pub fn len(&self) -> usize {
        self.trail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }

    /// Drop all points and blank the raster.
    pub fn clear(&mut self) {
        self.trail.clear();
        self.coverage.fill(0.0);
        self.pixels.fill(0);
        self.dirty = true;
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Set the full-intensity radius, clamped to the touch radius range.
    pub fn set_radius(&mut self, radius: f32) {
        if let Some(radius) = ParamName::TouchRadius.range().clamp(radius) {
            self.radius = radius;
        }
    }

    /// Raster as R8 bytes, top row first.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Raster value at `(x, y)` in `[0, 1]`.
    pub fn coverage_at(&self, x: u32, y: u32) -> f32 {
        self.coverage[y as usize * self.size as usize + x as usize]
    }

    /// Whether the raster changed since the last call; resets the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail() -> TouchTrail {
        TouchTrail::new(TouchConfig::default())
    }

    fn argmax(trail: &TouchTrail) -> (u32, u32, f32) {
        let mut best = (0, 0, 0.0);
        for y in 0..trail.size() {
            for x in 0..trail.size() {
                let c = trail.coverage_at(x, y);
                if c > best.2 {
                    best = (x, y, c);
                }
            }
        }
        best
    }

    // ========== Force Tests ==========

    #[test]
    fn test_first_touch_has_zero_force() {
        let mut trail = trail();
        trail.add_touch(Vec2::new(0.9, 0.1));
        assert_eq!(trail.points()[0].force, 0.0);
    }

    #[test]
    fn test_lone_first_touch_draws_nothing() {
        let mut trail = trail();
        trail.add_touch(Vec2::new(0.5, 0.5));
        for _ in 0..40 {
            trail.update();
        }
        assert_eq!(trail.len(), 1);
        assert!(trail.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_force_grows_with_distance_and_caps() {
        let mut forces = Vec::new();
        for step in [0.001, 0.002, 0.004, 0.008, 0.5] {
            let mut trail = trail();
            trail.add_touch(Vec2::new(0.5, 0.5));
            trail.add_touch(Vec2::new(0.5 + step, 0.5));
            forces.push(trail.points()[1].force);
        }
        assert!(forces.windows(2).all(|w| w[0] <= w[1]));
        assert!((forces[0] - 0.01).abs() < 1e-4);
        assert_eq!(*forces.last().unwrap(), 1.0);
    }

    // ========== Aging Tests ==========

    #[test]
    fn test_eviction_is_exact() {
        let mut trail = TouchTrail::new(TouchConfig::default().with_max_age(5));
        trail.add_touch(Vec2::new(0.2, 0.2));
        for tick in 1..=5 {
            trail.update();
            assert_eq!(trail.len(), 1, "tick {tick}");
            assert_eq!(trail.points()[0].age, tick);
        }
        trail.update();
        assert!(trail.is_empty());
    }

    #[test]
    fn test_eviction_keeps_younger_points() {
        let mut trail = TouchTrail::new(TouchConfig::default().with_max_age(3));
        trail.add_touch(Vec2::new(0.1, 0.1));
        trail.update();
        trail.update();
        trail.add_touch(Vec2::new(0.2, 0.2));
        trail.add_touch(Vec2::new(0.3, 0.3));
        trail.update();
        trail.update();
        assert_eq!(trail.len(), 2);
        assert!(trail.points().iter().all(|p| p.age == 2));
    }

    // ========== Envelope Tests ==========

    #[test]
    fn test_envelope_continuous_at_boundaries() {
        assert!((envelope_rise(RISE_END) - 1.0).abs() < 1e-6);
        assert!((envelope_decay(DECAY_START) - 1.0).abs() < 1e-6);
        assert!((envelope(RISE_END - 1e-4) - envelope(RISE_END)).abs() < 1e-2);
        assert!((envelope(DECAY_START - 1e-4) - envelope(DECAY_START)).abs() < 1e-2);
    }

    #[test]
    fn test_envelope_shape() {
        assert_eq!(envelope(0.0), 0.0);
        assert!(envelope(0.1) > 0.5);
        assert_eq!(envelope(0.45), 1.0);
        assert!(envelope(0.85) > 0.0 && envelope(0.85) < 1.0);
        assert!(envelope(1.0).abs() < 1e-6);
    }

    #[test]
    fn test_slow_touch_never_full_strength() {
        let trail = trail();
        let point = TrailPoint {
            u: 0.5,
            v: 0.5,
            age: 90,
            force: 0.2,
        };
        assert!((trail.intensity(&point) - 0.3).abs() < 1e-6);
    }

    // ========== Raster Tests ==========

    #[test]
    fn test_touch_centered_at_midpoint() {
        let mut trail = trail();
        trail.add_touch(Vec2::new(0.4, 0.5));
        trail.add_touch(Vec2::new(0.5, 0.5));
        trail.update();

        let (x, y, peak) = argmax(&trail);
        assert!(peak > 0.0);
        let half = trail.size() as i64 / 2;
        assert!((x as i64 - half).abs() <= 1, "x = {x}");
        assert!((y as i64 - half).abs() <= 1, "y = {y}");
        assert!(trail.pixels().iter().any(|&p| p > 0));
    }

    #[test]
    fn test_v_axis_points_up() {
        let mut trail = trail();
        trail.add_touch(Vec2::new(0.5, 0.5));
        trail.add_touch(Vec2::new(0.5, 0.9));
        for _ in 0..60 {
            trail.update();
        }
        let (_, y, _) = argmax(&trail);
        assert!(y < trail.size() / 4, "y = {y}");
    }

    #[test]
    fn test_raster_order_independent() {
        let points = [Vec2::new(0.30, 0.50), Vec2::new(0.35, 0.52), Vec2::new(0.40, 0.55)];

        let mut forward = trail();
        for p in points {
            forward.add_touch(p);
        }
        let mut reversed = forward.clone();
        reversed.trail.reverse();

        for _ in 0..40 {
            forward.update();
            reversed.update();
        }
        for (a, b) in forward.coverage.iter().zip(&reversed.coverage) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_resolution_independent() {
        let mut small = TouchTrail::new(TouchConfig::default().with_size(64));
        let mut large = TouchTrail::new(TouchConfig::default().with_size(256));
        for trail in [&mut small, &mut large] {
            trail.add_touch(Vec2::new(0.45, 0.5));
            trail.add_touch(Vec2::new(0.5, 0.5));
            for _ in 0..60 {
                trail.update();
            }
        }
        // Same relative location, a tenth of the raster right of the point.
        let s = small.coverage_at(38, 32);
        let l = large.coverage_at(153, 128);
        assert!(s > 0.0);
        assert!((s - l).abs() < 0.03, "{s} vs {l}");
    }

    #[test]
    fn test_update_clears_evicted_contribution() {
        let mut trail = TouchTrail::new(TouchConfig::default().with_max_age(4));
        trail.add_touch(Vec2::new(0.4, 0.5));
        trail.add_touch(Vec2::new(0.5, 0.5));
        trail.update();
        for _ in 0..4 {
            trail.update();
        }
        assert!(trail.is_empty());
        assert!(trail.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_dirty_flag() {
        let mut trail = trail();
        assert!(trail.take_dirty());
        assert!(!trail.take_dirty());
        trail.update();
        assert!(trail.take_dirty());
    }

    #[test]
    fn test_size_clamped_to_max() {
        let config = TouchConfig { size: 100_000, max_age: 10 };
        let trail = TouchTrail::new(config);
        assert_eq!(trail.size(), MAX_SIZE);
        assert_eq!(trail.pixels().len(), (MAX_SIZE * MAX_SIZE) as usize);
        assert_eq!(TouchConfig::default().with_size(0).size, 1);
    }

    #[test]
    fn test_default_radius() {
        assert_eq!(trail().radius(), ParamValues::default().touch_radius);
    }

    #[test]
    fn test_radius_clamped() {
        let mut trail = trail();
        trail.set_radius(3.0);
        assert_eq!(trail.radius(), 0.5);
    }
}
