//! Window input and the pointer-to-field bridge.
//!
//! [`Input`] folds winit window events into per-frame state: keys that went
//! down this frame and the latest cursor position in normalized device
//! coordinates. [`hit_uv`] turns that position into a `(u, v)` coordinate on
//! a field's hit area by casting a ray through the camera and intersecting
//! the `z = 0` plane.
//!
//! ```ignore
//! if let Some(ndc) = input.cursor_moved() {
//!     let uv = hit_uv(ndc, view_proj, hit_area, fit_scale);
//!     if let Some(uv) = uv {
//!         controller.on_pointer_move(uv);
//!     }
//! }
//! ```

use std::collections::HashSet;

use glam::{Mat4, Vec2, Vec3};
use winit::event::{ElementState, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Per-frame keyboard and cursor state.
#[derive(Debug, Default)]
pub struct Input {
    keys_held: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    cursor_ndc: Option<Vec2>,
    cursor_moved: bool,
    window_size: (u32, u32),
}

impl Input {
    pub fn new() -> Self {
        Self {
            window_size: (800, 600),
            ..Default::default()
        }
    }

    /// Whether `key` went down this frame. Auto-repeat does not count.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// Cursor position in NDC (-1 to 1, y up), if it is over the window.
    pub fn cursor_ndc(&self) -> Option<Vec2> {
        self.cursor_ndc
    }

    /// Cursor position if it moved this frame.
    pub fn cursor_moved(&self) -> Option<Vec2> {
        if self.cursor_moved {
            self.cursor_ndc
        } else {
            None
        }
    }

    /// Clear per-frame state. Call once per frame after handling input.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.cursor_moved = false;
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            if self.keys_held.insert(key) {
                                self.keys_pressed.insert(key);
                            }
                        }
                        ElementState::Released => {
                            self.keys_held.remove(&key);
                        }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_ndc = screen_to_ndc(
                    Vec2::new(position.x as f32, position.y as f32),
                    self.window_size,
                );
                self.cursor_moved = self.cursor_ndc.is_some();
            }
            WindowEvent::Touch(touch) if matches!(touch.phase, TouchPhase::Started | TouchPhase::Moved) => {
                self.cursor_ndc = screen_to_ndc(
                    Vec2::new(touch.location.x as f32, touch.location.y as f32),
                    self.window_size,
                );
                self.cursor_moved = self.cursor_ndc.is_some();
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor_ndc = None;
            }
            _ => {}
        }
    }
}

/// Convert a pixel position to NDC. `None` for a zero-sized window.
pub fn screen_to_ndc(position: Vec2, (width, height): (u32, u32)) -> Option<Vec2> {
    if width == 0 || height == 0 {
        return None;
    }
    Some(Vec2::new(
        (position.x / width as f32) * 2.0 - 1.0,
        1.0 - (position.y / height as f32) * 2.0,
    ))
}

/// Intersect the camera ray through `ndc` with a centered `hit_area` on the
/// `z = 0` plane scaled by `fit_scale` in x and y.
///
/// Returns the hit as `(u, v)` with `v = 1` at the top edge, or `None` if the
/// ray misses the area.
pub fn hit_uv(ndc: Vec2, view_proj: Mat4, hit_area: Vec2, fit_scale: f32) -> Option<Vec2> {
    let size = hit_area * fit_scale;
    if size.x <= 0.0 || size.y <= 0.0 {
        return None;
    }

    let inverse = view_proj.inverse();
    let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
    let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
    let direction = far - near;
    if direction.z.abs() < f32::EPSILON {
        return None;
    }

    let t = -near.z / direction.z;
    if t < 0.0 {
        return None;
    }
    let hit = near + direction * t;

    let uv = Vec2::new(hit.x / size.x + 0.5, hit.y / size.y + 0.5);
    if (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y) {
        Some(uv)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::Camera;

    #[test]
    fn test_screen_to_ndc() {
        let ndc = screen_to_ndc(Vec2::new(400.0, 300.0), (800, 600)).unwrap();
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);

        let corner = screen_to_ndc(Vec2::new(0.0, 0.0), (800, 600)).unwrap();
        assert_eq!(corner, Vec2::new(-1.0, 1.0));

        assert!(screen_to_ndc(Vec2::ZERO, (0, 600)).is_none());
    }

    #[test]
    fn test_center_hits_middle() {
        let camera = Camera::new();
        let view_proj = camera.view_proj(1.0);
        let uv = hit_uv(Vec2::ZERO, view_proj, Vec2::new(320.0, 240.0), 0.5).unwrap();
        assert!((uv - Vec2::splat(0.5)).length() < 1e-4);
    }

    #[test]
    fn test_top_edge_is_v_one() {
        let camera = Camera::new();
        let view_proj = camera.view_proj(1.0);
        let height = 200;
        let scale = camera.fit_scale(height);

        // The image fills the view vertically, so the top of the screen is
        // the top of the image.
        let uv = hit_uv(Vec2::new(0.0, 0.999), view_proj, Vec2::new(100.0, height as f32), scale).unwrap();
        assert!(uv.y > 0.99);
        let uv = hit_uv(Vec2::new(0.0, -0.999), view_proj, Vec2::new(100.0, height as f32), scale).unwrap();
        assert!(uv.y < 0.01);
    }

    #[test]
    fn test_miss_outside_area() {
        let camera = Camera::new();
        let view_proj = camera.view_proj(1.0);
        // A tiny area near the origin is missed by a ray through the corner.
        assert!(hit_uv(Vec2::new(0.9, 0.9), view_proj, Vec2::new(10.0, 10.0), 1.0).is_none());
        assert!(hit_uv(Vec2::ZERO, view_proj, Vec2::ZERO, 1.0).is_none());
    }

    #[test]
    fn test_begin_frame_clears_moves() {
        let mut input = Input::new();
        input.cursor_ndc = Some(Vec2::ZERO);
        input.cursor_moved = true;
        input.keys_pressed.insert(KeyCode::KeyN);
        input.keys_held.insert(KeyCode::KeyN);

        assert_eq!(input.cursor_moved(), Some(Vec2::ZERO));
        assert!(input.key_pressed(KeyCode::KeyN));

        input.begin_frame();
        assert_eq!(input.cursor_moved(), None);
        assert_eq!(input.cursor_ndc(), Some(Vec2::ZERO));
        assert!(!input.key_pressed(KeyCode::KeyN));
        assert!(input.key_held(KeyCode::KeyN));
    }
}
