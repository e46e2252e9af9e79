//! Fixed perspective camera looking down -Z at the field.

use glam::{Mat4, Vec3};

/// Perspective camera on the +Z axis looking at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    /// Distance from the origin along +Z.
    pub distance: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            fov_y: 50.0,
            distance: 300.0,
            near: 1.0,
            far: 10_000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, self.distance)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::Y)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y.to_radians(), aspect, self.near, self.far);
        proj * self.view_matrix()
    }

    /// World-space height visible at the origin plane.
    pub fn visible_height(&self) -> f32 {
        2.0 * (self.fov_y.to_radians() / 2.0).tan() * self.distance
    }

    /// Scale that makes an image `image_height` pixels tall fill the view
    /// vertically. Returns 1.0 for a zero height.
    pub fn fit_scale(&self, image_height: u32) -> f32 {
        if image_height == 0 {
            return 1.0;
        }
        self.visible_height() / image_height as f32
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_height() {
        let camera = Camera::new();
        let expected = 2.0 * 25.0_f32.to_radians().tan() * 300.0;
        assert!((camera.visible_height() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_fit_scale() {
        let camera = Camera::new();
        let scale = camera.fit_scale(320);
        assert!((scale * 320.0 - camera.visible_height()).abs() < 1e-3);
        assert_eq!(camera.fit_scale(0), 1.0);
    }

    #[test]
    fn test_origin_projects_to_center() {
        let camera = Camera::new();
        let clip = camera.view_proj(16.0 / 9.0) * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    }
}
