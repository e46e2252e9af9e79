//! Bitmap sampling: turning an image into particle attributes.
//!
//! Every pixel whose red channel is strictly above the culling threshold
//! becomes one particle. Darker pixels are never allocated; the decision is
//! made once, here, and not revisited per frame.
//!
//! # Coordinate convention
//!
//! Pixels are read in the bitmap's native row order (top row first), but the
//! produced geometry is y-up: native row `r` becomes field row
//! `y = height - 1 - r`, so field row 0 is the *bottom* of the image. This is
//! the only vertical flip in the pipeline. The particle shader undoes it when
//! it samples the (top-row-first) source texture.
//!
//! # Example
//!
//! ```ignore
//! let bitmap = Bitmap::from_file("logo.png")?;
//! let attributes = sample(&bitmap, 34, &mut rand::thread_rng());
//! println!("{} of {} pixels survive", attributes.num_visible(), bitmap.pixel_count());
//! ```

use std::f32::consts::PI;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use rand::Rng;

use crate::error::DecodeError;

/// A decoded RGBA8 image, rows stored top to bottom.
#[derive(Debug, Clone)]
pub struct Bitmap {
    /// Raw RGBA pixel data (width * height * 4 bytes).
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Bitmap {
    /// Create a bitmap from raw RGBA data.
    ///
    /// Fails if the buffer length does not match the dimensions or if either
    /// dimension is zero.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(DecodeError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// Decode an image file (PNG or JPEG).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_encoded(&bytes)
    }

    /// Decode an in-memory encoded image.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, DecodeError> {
        let img = image::load_from_memory(bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        Self::from_rgba(img.into_raw(), width, height)
    }

    /// Create a bitmap filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, DecodeError> {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::from_rgba(data, width, height)
    }

    /// Create a horizontal gradient from `start` to `end`, identical on every row.
    pub fn gradient(width: u32, height: u32, start: [u8; 4], end: [u8; 4]) -> Result<Self, DecodeError> {
        let mut row = Vec::with_capacity(width as usize * 4);
        for x in 0..width {
            let t = x as f32 / (width.saturating_sub(1)).max(1) as f32;
            for c in 0..4 {
                row.push(lerp_u8(start[c], end[c], t));
            }
        }
        let data = row.repeat(height as usize);
        Self::from_rgba(data, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw RGBA bytes, top row first.
    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value at native coordinates (row 0 is the top of the image).
    pub fn pixel(&self, x: u32, row: u32) -> [u8; 4] {
        let i = (row as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    let a = a as f32;
    let b = b as f32;
    (a + (b - a) * t).round() as u8
}

/// One particle as uploaded to the GPU instance buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub pixel_index: u32,
    pub offset: [f32; 3],
    pub angle: f32,
}

/// Culled per-particle attributes for one image.
///
/// The three arrays are parallel and always have the same length.
#[derive(Debug, Clone, Default)]
pub struct ParticleAttributes {
    /// Source image width in pixels.
    pub width: u32,
    /// Source image height in pixels.
    pub height: u32,
    /// Linear index `y * width + x` in the y-up field convention.
    pub pixel_indices: Vec<u32>,
    /// Integer pixel coordinates `(x, y, 0)`, y-up.
    pub offsets: Vec<[i32; 3]>,
    /// Fixed random phase per particle, in `[0, π)`.
    pub angles: Vec<f32>,
}

impl ParticleAttributes {
    /// Number of surviving particles.
    pub fn num_visible(&self) -> usize {
        self.pixel_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_indices.is_empty()
    }

    /// Interleave the parallel arrays into GPU instance records.
    pub fn to_instances(&self) -> Vec<ParticleInstance> {
        self.pixel_indices
            .iter()
            .zip(&self.offsets)
            .zip(&self.angles)
            .map(|((&pixel_index, offset), &angle)| ParticleInstance {
                pixel_index,
                offset: [offset[0] as f32, offset[1] as f32, offset[2] as f32],
                angle,
            })
            .collect()
    }
}

/// Build the culled attribute set for `bitmap`.
///
/// A pixel survives iff its red channel is strictly greater than `threshold`.
/// Angles are drawn from `rng`, one per survivor.
pub fn sample<R: Rng + ?Sized>(bitmap: &Bitmap, threshold: u8, rng: &mut R) -> ParticleAttributes {
    let width = bitmap.width;
    let height = bitmap.height;

    let mut attributes = ParticleAttributes {
        width,
        height,
        ..Default::default()
    };

    for (i, px) in bitmap.data.chunks_exact(4).enumerate() {
        if px[0] <= threshold {
            continue;
        }

        let x = i as u32 % width;
        let row = i as u32 / width;
        let y = height - 1 - row;

        attributes.pixel_indices.push(y * width + x);
        attributes.offsets.push([x as i32, y as i32, 0]);
        attributes.angles.push(rng.gen_range(0.0..PI));
    }

    tracing::debug!(
        width,
        height,
        threshold,
        visible = attributes.num_visible(),
        "sampled bitmap"
    );

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// 4x3 image whose red channel is `x * 20 + row * 30`.
    fn ramp() -> Bitmap {
        let (w, h) = (4u32, 3u32);
        let mut data = Vec::new();
        for row in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[(x * 20 + row * 30) as u8, 0, 0, 255]);
            }
        }
        Bitmap::from_rgba(data, w, h).unwrap()
    }

    // ========== Bitmap Tests ==========

    #[test]
    fn test_from_rgba_rejects_mismatch() {
        let err = Bitmap::from_rgba(vec![0; 12], 2, 2).unwrap_err();
        assert!(matches!(err, DecodeError::SizeMismatch { expected: 16, actual: 12, .. }));
    }

    #[test]
    fn test_from_rgba_rejects_empty() {
        let err = Bitmap::from_rgba(Vec::new(), 0, 0).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyImage { .. }));
    }

    #[test]
    fn test_from_encoded_rejects_garbage() {
        let err = Bitmap::from_encoded(b"definitely not a png").unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Bitmap::from_file("/nonexistent/pointfield/missing.png").unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }

    #[test]
    fn test_gradient_endpoints() {
        let bitmap = Bitmap::gradient(5, 2, [0, 0, 0, 255], [200, 100, 50, 255]).unwrap();
        assert_eq!(bitmap.pixel(0, 1), [0, 0, 0, 255]);
        assert_eq!(bitmap.pixel(4, 0), [200, 100, 50, 255]);
        assert_eq!(bitmap.pixel(2, 0)[0], 100);
    }

    // ========== Sampling Tests ==========

    #[test]
    fn test_threshold_partition_is_exhaustive() {
        let bitmap = ramp();
        let threshold = 45;
        let attributes = sample(&bitmap, threshold, &mut rng());

        assert!(attributes.num_visible() <= bitmap.pixel_count());

        let kept: HashSet<u32> = attributes.pixel_indices.iter().copied().collect();
        for row in 0..bitmap.height() {
            for x in 0..bitmap.width() {
                let y = bitmap.height() - 1 - row;
                let index = y * bitmap.width() + x;
                let red = bitmap.pixel(x, row)[0];
                assert_eq!(kept.contains(&index), red > threshold, "pixel ({x}, {row})");
            }
        }
    }

    #[test]
    fn test_pixel_indices_unique_and_exact() {
        let bitmap = ramp();
        let attributes = sample(&bitmap, 0, &mut rng());

        let expected: HashSet<u32> = (0..bitmap.height())
            .flat_map(|row| (0..bitmap.width()).map(move |x| (x, row)))
            .filter(|&(x, row)| bitmap.pixel(x, row)[0] > 0)
            .map(|(x, row)| (bitmap.height() - 1 - row) * bitmap.width() + x)
            .collect();
        let got: HashSet<u32> = attributes.pixel_indices.iter().copied().collect();

        assert_eq!(got.len(), attributes.num_visible());
        assert_eq!(got, expected);
    }

    #[test]
    fn test_vertical_flip() {
        // Only the top-left pixel is bright.
        let mut data = vec![0u8; 3 * 2 * 4];
        data[0] = 255;
        let bitmap = Bitmap::from_rgba(data, 3, 2).unwrap();

        let attributes = sample(&bitmap, 34, &mut rng());
        assert_eq!(attributes.num_visible(), 1);
        // Top row of the image lands on field row height - 1.
        assert_eq!(attributes.offsets[0], [0, 1, 0]);
        assert_eq!(attributes.pixel_indices[0], 3);
    }

    #[test]
    fn test_offsets_match_indices() {
        let bitmap = ramp();
        let attributes = sample(&bitmap, 10, &mut rng());
        for (index, offset) in attributes.pixel_indices.iter().zip(&attributes.offsets) {
            assert_eq!(*index as i32, offset[1] * bitmap.width() as i32 + offset[0]);
            assert_eq!(offset[2], 0);
        }
    }

    #[test]
    fn test_angles_in_half_turn() {
        let bitmap = Bitmap::solid(16, 16, [255, 255, 255, 255]).unwrap();
        let attributes = sample(&bitmap, 34, &mut rng());
        assert_eq!(attributes.angles.len(), 256);
        assert!(attributes.angles.iter().all(|a| (0.0..PI).contains(a)));
    }

    #[test]
    fn test_all_black_yields_empty_buffer() {
        let bitmap = Bitmap::solid(8, 8, [0, 0, 0, 255]).unwrap();
        let attributes = sample(&bitmap, 34, &mut rng());
        assert!(attributes.is_empty());
        assert!(attributes.to_instances().is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        let bitmap = Bitmap::solid(2, 2, [34, 255, 255, 255]).unwrap();
        assert_eq!(sample(&bitmap, 34, &mut rng()).num_visible(), 0);
        assert_eq!(sample(&bitmap, 33, &mut rng()).num_visible(), 4);
    }

    #[test]
    fn test_instances_interleave() {
        let bitmap = ramp();
        let attributes = sample(&bitmap, 50, &mut rng());
        let instances = attributes.to_instances();
        assert_eq!(instances.len(), attributes.num_visible());
        for (i, inst) in instances.iter().enumerate() {
            assert_eq!(inst.pixel_index, attributes.pixel_indices[i]);
            assert_eq!(inst.offset[0], attributes.offsets[i][0] as f32);
            assert_eq!(inst.angle, attributes.angles[i]);
        }
    }
}
