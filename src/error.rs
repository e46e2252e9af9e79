//! Error types for pointfield.
//!
//! Decoding failures are reported through the loader's completion and the
//! controller's lifecycle events; they never reach the render loop as a
//! panic. Out-of-range parameter writes are not errors at all (they are
//! clamped), and calls made before a field is ready are silent no-ops.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while turning an image reference into particles.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Failed to read the image file from disk.
    #[error("failed to read image '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The bytes could not be parsed as a supported image format.
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    /// The image has a zero width or height.
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    /// Raw RGBA data does not match the declared dimensions.
    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    /// The decode worker thread could not be started.
    #[error("failed to start image decode worker: {0}")]
    Spawn(#[source] std::io::Error),
    /// The decode worker exited without reporting a result.
    #[error("image decode worker exited without a result")]
    WorkerLost,
}

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// The source image exceeds the device's 2D texture limit.
    #[error("image is {width}x{height}, device supports at most {max}x{max}")]
    TextureTooLarge { width: u32, height: u32, max: u32 },
}

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_messages() {
        let err = DecodeError::EmptyImage { width: 0, height: 4 };
        assert_eq!(err.to_string(), "image has no pixels (0x4)");

        let err = DecodeError::SizeMismatch {
            width: 2,
            height: 2,
            expected: 16,
            actual: 12,
        };
        assert!(err.to_string().contains("expected 16"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;

        let err = DecodeError::Io {
            path: PathBuf::from("missing.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "nope"),
        };
        assert!(err.to_string().contains("missing.png"));
        assert!(err.source().is_some());
    }
}
