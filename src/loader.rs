//! Background image decoding.
//!
//! Decoding and sampling a large image can take longer than a frame, so it
//! runs on a worker thread. The render loop polls the returned
//! [`PendingDecode`] once per tick; the result (or the error) is picked up on
//! whichever tick it becomes available. A decode that fails never produces a
//! partial particle buffer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::error::DecodeError;
use crate::sampler::{self, Bitmap, ParticleAttributes};

/// Where an image comes from.
#[derive(Debug, Clone)]
pub enum ImageRef {
    /// An image file on disk.
    Path(PathBuf),
    /// Encoded image bytes (PNG/JPEG) already in memory.
    Bytes(Arc<[u8]>),
    /// An already decoded bitmap.
    Bitmap(Arc<Bitmap>),
}

impl ImageRef {
    /// Short human-readable description for logs.
    pub fn label(&self) -> String {
        match self {
            ImageRef::Path(path) => path.display().to_string(),
            ImageRef::Bytes(bytes) => format!("<{} encoded bytes>", bytes.len()),
            ImageRef::Bitmap(bitmap) => format!("<{}x{} bitmap>", bitmap.width(), bitmap.height()),
        }
    }

    /// Decode synchronously.
    pub fn decode(&self) -> Result<Bitmap, DecodeError> {
        match self {
            ImageRef::Path(path) => Bitmap::from_file(path),
            ImageRef::Bytes(bytes) => Bitmap::from_encoded(bytes),
            ImageRef::Bitmap(bitmap) => Ok(Bitmap::clone(bitmap)),
        }
    }
}

impl From<&str> for ImageRef {
    fn from(path: &str) -> Self {
        ImageRef::Path(PathBuf::from(path))
    }
}

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        ImageRef::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        ImageRef::Path(path)
    }
}

impl From<Bitmap> for ImageRef {
    fn from(bitmap: Bitmap) -> Self {
        ImageRef::Bitmap(Arc::new(bitmap))
    }
}

/// A decoded image together with its culled particle attributes.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bitmap: Bitmap,
    pub attributes: ParticleAttributes,
}

/// Decode and sample on the calling thread.
pub fn load_blocking(image: &ImageRef, threshold: u8) -> Result<LoadedImage, DecodeError> {
    let bitmap = image.decode()?;
    let attributes = sampler::sample(&bitmap, threshold, &mut rand::thread_rng());
    Ok(LoadedImage { bitmap, attributes })
}

/// An in-flight decode running on a worker thread.
#[derive(Debug)]
pub struct PendingDecode {
    label: String,
    rx: Receiver<Result<LoadedImage, DecodeError>>,
    done: bool,
}

impl PendingDecode {
    /// Start decoding `image` in the background.
    pub fn spawn(image: ImageRef, threshold: u8) -> Self {
        let label = image.label();
        let (tx, rx) = bounded(1);
        let fallback = tx.clone();

        let spawned = thread::Builder::new()
            .name("pointfield-decode".into())
            .spawn(move || {
                let result = load_blocking(&image, threshold);
                // The receiver may have been dropped if the field was destroyed.
                let _ = tx.send(result);
            });

        if let Err(err) = spawned {
            tracing::warn!(image = %label, error = %err, "failed to spawn decode worker");
            let _ = fallback.send(Err(DecodeError::Spawn(err)));
        }

        tracing::debug!(image = %label, threshold, "image decode started");
        Self {
            label,
            rx,
            done: false,
        }
    }

    /// Non-blocking check for the result. Returns `Some` exactly once.
    pub fn poll(&mut self) -> Option<Result<LoadedImage, DecodeError>> {
        if self.done {
            return None;
        }
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(DecodeError::WorkerLost),
        };
        self.done = true;
        Some(result)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
