//! # pointfield
//!
//! Render an image as a field of GPU points that scatter and settle, and that
//! are pushed around by the pointer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pointfield::prelude::*;
//!
//! let mut scene = Scene::new();
//! let mut controller = TransitionController::new(FieldConfig::default())
//!     .with_gallery(vec!["photo.png".into()]);
//! controller.set_view_height(Camera::new().visible_height());
//! controller.goto(0);
//!
//! // each frame
//! controller.update(delta, &mut scene);
//! controller.prepare_gpu(&device, &queue, format, view_proj)?;
//! controller.draw(&mut render_pass);
//! ```
//!
//! ## Pipeline
//!
//! 1. [`sampler`] culls an image's pixels by red channel and assigns each
//!    survivor a position and a random angle.
//! 2. [`field::ParticleField`] owns the culled instances, the live shader
//!    parameters and a [`touch::TouchTrail`], and creates GPU resources on
//!    the first frame after its decode finishes.
//! 3. [`transition::TransitionController`] sequences loads, entrance and exit
//!    sweeps, and teardown so that only one field is alive at a time.
//!
//! Image decoding is the only work done off the render thread.
//!
//! ## Parameters
//!
//! Every parameter has a closed range (see [`params::ParamName::range`]).
//! Writes are clamped rather than rejected:
//!
//! ```ignore
//! controller.set_parameter(ParamName::Density, 5.0); // stored as 3.0
//! controller.apply_effect_preset(EffectPreset::Dreamy);
//! ```
//!
//! Defaults, the culling threshold, trail settings and transition timings can
//! be overridden from a JSON file with [`FieldConfig::load`].

pub mod config;
pub mod easing;
pub mod error;
pub mod field;
pub mod gpu;
pub mod input;
pub mod loader;
pub mod params;
pub mod sampler;
pub mod scene;
pub mod touch;
pub mod transition;
pub mod window;

pub use config::{FieldConfig, TransitionConfig};
pub use error::{ConfigError, DecodeError, GpuError};
pub use field::{InitStatus, ParticleField};
pub use loader::{ImageRef, LoadedImage, PendingDecode};
pub use params::{ColorPreset, EffectPreset, FieldParams, ParamName, ParamValues, ParameterStore};
pub use sampler::{Bitmap, ParticleAttributes, ParticleInstance};
pub use scene::{NodeId, NodeKind, Scene, SceneNode};
pub use touch::{TouchConfig, TouchTrail};
pub use transition::{LifecycleEvent, LifecycleState, TransitionController};

pub use glam::{Mat4, Vec2, Vec3};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use pointfield::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{FieldConfig, TransitionConfig};
    pub use crate::error::{ConfigError, DecodeError, GpuError};
    pub use crate::field::{InitStatus, ParticleField};
    pub use crate::gpu::{Camera, GpuContext};
    pub use crate::input::{hit_uv, Input};
    pub use crate::loader::ImageRef;
    pub use crate::params::{ColorPreset, EffectPreset, ParamName, ParamValues};
    pub use crate::sampler::Bitmap;
    pub use crate::scene::Scene;
    pub use crate::touch::TouchConfig;
    pub use crate::transition::{LifecycleEvent, LifecycleState, TransitionController};
    pub use crate::{Mat4, Vec2, Vec3};
}
