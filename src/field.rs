//! A single image rendered as a field of points.
//!
//! A [`ParticleField`] goes through three states: uninitialized, pending (the
//! image is being decoded and sampled on a worker thread) and ready. Once
//! ready it owns a points node and an invisible hit-area node in the
//! [`Scene`], a live [`FieldParams`] set that shaders read every frame, and a
//! [`TouchTrail`] that feeds the displacement texture.
//!
//! GPU resources are created lazily by [`ParticleField::prepare_gpu`] on the
//! first frame after the field becomes ready, so everything else here works
//! without a device.
//!
//! # Example
//!
//! ```ignore
//! let mut scene = Scene::new();
//! let mut field = ParticleField::new(&FieldConfig::default());
//! field.init("photo.png".into());
//!
//! // each tick
//! match field.poll(&mut scene) {
//!     InitStatus::Ready => {
//!         field.update(delta);
//!         field.prepare_gpu(&device, &queue, format, view_proj)?;
//!     }
//!     InitStatus::Failed(err) => eprintln!("{err}"),
//!     _ => {}
//! }
//! ```

use glam::{Mat4, Vec2, Vec3};

use crate::config::FieldConfig;
use crate::error::{DecodeError, GpuError};
use crate::gpu::{FieldGpu, FieldUniforms};
use crate::loader::{self, ImageRef, LoadedImage, PendingDecode};
use crate::params::{FieldParams, ParamName, ParamValues};
use crate::sampler::{Bitmap, ParticleInstance};
use crate::scene::{NodeId, NodeKind, Scene, SceneNode};
use crate::touch::TouchTrail;

/// Outcome of [`ParticleField::poll`].
#[derive(Debug)]
pub enum InitStatus {
    /// `init` has not been called, or the field was destroyed.
    Idle,
    /// Decode still in flight.
    Pending,
    /// The field is ready. Returned on the completing tick and every tick after.
    Ready,
    /// Decode failed. Returned once; the field goes back to idle.
    Failed(DecodeError),
}

impl InitStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, InitStatus::Ready)
    }
}

enum GpuSlot {
    Unprepared,
    Prepared(FieldGpu),
    Failed,
}

struct ReadyField {
    bitmap: Bitmap,
    instances: Vec<ParticleInstance>,
    params: FieldParams,
    points: NodeId,
    hit_area: NodeId,
    gpu: GpuSlot,
}

enum FieldState {
    Uninit,
    Pending(PendingDecode),
    Ready(Box<ReadyField>),
    Destroyed,
}

/// One image's particle field.
pub struct ParticleField {
    threshold: u8,
    values: ParamValues,
    touch: TouchTrail,
    scale: f32,
    state: FieldState,
}

impl ParticleField {
    /// New field using the configured threshold, defaults and trail settings.
    pub fn new(config: &FieldConfig) -> Self {
        let mut touch = TouchTrail::new(config.touch);
        touch.set_radius(config.defaults.touch_radius);
        Self {
            threshold: config.threshold,
            values: config.defaults,
            touch,
            scale: 1.0,
            state: FieldState::Uninit,
        }
    }

    /// Use `values` instead of the configured defaults once the field is built.
    pub fn with_values(mut self, values: ParamValues) -> Self {
        self.touch.set_radius(values.touch_radius);
        self.values = values;
        self
    }
    /// Start decoding `image` in the background.
    ///
    /// Ignored unless the field is uninitialized.
    pub fn init(&mut self, image: ImageRef) {
        if !matches!(self.state, FieldState::Uninit) {
            tracing::debug!(image = %image.label(), "init ignored, field already initialized");
            return;
        }
        self.state = FieldState::Pending(PendingDecode::spawn(image, self.threshold));
    }

    /// Decode on the calling thread and build immediately.
    pub fn init_blocking(&mut self, image: &ImageRef, scene: &mut Scene) -> Result<(), DecodeError> {
        if !matches!(self.state, FieldState::Uninit) {
            tracing::debug!(image = %image.label(), "init ignored, field already initialized");
            return Ok(());
        }
        let loaded = loader::load_blocking(image, self.threshold)?;
        self.finish(loaded, scene);
        Ok(())
    }

    /// Pick up a finished decode and build the field.
    pub fn poll(&mut self, scene: &mut Scene) -> InitStatus {
        let pending = match &mut self.state {
            FieldState::Uninit | FieldState::Destroyed => return InitStatus::Idle,
            FieldState::Ready(_) => return InitStatus::Ready,
            FieldState::Pending(pending) => pending,
        };

        match pending.poll() {
            None => InitStatus::Pending,
            Some(Ok(loaded)) => {
                self.finish(loaded, scene);
                InitStatus::Ready
            }
            Some(Err(err)) => {
                tracing::warn!(image = %pending.label(), error = %err, "image load failed");
                self.state = FieldState::Uninit;
                InitStatus::Failed(err)
            }
        }
    }

    fn finish(&mut self, loaded: LoadedImage, scene: &mut Scene) {
        let LoadedImage { bitmap, attributes } = loaded;
        let instances = attributes.to_instances();
        let params = FieldParams::from_values(&self.values, bitmap.width(), bitmap.height());

        let scale = Vec3::new(self.scale, self.scale, 1.0);
        let mut points = SceneNode::new(NodeKind::Points {
            instances: instances.len() as u32,
        });
        points.scale = scale;
        let mut hit_area = SceneNode::new(NodeKind::HitArea {
            width: bitmap.width() as f32,
            height: bitmap.height() as f32,
        })
        .with_visible(false);
        hit_area.scale = scale;

        let points = scene.attach(points);
        let hit_area = scene.attach(hit_area);

        tracing::info!(
            width = bitmap.width(),
            height = bitmap.height(),
            num_visible = instances.len(),
            "particle field ready"
        );

        self.state = FieldState::Ready(Box::new(ReadyField {
            bitmap,
            instances,
            params,
            points,
            hit_area,
            gpu: GpuSlot::Unprepared,
        }));
    }

    /// Advance time and refresh the touch raster.
    pub fn update(&mut self, delta: f32) {
        let FieldState::Ready(ready) = &mut self.state else {
            tracing::trace!("update ignored, field not ready");
            return;
        };
        if delta.is_finite() {
            ready.params.time += delta;
        }
        self.touch.update();
    }

    /// Clamped write to a live parameter. `TouchRadius` goes to the trail.
    pub fn set_parameter(&mut self, name: ParamName, value: f32) {
        let FieldState::Ready(ready) = &mut self.state else {
            tracing::debug!(param = %name, "set_parameter ignored, field not ready");
            return;
        };
        match name {
            ParamName::TouchRadius => self.touch.set_radius(value),
            _ => ready.params.set(name, value),
        }
    }

    /// Overwrite every live parameter from `values`.
    pub fn set_values(&mut self, values: &ParamValues) {
        for name in ParamName::ALL {
            self.set_parameter(name, values.get(name));
        }
    }

    /// Scale the field uniformly in x and y.
    pub fn resize(&mut self, scene: &mut Scene, fit_scale: f32) {
        if !fit_scale.is_finite() || fit_scale <= 0.0 {
            tracing::debug!(fit_scale, "ignoring invalid fit scale");
            return;
        }
        self.scale = fit_scale;
        if let FieldState::Ready(ready) = &self.state {
            let scale = Vec3::new(fit_scale, fit_scale, 1.0);
            for id in [ready.points, ready.hit_area] {
                if let Some(node) = scene.get_mut(id) {
                    node.scale = scale;
                }
            }
        }
    }

    /// Record a pointer sample. Ignored before the field is ready.
    pub fn add_touch(&mut self, uv: Vec2) {
        if self.is_ready() {
            self.touch.add_touch(uv);
        }
    }

    /// Release GPU resources and detach from the scene. Safe to call twice.
    pub fn destroy(&mut self, scene: &mut Scene) {
        match std::mem::replace(&mut self.state, FieldState::Destroyed) {
            FieldState::Ready(ready) => {
                let ReadyField {
                    points,
                    hit_area,
                    gpu,
                    ..
                } = *ready;
                scene.detach(points);
                scene.detach(hit_area);
                if let GpuSlot::Prepared(gpu) = gpu {
                    gpu.destroy();
                }
                self.touch.clear();
                tracing::debug!("particle field destroyed");
            }
            FieldState::Pending(pending) => {
                tracing::debug!(image = %pending.label(), "particle field destroyed while loading");
            }
            FieldState::Uninit | FieldState::Destroyed => {}
        }
    }

    /// Create GPU resources if needed and upload this frame's uniforms and
    /// touch raster. Does nothing unless the field is ready.
    ///
    /// Returns an error once if the image cannot be uploaded; the field then
    /// stays undrawn.
    pub fn prepare_gpu(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        view_proj: Mat4,
    ) -> Result<(), GpuError> {
        let FieldState::Ready(ready) = &mut self.state else {
            return Ok(());
        };

        if matches!(ready.gpu, GpuSlot::Unprepared) {
            let max = device.limits().max_texture_dimension_2d;
            let source = (ready.bitmap.width(), ready.bitmap.height());
            if let Err(err) = check_texture_limits(source, self.touch.size(), max) {
                ready.gpu = GpuSlot::Failed;
                return Err(err);
            }
            let gpu = FieldGpu::new(
                device,
                queue,
                format,
                &ready.bitmap,
                &ready.instances,
                self.touch.size(),
            );
            ready.gpu = GpuSlot::Prepared(gpu);
        }

        if let GpuSlot::Prepared(gpu) = &ready.gpu {
            gpu.write_uniforms(queue, &FieldUniforms::new(&ready.params, view_proj, self.scale));
            if self.touch.take_dirty() {
                gpu.write_touch(queue, self.touch.pixels());
            }
        }
        Ok(())
    }

    /// Record this field's draw. No-op until GPU resources exist or when the
    /// field has no particles.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let FieldState::Ready(ready) = &self.state {
            if let GpuSlot::Prepared(gpu) = &ready.gpu {
                gpu.draw(pass);
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, FieldState::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, FieldState::Pending(_))
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self.state, FieldState::Destroyed)
    }

    /// Number of particles, 0 until ready.
    pub fn num_visible(&self) -> usize {
        match &self.state {
            FieldState::Ready(ready) => ready.instances.len(),
            _ => 0,
        }
    }

    pub fn instances(&self) -> &[ParticleInstance] {
        match &self.state {
            FieldState::Ready(ready) => &ready.instances,
            _ => &[],
        }
    }

    pub fn params(&self) -> Option<&FieldParams> {
        match &self.state {
            FieldState::Ready(ready) => Some(&ready.params),
            _ => None,
        }
    }

    /// Live parameters for transition sweeps.
    pub fn params_mut(&mut self) -> Option<&mut FieldParams> {
        match &mut self.state {
            FieldState::Ready(ready) => Some(&mut ready.params),
            _ => None,
        }
    }

    /// Source image size in pixels.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        match &self.state {
            FieldState::Ready(ready) => Some((ready.bitmap.width(), ready.bitmap.height())),
            _ => None,
        }
    }

    /// Unscaled hit-area dimensions.
    pub fn hit_area(&self) -> Option<Vec2> {
        self.image_size()
            .map(|(width, height)| Vec2::new(width as f32, height as f32))
    }

    /// Scene nodes as `(points, hit_area)`.
    pub fn nodes(&self) -> Option<(NodeId, NodeId)> {
        match &self.state {
            FieldState::Ready(ready) => Some((ready.points, ready.hit_area)),
            _ => None,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn touch(&self) -> &TouchTrail {
        &self.touch
    }

    pub fn touch_mut(&mut self) -> &mut TouchTrail {
        &mut self.touch
    }
}

/// Both textures a field uploads must fit the device's 2D limit.
fn check_texture_limits(source: (u32, u32), touch_size: u32, max: u32) -> Result<(), GpuError> {
    for (width, height) in [source, (touch_size, touch_size)] {
        if width > max || height > max {
            return Err(GpuError::TextureTooLarge { width, height, max });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_field(bitmap: Bitmap, scene: &mut Scene) -> ParticleField {
        let mut field = ParticleField::new(&FieldConfig::default());
        field.init_blocking(&bitmap.into(), scene).unwrap();
        field
    }

    // ========== Lifecycle Tests ==========

    #[test]
    fn test_poll_before_init_is_idle() {
        let mut scene = Scene::new();
        let mut field = ParticleField::new(&FieldConfig::default());
        assert!(matches!(field.poll(&mut scene), InitStatus::Idle));
        assert!(!field.is_ready());
        assert_eq!(field.num_visible(), 0);
    }

    #[test]
    fn test_async_init_attaches_nodes() {
        let mut scene = Scene::new();
        let mut field = ParticleField::new(&FieldConfig::default());
        field.init(Bitmap::solid(4, 3, [255, 255, 255, 255]).unwrap().into());
        assert!(field.is_pending());

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            match field.poll(&mut scene) {
                InitStatus::Ready => break,
                InitStatus::Pending => {
                    assert!(std::time::Instant::now() < deadline, "decode did not finish");
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                other => panic!("unexpected status {other:?}"),
            }
        }

        assert_eq!(field.num_visible(), 12);
        assert_eq!(scene.len(), 2);
        let (points, hit_area) = field.nodes().unwrap();
        assert!(scene.get(points).unwrap().visible);
        assert!(!scene.get(hit_area).unwrap().visible);
        assert_eq!(field.hit_area(), Some(Vec2::new(4.0, 3.0)));
        assert!(field.poll(&mut scene).is_ready());
    }

    #[test]
    fn test_failed_decode_reports_once() {
        let mut scene = Scene::new();
        let mut field = ParticleField::new(&FieldConfig::default());
        field.init("/nonexistent/pointfield/missing.png".into());

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            match field.poll(&mut scene) {
                InitStatus::Failed(err) => {
                    assert!(matches!(err, DecodeError::Io { .. }));
                    break;
                }
                InitStatus::Pending => {
                    assert!(std::time::Instant::now() < deadline);
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                other => panic!("unexpected status {other:?}"),
            }
        }
        assert!(matches!(field.poll(&mut scene), InitStatus::Idle));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_second_init_ignored() {
        let mut scene = Scene::new();
        let mut field = ready_field(Bitmap::solid(2, 2, [255; 4]).unwrap(), &mut scene);
        field.init(Bitmap::solid(8, 8, [255; 4]).unwrap().into());
        assert!(field.is_ready());
        assert_eq!(field.num_visible(), 4);
    }

    #[test]
    fn test_double_destroy() {
        let mut scene = Scene::new();
        let mut field = ready_field(Bitmap::solid(3, 3, [255; 4]).unwrap(), &mut scene);
        assert_eq!(scene.len(), 2);

        field.destroy(&mut scene);
        assert!(scene.is_empty());
        assert!(field.is_destroyed());

        field.destroy(&mut scene);
        assert!(scene.is_empty());
        assert!(field.is_destroyed());
        assert!(matches!(field.poll(&mut scene), InitStatus::Idle));
    }

    #[test]
    fn test_destroy_while_pending() {
        let mut scene = Scene::new();
        let mut field = ParticleField::new(&FieldConfig::default());
        field.init(Bitmap::solid(2, 2, [255; 4]).unwrap().into());
        field.destroy(&mut scene);
        assert!(field.is_destroyed());
        assert!(matches!(field.poll(&mut scene), InitStatus::Idle));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_destroy_before_init() {
        let mut scene = Scene::new();
        let mut field = ParticleField::new(&FieldConfig::default());
        field.destroy(&mut scene);
        field.destroy(&mut scene);
        assert!(field.is_destroyed());
    }

    // ========== Parameter Tests ==========

    #[test]
    fn test_set_parameter_clamps() {
        let mut scene = Scene::new();
        let mut field = ready_field(Bitmap::solid(2, 2, [255; 4]).unwrap(), &mut scene);
        field.set_parameter(ParamName::Density, 5.0);
        assert_eq!(field.params().unwrap().density, 3.0);
        field.set_parameter(ParamName::Size, -1.0);
        assert_eq!(field.params().unwrap().size, 0.0);
    }

    #[test]
    fn test_touch_radius_goes_to_trail() {
        let mut scene = Scene::new();
        let mut field = ready_field(Bitmap::solid(2, 2, [255; 4]).unwrap(), &mut scene);
        field.set_parameter(ParamName::TouchRadius, 0.1);
        assert_eq!(field.touch().radius(), 0.1);
    }

    #[test]
    fn test_set_parameter_before_ready_is_noop() {
        let mut field = ParticleField::new(&FieldConfig::default());
        field.set_parameter(ParamName::Depth, 3.0);
        assert!(field.params().is_none());
    }

    #[test]
    fn test_with_values_seeds_params() {
        let mut scene = Scene::new();
        let values = ParamValues {
            brightness: 1.5,
            ..ParamValues::default()
        };
        let mut field = ParticleField::new(&FieldConfig::default()).with_values(values);
        field
            .init_blocking(&Bitmap::solid(2, 2, [255; 4]).unwrap().into(), &mut scene)
            .unwrap();
        assert_eq!(field.params().unwrap().brightness, 1.5);
        assert_eq!(field.params().unwrap().texture_size, Vec2::new(2.0, 2.0));
    }

    // ========== Frame Tests ==========

    #[test]
    fn test_update_advances_time_and_trail() {
        let mut scene = Scene::new();
        let mut field = ready_field(Bitmap::solid(2, 2, [255; 4]).unwrap(), &mut scene);
        field.add_touch(Vec2::new(0.4, 0.5));
        field.add_touch(Vec2::new(0.5, 0.5));
        field.update(0.5);
        field.update(0.25);
        assert!((field.params().unwrap().time - 0.75).abs() < 1e-6);
        assert_eq!(field.touch().points()[0].age, 2);
    }

    #[test]
    fn test_touch_before_ready_dropped() {
        let mut field = ParticleField::new(&FieldConfig::default());
        field.add_touch(Vec2::new(0.5, 0.5));
        assert!(field.touch().is_empty());
    }

    #[test]
    fn test_resize_scales_both_nodes() {
        let mut scene = Scene::new();
        let mut field = ready_field(Bitmap::solid(2, 2, [255; 4]).unwrap(), &mut scene);
        let instances_before = field.instances().to_vec();

        field.resize(&mut scene, 0.75);
        let (points, hit_area) = field.nodes().unwrap();
        assert_eq!(scene.get(points).unwrap().scale, Vec3::new(0.75, 0.75, 1.0));
        assert_eq!(scene.get(hit_area).unwrap().scale, Vec3::new(0.75, 0.75, 1.0));
        assert_eq!(field.instances(), instances_before.as_slice());

        field.resize(&mut scene, f32::NAN);
        assert_eq!(field.scale(), 0.75);
    }

    #[test]
    fn test_resize_before_ready_applies_on_build() {
        let mut scene = Scene::new();
        let mut field = ParticleField::new(&FieldConfig::default());
        field.resize(&mut scene, 2.0);
        field
            .init_blocking(&Bitmap::solid(2, 2, [255; 4]).unwrap().into(), &mut scene)
            .unwrap();
        let (points, _) = field.nodes().unwrap();
        assert_eq!(scene.get(points).unwrap().scale, Vec3::new(2.0, 2.0, 1.0));
    }

    #[test]
    fn test_black_image_builds_empty_field() {
        let mut scene = Scene::new();
        let field = ready_field(Bitmap::solid(5, 5, [0, 0, 0, 255]).unwrap(), &mut scene);
        assert!(field.is_ready());
        assert_eq!(field.num_visible(), 0);
        assert!(field.instances().is_empty());
    }

    // ========== GPU Limit Tests ==========

    #[test]
    fn test_texture_limits() {
        assert!(check_texture_limits((640, 480), 128, 2048).is_ok());
        assert!(matches!(
            check_texture_limits((4096, 10), 128, 2048),
            Err(GpuError::TextureTooLarge { width: 4096, height: 10, max: 2048 })
        ));
        assert!(matches!(
            check_texture_limits((640, 480), 4096, 2048),
            Err(GpuError::TextureTooLarge { width: 4096, height: 4096, .. })
        ));
    }
}
