//! Reference viewer: a winit window that shows a gallery of images.
//!
//! Keys: `N` next image, `L` last image, `H` hide, `C` cycle color preset,
//! `1`-`4` effect presets (defaults, photographic, dreamy, high contrast).
//! Moving the pointer over the image disturbs the particles.

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::{StartCause, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::KeyCode,
    window::{Window, WindowId},
};

use crate::gpu::{Camera, GpuContext};
use crate::input::{hit_uv, Input};
use crate::params::{ColorPreset, EffectPreset};
use crate::scene::Scene;
use crate::transition::{LifecycleEvent, TransitionController};

/// Longest frame step fed to the controller, so a stall does not skip a
/// whole transition.
const MAX_FRAME_DELTA: f32 = 0.1;

pub struct App {
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    controller: TransitionController,
    scene: Scene,
    input: Input,
    camera: Camera,
    start_index: usize,
    color_index: usize,
    last_frame: Instant,
    fatal: Option<anyhow::Error>,
}

impl App {
    pub fn new(controller: TransitionController, start_index: usize) -> Self {
        Self {
            window: None,
            gpu: None,
            controller,
            scene: Scene::new(),
            input: Input::new(),
            camera: Camera::new(),
            start_index,
            color_index: 0,
            last_frame: Instant::now(),
            fatal: None,
        }
    }

    /// Error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.fatal.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!(error = %error, "viewer stopped");
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn handle_keys(&mut self) {
        let input = &self.input;
        let controller = &mut self.controller;

        if input.key_pressed(KeyCode::KeyN) {
            controller.next();
        }
        if input.key_pressed(KeyCode::KeyL) {
            controller.show_last();
        }
        if input.key_pressed(KeyCode::KeyH) {
            controller.hide();
        }
        if input.key_pressed(KeyCode::KeyC) {
            self.color_index = (self.color_index + 1) % ColorPreset::ALL.len();
            let preset = ColorPreset::ALL[self.color_index];
            tracing::info!(?preset, "color preset");
            controller.apply_color_preset(preset);
        }

        let presets = [
            (KeyCode::Digit1, EffectPreset::Defaults),
            (KeyCode::Digit2, EffectPreset::Photographic),
            (KeyCode::Digit3, EffectPreset::Dreamy),
            (KeyCode::Digit4, EffectPreset::HighContrast),
        ];
        for (key, preset) in presets {
            if input.key_pressed(key) {
                tracing::info!(?preset, "effect preset");
                controller.apply_effect_preset(preset);
            }
        }
    }

    fn forward_pointer(&mut self, view_proj: glam::Mat4) {
        let Some(ndc) = self.input.cursor_moved() else {
            return;
        };
        let Some(field) = self.controller.field() else {
            return;
        };
        let Some(area) = field.hit_area() else {
            return;
        };
        if let Some(uv) = hit_uv(ndc, view_proj, area, field.scale()) {
            self.controller.on_pointer_move(uv);
        }
    }

    fn drain_events(&mut self) {
        for event in self.controller.events() {
            match event {
                LifecycleEvent::Loaded { image, num_visible } => {
                    tracing::info!(%image, num_visible, "image loaded");
                }
                LifecycleEvent::Shown { image } => tracing::debug!(%image, "image shown"),
                LifecycleEvent::Hidden { image } => tracing::debug!(%image, "image hidden"),
                LifecycleEvent::LoadFailed { image, error } => {
                    tracing::error!(%image, error = %error, "image failed to load");
                }
            }
        }
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let delta = now
            .duration_since(self.last_frame)
            .as_secs_f32()
            .min(MAX_FRAME_DELTA);
        self.last_frame = now;

        let Some(aspect) = self.gpu.as_ref().map(GpuContext::aspect) else {
            return;
        };
        let view_proj = self.camera.view_proj(aspect);

        self.handle_keys();
        self.forward_pointer(view_proj);
        self.input.begin_frame();

        self.controller.update(delta, &mut self.scene);
        self.drain_events();

        let Some(gpu) = &self.gpu else {
            return;
        };
        if let Err(err) = self
            .controller
            .prepare_gpu(&gpu.device, &gpu.queue, gpu.format(), view_proj)
        {
            tracing::error!(error = %err, "failed to upload field");
        }

        match gpu.render(|pass| self.controller.draw(pass)) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => gpu.reconfigure(),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow::anyhow!("GPU out of memory"));
            }
            Err(err) => tracing::warn!(error = %err, "dropped frame"),
        }
    }
}

impl ApplicationHandler for App {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if let StartCause::Init = cause {
            self.last_frame = Instant::now();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("pointfield")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, err.into()),
        };

        let gpu = match pollster::block_on(GpuContext::new(window.clone())) {
            Ok(gpu) => gpu,
            Err(err) => return self.fail(event_loop, err.into()),
        };

        let size = window.inner_size();
        self.input.set_window_size(size.width, size.height);
        self.controller
            .resize(&mut self.scene, self.camera.visible_height());
        self.controller.goto(self.start_index);

        self.window = Some(window);
        self.gpu = Some(gpu);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                self.controller.destroy(&mut self.scene);
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { .. } if self.input.key_pressed(KeyCode::Escape) => {
                self.controller.destroy(&mut self.scene);
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size);
                }
                self.input.set_window_size(size.width, size.height);
                self.controller
                    .resize(&mut self.scene, self.camera.visible_height());
            }
            WindowEvent::RedrawRequested => {
                self.frame(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
