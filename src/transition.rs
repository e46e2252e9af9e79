//! Load, show and hide sequencing for a gallery of images.
//!
//! The [`TransitionController`] owns at most one [`ParticleField`] and moves
//! it through a small state machine:
//!
//! ```text
//! Empty ──load──▶ Loading ──ready──▶ Showing ──load/goto/next/hide──▶ Hiding
//!   ▲               │                                                  │
//!   └────failed─────┘◀──────────── queued image ───────────────────────┤
//!   ▲                                                                  │
//!   └──────────────────────────── nothing queued ──────────────────────┘
//! ```
//!
//! Entering `Showing` starts the entrance sweeps; entering `Hiding` replaces
//! them with the exit sweeps and stops forwarding pointer moves. When the
//! exit finishes the field is destroyed, and only then does the next load
//! start. Requests that arrive while a load or a teardown is in progress
//! replace a single queued slot, so at most one field is ever alive.
//!
//! # Example
//!
//! ```ignore
//! let mut controller = TransitionController::new(FieldConfig::default())
//!     .with_gallery(vec!["a.png".into(), "b.png".into()]);
//! controller.set_view_height(camera.visible_height());
//! controller.goto(0);
//!
//! // each tick
//! controller.update(delta, &mut scene);
//! for event in controller.events() {
//!     tracing::info!(?event, "lifecycle");
//! }
//! ```

use std::fmt;

use glam::{Mat4, Vec2};

use crate::config::{FieldConfig, TransitionConfig};
use crate::easing::{Ease, Tween};
use crate::error::{DecodeError, GpuError};
use crate::field::{InitStatus, ParticleField};
use crate::loader::ImageRef;
use crate::params::{ColorPreset, EffectPreset, ParamName, ParameterStore, SweptParam};
use crate::scene::Scene;

/// Where the controller is in the load/show/hide cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// No field.
    Empty,
    /// Decode in flight.
    Loading,
    /// Field visible; pointer moves reach the trail.
    Showing,
    /// Exit sweep running; teardown follows.
    Hiding,
    /// Torn down by [`TransitionController::destroy`].
    Destroyed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Empty => "empty",
            LifecycleState::Loading => "loading",
            LifecycleState::Showing => "showing",
            LifecycleState::Hiding => "hiding",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Completion signals, drained with [`TransitionController::events`].
#[derive(Debug)]
pub enum LifecycleEvent {
    /// The field was built and the entrance started.
    Loaded { image: String, num_visible: usize },
    /// The entrance finished.
    Shown { image: String },
    /// The exit finished and the field was destroyed.
    Hidden { image: String },
    /// The image could not be decoded. The controller is back to `Empty`
    /// unless another image was queued.
    LoadFailed { image: String, error: DecodeError },
}

#[derive(Debug, Clone, Copy)]
struct Sweep {
    param: SweptParam,
    tween: Tween,
}

/// Drives one [`ParticleField`] at a time through entrance and exit.
pub struct TransitionController {
    config: FieldConfig,
    store: ParameterStore,
    state: LifecycleState,
    field: Option<ParticleField>,
    /// Label of the image the current field was built from.
    image: String,
    queued: Option<ImageRef>,
    hide_on_show: bool,
    sweeps: Vec<Sweep>,
    gallery: Vec<ImageRef>,
    current: Option<usize>,
    view_height: Option<f32>,
    events: Vec<LifecycleEvent>,
}

impl TransitionController {
    pub fn new(config: FieldConfig) -> Self {
        let store = ParameterStore::new(config.defaults);
        Self {
            config,
            store,
            state: LifecycleState::Empty,
            field: None,
            image: String::new(),
            queued: None,
            hide_on_show: false,
            sweeps: Vec::new(),
            gallery: Vec::new(),
            current: None,
            view_height: None,
            events: Vec::new(),
        }
    }

    pub fn with_gallery(mut self, gallery: Vec<ImageRef>) -> Self {
        self.gallery = gallery;
        self
    }

    // ---- requests ----

    /// Request `image`. Starts immediately when idle; otherwise it takes the
    /// queued slot and runs after the current field has been torn down.
    pub fn load(&mut self, image: ImageRef) {
        self.hide_on_show = false;
        match self.state {
            LifecycleState::Empty | LifecycleState::Destroyed => self.start_loading(image),
            LifecycleState::Loading | LifecycleState::Hiding => self.enqueue(image),
            LifecycleState::Showing => {
                self.enqueue(image);
                self.begin_hide();
            }
        }
    }

    /// Load gallery entry `index`. Out-of-range indices are ignored.
    pub fn goto(&mut self, index: usize) {
        let Some(image) = self.gallery.get(index).cloned() else {
            tracing::debug!(index, len = self.gallery.len(), "goto ignored, index out of range");
            return;
        };
        self.current = Some(index);
        self.load(image);
    }

    /// Load the gallery entry after the current one, wrapping around.
    pub fn next(&mut self) {
        if self.gallery.is_empty() {
            tracing::debug!("next ignored, gallery is empty");
            return;
        }
        let index = match self.current {
            Some(current) => (current + 1) % self.gallery.len(),
            None => 0,
        };
        self.goto(index);
    }

    /// Load the last gallery entry.
    pub fn show_last(&mut self) {
        match self.gallery.len() {
            0 => tracing::debug!("show_last ignored, gallery is empty"),
            len => self.goto(len - 1),
        }
    }

    /// Play the exit with no follow-up load.
    pub fn hide(&mut self) {
        self.queued = None;
        match self.state {
            LifecycleState::Showing => self.begin_hide(),
            LifecycleState::Loading => self.hide_on_show = true,
            _ => {}
        }
    }

    /// Tear down immediately, skipping any exit. Safe in any state.
    pub fn destroy(&mut self, scene: &mut Scene) {
        if let Some(mut field) = self.field.take() {
            field.destroy(scene);
        }
        self.sweeps.clear();
        self.queued = None;
        self.hide_on_show = false;
        if self.state != LifecycleState::Destroyed {
            tracing::debug!(from = %self.state, "controller destroyed");
        }
        self.state = LifecycleState::Destroyed;
    }

    fn enqueue(&mut self, image: ImageRef) {
        if let Some(previous) = self.queued.replace(image) {
            tracing::debug!(replaced = %previous.label(), "queued image replaced");
        }
    }

    fn start_loading(&mut self, image: ImageRef) {
        let label = image.label();
        tracing::info!(image = %label, "loading image");
        let mut field = ParticleField::new(&self.config).with_values(*self.store.values());
        field.init(image);
        self.field = Some(field);
        self.image = label;
        self.sweeps.clear();
        self.state = LifecycleState::Loading;
    }

    fn begin_hide(&mut self) {
        let Some(params) = self.field.as_ref().and_then(|field| field.params()) else {
            return;
        };
        let t = self.config.transitions;
        self.sweeps = vec![
            Sweep {
                param: SweptParam::Randomness,
                tween: Tween::new(params.randomness, t.exit_randomness, t.hide_duration, Ease::QuadOut),
            },
            Sweep {
                param: SweptParam::Depth,
                tween: Tween::new(params.depth, t.exit_depth, t.hide_duration, Ease::CubicIn),
            },
            Sweep {
                param: SweptParam::Size,
                tween: Tween::new(params.size, 0.0, t.hide_duration * 0.8, Ease::QuadOut),
            },
        ];
        self.state = LifecycleState::Hiding;
        tracing::debug!(image = %self.image, "hiding");
    }

    fn begin_show(&mut self, scene: &mut Scene) {
        let t: TransitionConfig = self.config.transitions;
        let values = *self.store.values();
        self.sweeps = vec![
            Sweep {
                param: SweptParam::Size,
                tween: Tween::new(t.entrance_size, values.size, t.show_duration, Ease::QuartOut),
            },
            Sweep {
                param: SweptParam::Randomness,
                tween: Tween::new(
                    t.entrance_randomness,
                    values.randomness,
                    t.show_duration * 0.9,
                    Ease::CubicInOut,
                ),
            },
            Sweep {
                param: SweptParam::Depth,
                tween: Tween::new(t.entrance_depth, values.depth, t.show_duration * 2.0, Ease::QuartInOut),
            },
        ];
        self.state = LifecycleState::Showing;
        self.apply_sweeps(0.0);
        self.fit(scene);
    }

    // ---- per tick ----

    /// Advance loading, sweeps and the live field by `delta` seconds.
    pub fn update(&mut self, delta: f32, scene: &mut Scene) {
        if self.state == LifecycleState::Loading {
            self.poll_load(scene);
        }

        if let Some(field) = &mut self.field {
            field.update(delta);
        }

        if self.sweeps.is_empty() {
            return;
        }
        self.apply_sweeps(delta);
        if !self.sweeps.iter().all(|sweep| sweep.tween.is_finished()) {
            return;
        }
        self.sweeps.clear();

        match self.state {
            LifecycleState::Showing => {
                tracing::debug!(image = %self.image, "entrance finished");
                self.events.push(LifecycleEvent::Shown {
                    image: self.image.clone(),
                });
            }
            LifecycleState::Hiding => self.finish_hide(scene),
            _ => {}
        }
    }

    fn poll_load(&mut self, scene: &mut Scene) {
        let Some(field) = &mut self.field else {
            return;
        };
        match field.poll(scene) {
            InitStatus::Pending | InitStatus::Idle => {}
            InitStatus::Ready => {
                let num_visible = field.num_visible();
                self.events.push(LifecycleEvent::Loaded {
                    image: self.image.clone(),
                    num_visible,
                });
                self.begin_show(scene);
                if self.queued.is_some() || std::mem::take(&mut self.hide_on_show) {
                    self.begin_hide();
                }
            }
            InitStatus::Failed(error) => {
                self.field = None;
                self.state = LifecycleState::Empty;
                self.events.push(LifecycleEvent::LoadFailed {
                    image: std::mem::take(&mut self.image),
                    error,
                });
                self.hide_on_show = false;
                if let Some(next) = self.queued.take() {
                    self.start_loading(next);
                }
            }
        }
    }

    fn apply_sweeps(&mut self, delta: f32) {
        let Some(params) = self.field.as_mut().and_then(|field| field.params_mut()) else {
            return;
        };
        for sweep in &mut self.sweeps {
            let value = sweep.tween.advance(delta);
            params.sweep(sweep.param, value);
        }
    }

    fn finish_hide(&mut self, scene: &mut Scene) {
        if let Some(mut field) = self.field.take() {
            field.destroy(scene);
        }
        tracing::debug!(image = %self.image, "exit finished");
        self.events.push(LifecycleEvent::Hidden {
            image: std::mem::take(&mut self.image),
        });
        match self.queued.take() {
            Some(next) => self.start_loading(next),
            None => self.state = LifecycleState::Empty,
        }
    }

    /// Forward a pointer position on the field, in `[0, 1]²`. Dropped unless
    /// the field is showing.
    pub fn on_pointer_move(&mut self, uv: Vec2) {
        if self.state != LifecycleState::Showing {
            tracing::trace!(state = %self.state, "pointer move dropped");
            return;
        }
        if let Some(field) = &mut self.field {
            field.add_touch(uv);
        }
    }

    // ---- parameters ----

    /// Clamped write to the store, passed through to the live field.
    ///
    /// A write to a parameter the entrance is still sweeping ends that sweep
    /// at the written value.
    pub fn set_parameter(&mut self, name: ParamName, value: f32) -> f32 {
        let stored = self.store.set(name, value);
        if let Some(field) = &mut self.field {
            field.set_parameter(name, stored);
        }
        self.settle_entrance(|param| param.name() == name);
        stored
    }

    pub fn apply_color_preset(&mut self, preset: ColorPreset) {
        self.store.apply_color_preset(preset);
        self.push_store();
    }

    /// Apply an effect preset. A running entrance ends at the preset's values.
    pub fn apply_effect_preset(&mut self, preset: EffectPreset) {
        self.store.apply_effect_preset(preset);
        self.push_store();
        self.settle_entrance(|_| true);
    }

    fn push_store(&mut self) {
        let values = *self.store.values();
        if let Some(field) = &mut self.field {
            field.set_values(&values);
        }
    }

    /// Finish the matching entrance sweeps at their stored values. Exit
    /// sweeps keep running; the store is picked up by the next entrance.
    fn settle_entrance(&mut self, matches: impl Fn(SweptParam) -> bool) {
        if self.state != LifecycleState::Showing {
            return;
        }
        let values = *self.store.values();
        for sweep in self.sweeps.iter_mut().filter(|sweep| matches(sweep.param)) {
            sweep.tween.settle(values.get(sweep.param.name()));
        }
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    // ---- render harness ----

    /// World-space height the field should fill. Refits the live field.
    pub fn set_view_height(&mut self, view_height: f32) {
        if view_height.is_finite() && view_height > 0.0 {
            self.view_height = Some(view_height);
        }
    }

    /// Set the view height and refit the live field to it.
    pub fn resize(&mut self, scene: &mut Scene, view_height: f32) {
        self.set_view_height(view_height);
        self.fit(scene);
    }

    fn fit(&mut self, scene: &mut Scene) {
        let Some(view_height) = self.view_height else {
            return;
        };
        if let Some(field) = &mut self.field {
            if let Some((_, height)) = field.image_size() {
                field.resize(scene, view_height / height as f32);
            }
        }
    }

    pub fn prepare_gpu(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        view_proj: Mat4,
    ) -> Result<(), GpuError> {
        match &mut self.field {
            Some(field) => field.prepare_gpu(device, queue, format, view_proj),
            None => Ok(()),
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Some(field) = &self.field {
            field.draw(pass);
        }
    }

    // ---- queries ----

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn field(&self) -> Option<&ParticleField> {
        self.field.as_ref()
    }

    /// Gallery index of the most recent `goto`.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn gallery_len(&self) -> usize {
        self.gallery.len()
    }

    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    /// Drain pending lifecycle events.
    pub fn events(&mut self) -> impl Iterator<Item = LifecycleEvent> + '_ {
        self.events.drain(..)
    }
}
