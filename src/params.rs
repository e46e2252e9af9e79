//! Named shader parameters, their valid ranges, and presets.
//!
//! The control surface talks to the field exclusively through
//! [`ParamName`] + `f32` writes. Every write is clamped into the parameter's
//! documented range; an out-of-range value is never an error.
//!
//! # Example
//!
//! ```ignore
//! let mut store = ParameterStore::default();
//! assert_eq!(store.set(ParamName::Density, 5.0), 3.0);
//!
//! let name: ParamName = "brightness".parse()?;
//! store.set(name, 1.4);
//! store.apply_color_preset(ColorPreset::Golden);
//! ```

use std::fmt;
use std::str::FromStr;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// A parameter exposed to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    Randomness,
    Depth,
    Size,
    Brightness,
    Density,
    ColorR,
    ColorG,
    ColorB,
    /// Radius of a trail point as a fraction of the trail raster size.
    TouchRadius,
}

impl ParamName {
    pub const ALL: [ParamName; 9] = [
        ParamName::Randomness,
        ParamName::Depth,
        ParamName::Size,
        ParamName::Brightness,
        ParamName::Density,
        ParamName::ColorR,
        ParamName::ColorG,
        ParamName::ColorB,
        ParamName::TouchRadius,
    ];

    /// Documented valid range for this parameter.
    pub fn range(self) -> ParamRange {
        match self {
            ParamName::Randomness => ParamRange::new(1.0, 10.0),
            ParamName::Depth => ParamRange::new(1.0, 15.0),
            ParamName::Size => ParamRange::new(0.0, 5.0),
            ParamName::Brightness => ParamRange::new(0.1, 3.0),
            ParamName::Density => ParamRange::new(0.1, 3.0),
            ParamName::ColorR | ParamName::ColorG | ParamName::ColorB => ParamRange::new(0.0, 1.0),
            ParamName::TouchRadius => ParamRange::new(0.0, 0.5),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamName::Randomness => "randomness",
            ParamName::Depth => "depth",
            ParamName::Size => "size",
            ParamName::Brightness => "brightness",
            ParamName::Density => "density",
            ParamName::ColorR => "color_r",
            ParamName::ColorG => "color_g",
            ParamName::ColorB => "color_b",
            ParamName::TouchRadius => "touch_radius",
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown parameter '{0}'")]
pub struct UnknownParam(pub String);

impl FromStr for ParamName {
    type Err = UnknownParam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "randomness" | "random" => Ok(ParamName::Randomness),
            "depth" => Ok(ParamName::Depth),
            "size" => Ok(ParamName::Size),
            "brightness" => Ok(ParamName::Brightness),
            "density" => Ok(ParamName::Density),
            "color_r" | "red" => Ok(ParamName::ColorR),
            "color_g" | "green" => Ok(ParamName::ColorG),
            "color_b" | "blue" => Ok(ParamName::ColorB),
            "touch_radius" | "radius" => Ok(ParamName::TouchRadius),
            _ => Err(UnknownParam(s.to_string())),
        }
    }
}

/// Inclusive `[min, max]` domain of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the range. NaN yields `None`.
    pub fn clamp(&self, value: f32) -> Option<f32> {
        if value.is_nan() {
            None
        } else {
            Some(value.clamp(self.min, self.max))
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Complete set of user-facing parameter values.
///
/// Also the `defaults` section of the configuration file; every field may be
/// omitted there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamValues {
    pub randomness: f32,
    pub depth: f32,
    pub size: f32,
    pub brightness: f32,
    pub density: f32,
    pub color: [f32; 3],
    pub touch_radius: f32,
}

impl Default for ParamValues {
    fn default() -> Self {
        Self {
            randomness: 2.66,
            depth: 15.0,
            size: 5.0,
            brightness: 3.0,
            density: 0.98,
            color: ColorPreset::WarmWhite.rgb(),
            touch_radius: 0.26,
        }
    }
}

impl ParamValues {
    pub fn get(&self, name: ParamName) -> f32 {
        match name {
            ParamName::Randomness => self.randomness,
            ParamName::Depth => self.depth,
            ParamName::Size => self.size,
            ParamName::Brightness => self.brightness,
            ParamName::Density => self.density,
            ParamName::ColorR => self.color[0],
            ParamName::ColorG => self.color[1],
            ParamName::ColorB => self.color[2],
            ParamName::TouchRadius => self.touch_radius,
        }
    }

    fn slot(&mut self, name: ParamName) -> &mut f32 {
        match name {
            ParamName::Randomness => &mut self.randomness,
            ParamName::Depth => &mut self.depth,
            ParamName::Size => &mut self.size,
            ParamName::Brightness => &mut self.brightness,
            ParamName::Density => &mut self.density,
            ParamName::ColorR => &mut self.color[0],
            ParamName::ColorG => &mut self.color[1],
            ParamName::ColorB => &mut self.color[2],
            ParamName::TouchRadius => &mut self.touch_radius,
        }
    }

    /// Clamped write. Returns the value actually stored.
    pub fn set(&mut self, name: ParamName, value: f32) -> f32 {
        let slot = self.slot(name);
        match name.range().clamp(value) {
            Some(clamped) => {
                if clamped != value {
                    tracing::debug!(param = %name, requested = value, clamped, "parameter clamped");
                }
                *slot = clamped;
            }
            None => tracing::debug!(param = %name, "ignoring NaN parameter write"),
        }
        *slot
    }

    /// Copy with every value clamped into its range.
    pub fn clamped(mut self) -> Self {
        for name in ParamName::ALL {
            let value = self.get(name);
            self.set(name, value);
        }
        self
    }
}

/// Named color bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorPreset {
    #[default]
    WarmWhite,
    CoolWhite,
    Golden,
    Blue,
    Purple,
    Green,
}

impl ColorPreset {
    pub const ALL: [ColorPreset; 6] = [
        ColorPreset::WarmWhite,
        ColorPreset::CoolWhite,
        ColorPreset::Golden,
        ColorPreset::Blue,
        ColorPreset::Purple,
        ColorPreset::Green,
    ];

    pub fn rgb(self) -> [f32; 3] {
        match self {
            ColorPreset::WarmWhite => [1.0, 1.0, 0.95],
            ColorPreset::CoolWhite => [0.95, 0.98, 1.0],
            ColorPreset::Golden => [1.0, 0.8, 0.4],
            ColorPreset::Blue => [0.4, 0.7, 1.0],
            ColorPreset::Purple => [0.8, 0.4, 1.0],
            ColorPreset::Green => [0.4, 1.0, 0.6],
        }
    }
}

/// Named bundles over the whole appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectPreset {
    /// Restore every parameter, touch radius included, to its default.
    Defaults,
    Photographic,
    Dreamy,
    HighContrast,
}

impl EffectPreset {
    /// Write this preset into `values`. Presets other than `Defaults` leave the
    /// touch radius alone.
    pub fn apply(self, values: &mut ParamValues) {
        let touch_radius = values.touch_radius;
        *values = match self {
            EffectPreset::Defaults => ParamValues::default(),
            EffectPreset::Photographic => ParamValues {
                randomness: 1.5,
                depth: 6.0,
                size: 1.8,
                brightness: 1.4,
                density: 1.3,
                color: [1.0, 0.98, 0.92],
                touch_radius,
            },
            EffectPreset::Dreamy => ParamValues {
                randomness: 3.5,
                depth: 8.0,
                size: 2.2,
                brightness: 0.8,
                density: 0.7,
                color: [0.9, 0.95, 1.0],
                touch_radius,
            },
            EffectPreset::HighContrast => ParamValues {
                randomness: 1.8,
                depth: 10.0,
                size: 1.2,
                brightness: 2.0,
                density: 1.5,
                color: [1.0, 1.0, 1.0],
                touch_radius,
            },
        };
    }
}

/// Explicit parameter store shared by reference between the control surface
/// and the lifecycle controller.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: ParamValues,
}

impl ParameterStore {
    pub fn new(values: ParamValues) -> Self {
        Self {
            values: values.clamped(),
        }
    }

    pub fn get(&self, name: ParamName) -> f32 {
        self.values.get(name)
    }

    /// Clamped write. Returns the stored value.
    pub fn set(&mut self, name: ParamName, value: f32) -> f32 {
        self.values.set(name, value)
    }

    pub fn values(&self) -> &ParamValues {
        &self.values
    }

    pub fn color(&self) -> Vec3 {
        Vec3::from_array(self.values.color)
    }

    pub fn apply_color_preset(&mut self, preset: ColorPreset) {
        self.values.color = preset.rgb();
    }

    pub fn apply_effect_preset(&mut self, preset: EffectPreset) {
        preset.apply(&mut self.values);
    }
}

/// The live shader parameter set of one particle field.
///
/// Values written through [`FieldParams::set`] are range-clamped. Transition
/// sweeps write through [`FieldParams::sweep`], which only enforces the hard
/// invariants (size and density non-negative, color in `[0, 1]`) so that an
/// exit can push depth below zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldParams {
    pub time: f32,
    pub randomness: f32,
    pub depth: f32,
    pub size: f32,
    pub brightness: f32,
    pub density: f32,
    pub color: Vec3,
    pub texture_size: Vec2,
}

impl FieldParams {
    /// Parameter set for a `width x height` source using the store's values.
    pub fn from_values(values: &ParamValues, width: u32, height: u32) -> Self {
        Self {
            time: 0.0,
            randomness: values.randomness,
            depth: values.depth,
            size: values.size,
            brightness: values.brightness,
            density: values.density,
            color: Vec3::from_array(values.color),
            texture_size: Vec2::new(width as f32, height as f32),
        }
    }

    /// Clamped write. `TouchRadius` is not a shader parameter and is ignored.
    pub fn set(&mut self, name: ParamName, value: f32) {
        let Some(value) = name.range().clamp(value) else {
            return;
        };
        match name {
            ParamName::Randomness => self.randomness = value,
            ParamName::Depth => self.depth = value,
            ParamName::Size => self.size = value,
            ParamName::Brightness => self.brightness = value,
            ParamName::Density => self.density = value,
            ParamName::ColorR => self.color.x = value,
            ParamName::ColorG => self.color.y = value,
            ParamName::ColorB => self.color.z = value,
            ParamName::TouchRadius => {}
        }
    }

    pub fn get(&self, param: SweptParam) -> f32 {
        match param {
            SweptParam::Randomness => self.randomness,
            SweptParam::Depth => self.depth,
            SweptParam::Size => self.size,
        }
    }

    /// Animated write used by transitions.
    pub fn sweep(&mut self, param: SweptParam, value: f32) {
        if value.is_nan() {
            return;
        }
        match param {
            SweptParam::Randomness => self.randomness = value,
            SweptParam::Depth => self.depth = value,
            SweptParam::Size => self.size = value.max(0.0),
        }
    }
}

/// Parameters driven by entrance and exit transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweptParam {
    Randomness,
    Depth,
    Size,
}

impl SweptParam {
    pub const ALL: [SweptParam; 3] = [SweptParam::Randomness, SweptParam::Depth, SweptParam::Size];

    pub fn name(self) -> ParamName {
        match self {
            SweptParam::Randomness => ParamName::Randomness,
            SweptParam::Depth => ParamName::Depth,
            SweptParam::Size => ParamName::Size,
        }
    }
}
