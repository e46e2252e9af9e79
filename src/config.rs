//! Tunable policy values.
//!
//! The culling threshold, parameter defaults, trail settings and transition
//! timings are all configuration rather than constants. A JSON file may
//! override any subset of them:
//!
//! ```json
//! {
//!     "threshold": 40,
//!     "defaults": { "size": 3.5, "color": [0.4, 0.7, 1.0], "touch_radius": 0.2 },
//!     "touch": { "max_age": 120 },
//!     "transitions": { "hide_duration": 0.5 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::ParamValues;
use crate::touch::TouchConfig;

/// Timings and extremes of the entrance and exit sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Base entrance duration in seconds. Randomness settles over 0.9x of
    /// this, depth over 2x.
    pub show_duration: f32,
    /// Exit duration in seconds. Size collapses over 0.8x of this.
    pub hide_duration: f32,
    /// Point size at the start of the entrance.
    pub entrance_size: f32,
    /// Depth spread at the start of the entrance.
    pub entrance_depth: f32,
    /// Randomness at the start of the entrance.
    pub entrance_randomness: f32,
    /// Randomness reached at the end of the exit.
    pub exit_randomness: f32,
    /// Depth reached at the end of the exit.
    pub exit_depth: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            show_duration: 1.4,
            hide_duration: 0.8,
            entrance_size: 0.1,
            entrance_depth: 40.0,
            entrance_randomness: 5.0,
            exit_randomness: 5.0,
            exit_depth: -20.0,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Red-channel cutoff (0-255); pixels at or below it get no particle.
    pub threshold: u8,
    /// Initial parameter values.
    pub defaults: ParamValues,
    pub touch: TouchConfig,
    pub transitions: TransitionConfig,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            threshold: 34,
            defaults: ParamValues::default(),
            touch: TouchConfig::default(),
            transitions: TransitionConfig::default(),
        }
    }
}

impl FieldConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_defaults(mut self, defaults: ParamValues) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_touch(mut self, touch: TouchConfig) -> Self {
        self.touch = touch;
        self
    }

    pub fn with_transitions(mut self, transitions: TransitionConfig) -> Self {
        self.transitions = transitions;
        self
    }
}
