// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashSet;
use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ConfigError;
use super::instrument::InstrumentConfig;
use crate::samples::{DuplicatePolicy, VelocitySettings, MAX_MIDI_VALUE};

/// Environment variables with this prefix override file values, e.g. `HEXSAMPLER_POLYPHONY_COUNT`.
pub const ENV_PREFIX: &str = "HEXSAMPLER";

const DEFAULT_POLYPHONY_COUNT: u32 = 8;

fn default_polyphony_count() -> u32 {
    DEFAULT_POLYPHONY_COUNT
}

fn default_max_pressure() -> f32 {
    1.0
}

/// The configuration for a keyboard: its instruments and how it plays them.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct KeyboardConfig {
    /// Maximum number of keys sounding at once.
    #[serde(default = "default_polyphony_count")]
    polyphony_count: u32,

    /// Map pressure onto the recorded velocity span instead of 0..=127.
    #[serde(default)]
    relative_velocity_range: bool,

    #[serde(default)]
    velocity_boost_percent: u32,

    #[serde(default)]
    min_pressure: f32,

    #[serde(default = "default_max_pressure")]
    max_pressure: f32,

    /// Whether sustain starts engaged.
    #[serde(default)]
    sustain: bool,

    #[serde(default)]
    duplicate_policy: DuplicatePolicy,

    #[serde(default)]
    instruments: Vec<InstrumentConfig>,

    /// Inclusive `[low, high]` pitch ranges shown by the layout. Empty means no limiting.
    #[serde(default)]
    visible_pitches: Vec<(u8, u8)>,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            polyphony_count: DEFAULT_POLYPHONY_COUNT,
            relative_velocity_range: false,
            velocity_boost_percent: 0,
            min_pressure: 0.0,
            max_pressure: default_max_pressure(),
            sustain: false,
            duplicate_policy: DuplicatePolicy::default(),
            instruments: Vec::new(),
            visible_pitches: Vec::new(),
        }
    }
}

impl KeyboardConfig {
    /// Creates a keyboard configuration with default playing settings.
    pub fn new(instruments: Vec<InstrumentConfig>) -> Self {
        Self {
            instruments,
            ..Default::default()
        }
    }

    /// Reads a YAML file, applying `HEXSAMPLER_*` environment overrides.
    /// Relative instrument paths resolve against the file's directory.
    pub fn deserialize(path: &Path) -> Result<KeyboardConfig, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        let mut keyboard = Self::from_builder(builder)?;

        if let Some(base_path) = path.parent() {
            for instrument in keyboard.instruments.iter_mut() {
                instrument.resolve_paths(base_path);
            }
        }
        debug!(path = ?path, instruments = keyboard.instruments.len(), "Loaded keyboard config");
        Ok(keyboard)
    }

    /// Builds and validates a configuration from prepared sources.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<KeyboardConfig, ConfigError> {
        let keyboard = builder.build()?.try_deserialize::<KeyboardConfig>()?;
        keyboard.validate()?;
        Ok(keyboard)
    }

    /// Checks the values serde can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polyphony_count == 0 {
            return Err(ConfigError::Invalid("polyphony_count must be at least 1".to_string()));
        }

        let mut names = HashSet::new();
        for instrument in &self.instruments {
            instrument.source()?;
            if !names.insert(instrument.name()) {
                return Err(ConfigError::Invalid(format!(
                    "instrument {} is configured twice",
                    instrument.name()
                )));
            }
        }

        for &(low, high) in &self.visible_pitches {
            if low > high || high > MAX_MIDI_VALUE {
                return Err(ConfigError::Invalid(format!(
                    "visible pitch range [{}, {}] must satisfy low <= high <= {}",
                    low, high, MAX_MIDI_VALUE
                )));
            }
        }
        Ok(())
    }

    pub fn polyphony_count(&self) -> u32 {
        self.polyphony_count
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    pub fn instruments(&self) -> &[InstrumentConfig] {
        &self.instruments
    }

    /// The pressure-to-velocity settings.
    pub fn velocity_settings(&self) -> VelocitySettings {
        VelocitySettings {
            relative_velocity_range: self.relative_velocity_range,
            velocity_boost_percent: self.velocity_boost_percent,
            min_pressure: self.min_pressure,
            max_pressure: self.max_pressure,
        }
    }

    /// Every visible pitch, or `None` if no ranges are configured.
    pub fn visible_pitches(&self) -> Option<HashSet<u8>> {
        if self.visible_pitches.is_empty() {
            return None;
        }
        Some(
            self.visible_pitches
                .iter()
                .flat_map(|&(low, high)| low..=high)
                .collect(),
        )
    }
}
