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

//! Turns a key press into the sample(s) to play.

use tracing::{debug, error};

use super::error::SampleError;
use super::pool::{LoadedSamplePool, VelocityLayers};
use super::resolver::PitchResolution;
use crate::playback::SampleHandle;

const MAX_VELOCITY: f32 = 127.0;

/// How pressure maps to velocity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocitySettings {
    /// Map pressure onto the span of recorded layers instead of 0..=127.
    pub relative_velocity_range: bool,
    pub velocity_boost_percent: u32,
    pub min_pressure: f32,
    pub max_pressure: f32,
}

impl Default for VelocitySettings {
    fn default() -> Self {
        Self {
            relative_velocity_range: false,
            velocity_boost_percent: 0,
            min_pressure: 0.0,
            max_pressure: 1.0,
        }
    }
}

impl VelocitySettings {
    /// Computes the velocity for a pressure, given the layers of the root pitch.
    pub fn velocity_for(&self, pressure: f32, layers: &VelocityLayers) -> u8 {
        let mut span = self.max_pressure - self.min_pressure;
        if span == 0.0 {
            span = 1.0;
        }
        let normalized = (pressure - self.min_pressure) / span;

        let bounds = layers.keys().next().zip(layers.keys().next_back());
        let mut velocity = match bounds {
            Some((&lowest, &highest)) if self.relative_velocity_range && layers.len() > 1 => {
                normalized * f32::from(highest - lowest) + f32::from(lowest)
            }
            _ => normalized * MAX_VELOCITY,
        }
        .round();

        if self.velocity_boost_percent > 0 {
            velocity = (velocity * (1.0 + self.velocity_boost_percent as f32 / 100.0)).round();
        }

        velocity.clamp(0.0, MAX_VELOCITY) as u8
    }
}

/// One sample to play and its volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerPlayback {
    pub handle: SampleHandle,
    pub layer_velocity: u8,
    pub volume: f32,
}

/// Everything needed to start the streams for one key press.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackSelection {
    pub root_pitch: u8,
    pub rate: f32,
    pub velocity: u8,
    /// One or two layers.
    pub layers: Vec<LayerPlayback>,
}

/// Picks the velocity layer(s) for a velocity.
///
/// A single layer plays at full volume, louder when the velocity exceeds the
/// layer's own. With several layers an exact match, or a velocity outside the
/// recorded span, plays the matching or nearest layer alone. A velocity
/// strictly between two layers crossfades them linearly.
pub fn select_layers(velocity: u8, layers: &VelocityLayers) -> Vec<LayerPlayback> {
    let single = |(&layer_velocity, &handle): (&u8, &SampleHandle), volume: f32| LayerPlayback {
        handle,
        layer_velocity,
        volume,
    };

    if layers.len() == 1 {
        return layers
            .iter()
            .map(|(&layer_velocity, &handle)| {
                let volume = if velocity > layer_velocity && layer_velocity > 0 {
                    f32::from(velocity) / f32::from(layer_velocity)
                } else {
                    1.0
                };
                LayerPlayback {
                    handle,
                    layer_velocity,
                    volume,
                }
            })
            .collect();
    }

    if let Some(exact) = layers.get_key_value(&velocity) {
        return vec![single(exact, 1.0)];
    }

    let lower = layers.range(..velocity).next_back();
    let higher = layers.range(velocity..).next();
    match (lower, higher) {
        (Some((&low, &low_handle)), Some((&high, &high_handle))) => {
            let width = f32::from(high - low);
            vec![
                LayerPlayback {
                    handle: low_handle,
                    layer_velocity: low,
                    volume: f32::from(high - velocity) / width,
                },
                LayerPlayback {
                    handle: high_handle,
                    layer_velocity: high,
                    volume: f32::from(velocity - low) / width,
                },
            ]
        }
        (Some(nearest), None) | (None, Some(nearest)) => vec![single(nearest, 1.0)],
        (None, None) => Vec::new(),
    }
}

/// Selects the samples for a pitch played at a pressure.
pub fn select_playback(
    resolution: &PitchResolution,
    pool: &LoadedSamplePool,
    pitch: u8,
    pressure: f32,
    settings: &VelocitySettings,
) -> Result<PlaybackSelection, SampleError> {
    let Some(resolved) = resolution.get(pitch) else {
        error!(pitch, "Pitch has no root pitch, playing nothing");
        return Err(SampleError::PitchUnresolved { pitch });
    };
    let root_pitch = resolved.root_pitch();
    let layers = pool
        .layers(root_pitch)
        .ok_or(SampleError::NotLoadedYet { pitch, root_pitch })?;

    let velocity = settings.velocity_for(pressure, layers);
    let selected = select_layers(velocity, layers);
    debug!(
        pitch,
        root_pitch,
        rate = resolved.rate(),
        velocity,
        layers = ?selected.iter().map(|l| (l.layer_velocity, l.volume)).collect::<Vec<_>>(),
        "Selected playback"
    );

    Ok(PlaybackSelection {
        root_pitch,
        rate: resolved.rate(),
        velocity,
        layers: selected,
    })
}
