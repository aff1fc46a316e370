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

//! Sample resolution and progressive loading for keyboard instruments.
//!
//! This module provides:
//! - Sample discovery from directories and declarative manifests
//! - Pitch extrapolation from the recorded root pitches
//! - Range limiting to the pitches a layout shows
//! - Progressive, one-at-a-time sample loading
//! - Velocity layer selection and crossfading
//! - Voice management with polyphony limits and sustain

mod catalog;
mod descriptor;
mod discovery;
mod engine;
mod error;
mod instrument;
mod limiter;
mod loader;
mod pool;
mod resolver;
mod selector;
mod voice;

pub use catalog::{DuplicatePolicy, SampleCatalog};
pub use descriptor::{
    parse_sample_name, OutOfRangeError, ResourceRef, SampleDescriptor, DEFAULT_VELOCITY, MAX_MIDI_VALUE,
};
pub use discovery::{
    discover, list_instruments, DirectoryDiscovery, DiscoveryError, ManifestDiscovery, ManifestEntry,
    SampleDiscovery, SampleManifest,
};
pub use engine::{LoadEvent, SampleEngine};
pub use error::SampleError;
pub use instrument::Instrument;
pub use limiter::{limit_range, LimitReport};
pub use loader::{CancelHandle, LoadCursor, LoadState, LoadStep, LoadedSample, ProgressiveLoader};
pub use pool::{LoadedSamplePool, VelocityLayers};
pub use resolver::{
    extrapolate, PitchResolution, RateWarning, Resolution, ResolverReport, MAX_SAFE_RATE, MIN_SAFE_RATE,
    SWEEP_END_PITCH,
};
pub use selector::{select_layers, select_playback, LayerPlayback, PlaybackSelection, VelocitySettings};
pub use voice::{KeyId, VoiceManager};
