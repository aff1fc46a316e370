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

use std::collections::BTreeMap;

use crate::playback::SampleHandle;

/// Velocity layers of one root pitch, ascending by velocity.
pub type VelocityLayers = BTreeMap<u8, SampleHandle>;

/// Samples that finished loading, keyed by root pitch and then velocity.
/// Only grows while loading runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedSamplePool {
    samples: BTreeMap<u8, VelocityLayers>,
}

impl LoadedSamplePool {
    /// Records a loaded sample. Returns the handle it replaced, if any.
    pub fn insert(&mut self, pitch: u8, velocity: u8, handle: SampleHandle) -> Option<SampleHandle> {
        self.samples.entry(pitch).or_default().insert(velocity, handle)
    }

    /// The loaded velocity layers of a root pitch.
    pub fn layers(&self, root_pitch: u8) -> Option<&VelocityLayers> {
        self.samples.get(&root_pitch).filter(|layers| !layers.is_empty())
    }

    pub fn contains_root(&self, root_pitch: u8) -> bool {
        self.layers(root_pitch).is_some()
    }

    /// Total number of loaded samples.
    pub fn sample_count(&self) -> usize {
        self.samples.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }
}
