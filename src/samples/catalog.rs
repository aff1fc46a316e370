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

//! The per-instrument catalog of discovered samples, grouped by pitch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::descriptor::SampleDescriptor;

/// What to do when discovery reports the same (pitch, velocity) pair twice.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The later descriptor replaces the earlier one and moves to the end of its group.
    #[default]
    LastWins,
    /// The later descriptor is dropped.
    FirstWins,
}

/// Discovered sample descriptors, keyed by pitch. Each group keeps discovery order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleCatalog {
    groups: BTreeMap<u8, Vec<SampleDescriptor>>,
}

impl SampleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from descriptors in discovery order.
    pub fn from_descriptors<I>(descriptors: I, policy: DuplicatePolicy) -> Self
    where
        I: IntoIterator<Item = SampleDescriptor>,
    {
        let mut catalog = Self::new();
        for descriptor in descriptors {
            catalog.insert(descriptor, policy);
        }
        catalog
    }

    /// Adds a descriptor. Returns false if it was dropped as a duplicate.
    pub fn insert(&mut self, descriptor: SampleDescriptor, policy: DuplicatePolicy) -> bool {
        let group = self.groups.entry(descriptor.pitch()).or_default();
        let existing = group
            .iter()
            .position(|d| d.velocity() == descriptor.velocity());

        match (existing, policy) {
            (None, _) => {
                group.push(descriptor);
                true
            }
            (Some(index), DuplicatePolicy::LastWins) => {
                debug!(
                    pitch = descriptor.pitch(),
                    velocity = descriptor.velocity(),
                    replaced = %group[index].source(),
                    "Duplicate sample, keeping the last one"
                );
                group.remove(index);
                group.push(descriptor);
                true
            }
            (Some(_), DuplicatePolicy::FirstWins) => {
                debug!(
                    pitch = descriptor.pitch(),
                    velocity = descriptor.velocity(),
                    dropped = %descriptor.source(),
                    "Duplicate sample, keeping the first one"
                );
                false
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct pitches with at least one sample.
    pub fn pitch_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of descriptors across all pitches.
    pub fn descriptor_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn contains_pitch(&self, pitch: u8) -> bool {
        self.groups.contains_key(&pitch)
    }

    /// The sampled pitches, ascending.
    pub fn pitches(&self) -> impl Iterator<Item = u8> + '_ {
        self.groups.keys().copied()
    }

    /// The descriptors recorded for a pitch, in discovery order.
    pub fn group(&self, pitch: u8) -> Option<&[SampleDescriptor]> {
        self.groups.get(&pitch).map(Vec::as_slice)
    }

    /// All groups in ascending pitch order.
    pub fn groups(&self) -> impl Iterator<Item = (u8, &[SampleDescriptor])> + '_ {
        self.groups.iter().map(|(pitch, group)| (*pitch, group.as_slice()))
    }

    /// Keeps only the pitches for which `keep` returns true. Returns the removed pitches.
    pub fn retain_pitches<F>(&mut self, mut keep: F) -> Vec<u8>
    where
        F: FnMut(u8) -> bool,
    {
        let removed: Vec<u8> = self.pitches().filter(|pitch| !keep(*pitch)).collect();
        for pitch in &removed {
            self.groups.remove(pitch);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::descriptor::ResourceRef;
    use crate::testutil::{descriptor, file_descriptor};

    #[test]
    fn test_groups_by_pitch() {
        let catalog = SampleCatalog::from_descriptors(
            vec![descriptor(72, 127), descriptor(60, 100), descriptor(60, 40)],
            DuplicatePolicy::LastWins,
        );

        assert_eq!(catalog.pitch_count(), 2);
        assert_eq!(catalog.descriptor_count(), 3);
        assert_eq!(catalog.pitches().collect::<Vec<_>>(), vec![60, 72]);

        // Discovery order is kept within a group.
        let velocities: Vec<u8> = catalog
            .group(60)
            .unwrap()
            .iter()
            .map(|d| d.velocity())
            .collect();
        assert_eq!(velocities, vec![100, 40]);
    }

    #[test]
    fn test_duplicate_last_wins() {
        let mut catalog = SampleCatalog::new();
        assert!(catalog.insert(file_descriptor(60, 100, "a.wav"), DuplicatePolicy::LastWins));
        assert!(catalog.insert(file_descriptor(60, 40, "b.wav"), DuplicatePolicy::LastWins));
        assert!(catalog.insert(file_descriptor(60, 100, "c.wav"), DuplicatePolicy::LastWins));

        let group = catalog.group(60).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group[1].velocity(), 100);
        assert_eq!(group[1].source(), &ResourceRef::External("c.wav".into()));
    }

    #[test]
    fn test_duplicate_first_wins() {
        let mut catalog = SampleCatalog::new();
        assert!(catalog.insert(file_descriptor(60, 100, "a.wav"), DuplicatePolicy::FirstWins));
        assert!(!catalog.insert(file_descriptor(60, 100, "c.wav"), DuplicatePolicy::FirstWins));

        let group = catalog.group(60).unwrap();
        assert_eq!(group.len(), 1);
        assert_eq!(group[0].source(), &ResourceRef::External("a.wav".into()));
    }

    #[test]
    fn test_retain_pitches() {
        let mut catalog = SampleCatalog::from_descriptors(
            vec![descriptor(48, 127), descriptor(60, 127), descriptor(72, 127)],
            DuplicatePolicy::LastWins,
        );

        let removed = catalog.retain_pitches(|pitch| pitch != 60);
        assert_eq!(removed, vec![60]);
        assert!(!catalog.contains_pitch(60));
        assert_eq!(catalog.pitch_count(), 2);
    }
}
