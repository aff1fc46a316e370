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

//! Usage-based pruning of the catalog and resolution table.

use std::collections::HashSet;

use tracing::debug;

use super::catalog::SampleCatalog;
use super::resolver::PitchResolution;

/// What a call to [`limit_range`] removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LimitReport {
    /// Number of resolution entries dropped because their pitch is not visible.
    pub removed_resolutions: usize,
    /// Catalog pitches dropped because nothing visible plays them.
    pub removed_pitches: Vec<u8>,
}

impl LimitReport {
    pub fn is_empty(&self) -> bool {
        self.removed_resolutions == 0 && self.removed_pitches.is_empty()
    }
}

/// Shrinks an instrument to the pitches a key layout shows.
///
/// The order of the two passes matters. Resolution entries for pitches that
/// are not visible go first. The catalog then keeps every pitch that is
/// visible or still serves as the root of a surviving entry, so an off-screen
/// root that an on-screen key extrapolates from stays loadable.
pub fn limit_range(
    catalog: &mut SampleCatalog,
    resolution: &mut PitchResolution,
    visible_pitches: &HashSet<u8>,
) -> LimitReport {
    let removed_resolutions = resolution.retain(|pitch| visible_pitches.contains(&pitch));

    let referenced_roots: HashSet<u8> = resolution.iter().map(|(_, r)| r.root_pitch()).collect();
    let removed_pitches = catalog
        .retain_pitches(|pitch| visible_pitches.contains(&pitch) || referenced_roots.contains(&pitch));

    debug!(
        visible = visible_pitches.len(),
        removed_resolutions,
        removed_pitches = removed_pitches.len(),
        remaining_pitches = catalog.pitch_count(),
        "Limited instrument range"
    );

    LimitReport {
        removed_resolutions,
        removed_pitches,
    }
}
