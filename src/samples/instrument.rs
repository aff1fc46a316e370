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

use tracing::info;

use super::catalog::SampleCatalog;
use super::error::SampleError;
use super::limiter::{limit_range, LimitReport};
use super::pool::LoadedSamplePool;
use super::resolver::{extrapolate, PitchResolution, RateWarning, Resolution};

/// One instrument's catalog, resolution table and loaded samples.
#[derive(Clone, Debug)]
pub struct Instrument {
    name: String,
    catalog: SampleCatalog,
    resolution: PitchResolution,
    pool: LoadedSamplePool,
    min_rate: Option<f32>,
    max_rate: Option<f32>,
    rate_warning: Option<RateWarning>,
}

impl Instrument {
    /// Resolves every pitch of the catalog. An empty catalog makes the instrument unusable.
    pub fn new(name: &str, catalog: SampleCatalog) -> Result<Self, SampleError> {
        if catalog.is_empty() {
            return Err(SampleError::NoSamplesDiscovered {
                instrument: name.to_string(),
            });
        }

        let report = extrapolate(&catalog);
        info!(
            instrument = name,
            root_pitches = catalog.pitch_count(),
            samples = catalog.descriptor_count(),
            "Instrument resolved"
        );

        Ok(Self {
            name: name.to_string(),
            catalog,
            resolution: report.resolution,
            pool: LoadedSamplePool::default(),
            min_rate: report.min_rate,
            max_rate: report.max_rate,
            rate_warning: report.warning,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &SampleCatalog {
        &self.catalog
    }

    pub fn resolution(&self) -> &PitchResolution {
        &self.resolution
    }

    pub fn pool(&self) -> &LoadedSamplePool {
        &self.pool
    }

    pub fn resolve(&self, pitch: u8) -> Option<Resolution> {
        self.resolution.get(pitch)
    }

    /// Extrapolated rate range from the resolution sweep, before any range limiting.
    pub fn rate_range(&self) -> Option<(f32, f32)> {
        self.min_rate.zip(self.max_rate)
    }

    pub fn rate_warning(&self) -> Option<RateWarning> {
        self.rate_warning
    }

    pub(crate) fn limit_range(&mut self, visible_pitches: &HashSet<u8>) -> LimitReport {
        limit_range(&mut self.catalog, &mut self.resolution, visible_pitches)
    }

    pub(crate) fn pool_mut(&mut self) -> &mut LoadedSamplePool {
        &mut self.pool
    }
}
