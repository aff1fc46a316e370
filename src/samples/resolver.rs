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

//! Pitch extrapolation from recorded root samples.
//!
//! Every pitch without a recording borrows the most recently seen root pitch
//! below it and is played back at an equal-tempered rate. Pitches below the
//! first root borrow that root and are pitched down.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use super::catalog::SampleCatalog;

/// The last pitch covered by the extrapolation sweep (inclusive).
pub const SWEEP_END_PITCH: u8 = 128;

/// Rates below this may not be reproduced faithfully by the playback primitive.
pub const MIN_SAFE_RATE: f32 = 0.5;

/// Rates above this may not be reproduced faithfully by the playback primitive.
pub const MAX_SAFE_RATE: f32 = 2.0;

const SEMITONES_PER_OCTAVE: f64 = 12.0;

/// How a pitch is played: which recorded root to use and at what rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    root_pitch: u8,
    rate: f32,
}

impl Resolution {
    pub fn new(root_pitch: u8, rate: f32) -> Self {
        Self { root_pitch, rate }
    }

    pub fn root_pitch(&self) -> u8 {
        self.root_pitch
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }
}

/// Resolution table for an instrument, keyed by pitch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PitchResolution {
    entries: BTreeMap<u8, Resolution>,
}

impl PitchResolution {
    pub fn get(&self, pitch: u8) -> Option<Resolution> {
        self.entries.get(&pitch).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, Resolution)> + '_ {
        self.entries.iter().map(|(pitch, resolution)| (*pitch, *resolution))
    }

    /// True if any entry extrapolates from (or is) the given root.
    pub fn references_root(&self, root_pitch: u8) -> bool {
        self.entries.values().any(|r| r.root_pitch == root_pitch)
    }

    pub(crate) fn insert(&mut self, pitch: u8, resolution: Resolution) {
        self.entries.insert(pitch, resolution);
    }

    /// Keeps only the entries whose pitch satisfies `keep`. Returns how many were removed.
    pub(crate) fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(u8) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|pitch, _| keep(*pitch));
        before - self.entries.len()
    }
}

/// Extrapolated rates outside of the range the playback primitive guarantees.
///
/// Informational only: rates are never clamped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RateWarning {
    BelowMinimum { min_rate: f32 },
    AboveMaximum { max_rate: f32 },
    OutsideBoth { min_rate: f32, max_rate: f32 },
}

impl fmt::Display for RateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateWarning::BelowMinimum { min_rate } => write!(
                f,
                "lowest extrapolated rate {:.4} is below {}, low notes may not play correctly",
                min_rate, MIN_SAFE_RATE
            ),
            RateWarning::AboveMaximum { max_rate } => write!(
                f,
                "highest extrapolated rate {:.4} is above {}, high notes may not play correctly",
                max_rate, MAX_SAFE_RATE
            ),
            RateWarning::OutsideBoth { min_rate, max_rate } => write!(
                f,
                "extrapolated rates {:.4}..{:.4} exceed the safe range {}..{}",
                min_rate, max_rate, MIN_SAFE_RATE, MAX_SAFE_RATE
            ),
        }
    }
}

/// The outcome of a resolution sweep.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolverReport {
    pub resolution: PitchResolution,
    /// Lowest rate given to an extrapolated pitch.
    pub min_rate: Option<f32>,
    /// Highest rate given to an extrapolated pitch.
    pub max_rate: Option<f32>,
    pub warning: Option<RateWarning>,
}

fn semitone_ratio(semitones: f64) -> f64 {
    2f64.powf(semitones / SEMITONES_PER_OCTAVE)
}

/// Builds the resolution table for every pitch from 0 through [`SWEEP_END_PITCH`].
///
/// An empty catalog yields an empty table.
pub fn extrapolate(catalog: &SampleCatalog) -> ResolverReport {
    let mut resolution = PitchResolution::default();
    let mut previous_root: Option<u8> = None;
    let mut previous_rate = 1.0f64;
    // Pitches seen before any root, waiting for the first root to appear.
    let mut before_first_root: Vec<u8> = Vec::new();
    let mut min_rate = f32::INFINITY;
    let mut max_rate = f32::NEG_INFINITY;

    let mut record = |resolution: &mut PitchResolution, pitch: u8, root: u8, rate: f64| {
        let rate = rate as f32;
        min_rate = min_rate.min(rate);
        max_rate = max_rate.max(rate);
        resolution.insert(pitch, Resolution::new(root, rate));
    };

    for pitch in 0..=SWEEP_END_PITCH {
        if catalog.contains_pitch(pitch) {
            previous_rate = 1.0;
            resolution.insert(pitch, Resolution::new(pitch, 1.0));
            if previous_root.is_none() {
                for before in before_first_root.drain(..) {
                    let rate = previous_rate / semitone_ratio(f64::from(pitch - before));
                    record(&mut resolution, before, pitch, rate);
                }
            }
            previous_root = Some(pitch);
        } else if let Some(root) = previous_root {
            let rate = previous_rate * semitone_ratio(f64::from(pitch - root));
            record(&mut resolution, pitch, root, rate);
        } else {
            before_first_root.push(pitch);
        }
    }

    let (min_rate, max_rate) = if min_rate.is_finite() {
        (Some(min_rate), Some(max_rate))
    } else {
        (None, None)
    };

    let warning = match (min_rate, max_rate) {
        (Some(min), Some(max)) if min < MIN_SAFE_RATE && max > MAX_SAFE_RATE => Some(RateWarning::OutsideBoth {
            min_rate: min,
            max_rate: max,
        }),
        (Some(min), _) if min < MIN_SAFE_RATE => Some(RateWarning::BelowMinimum { min_rate: min }),
        (_, Some(max)) if max > MAX_SAFE_RATE => Some(RateWarning::AboveMaximum { max_rate: max }),
        _ => None,
    };

    if let Some(warning) = &warning {
        warn!(min_rate = ?min_rate, max_rate = ?max_rate, "{}", warning);
    }
    debug!(
        roots = catalog.pitch_count(),
        resolved = resolution.len(),
        "Resolved pitches"
    );

    ResolverReport {
        resolution,
        min_rate,
        max_rate,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::catalog_of;

    const EPSILON: f32 = 1e-4;

    fn assert_rate(resolution: &PitchResolution, pitch: u8, root: u8, rate: f32) {
        let entry = resolution.get(pitch).unwrap();
        assert_eq!(entry.root_pitch(), root, "root for pitch {}", pitch);
        assert!(
            (entry.rate() - rate).abs() < EPSILON,
            "rate for pitch {}: {} != {}",
            pitch,
            entry.rate(),
            rate
        );
    }

    #[test]
    fn test_two_roots() {
        let report = extrapolate(&catalog_of(&[(60, 127), (72, 127)]));
        let resolution = &report.resolution;

        assert_rate(resolution, 60, 60, 1.0);
        assert_rate(resolution, 72, 72, 1.0);
        assert_rate(resolution, 66, 60, 1.414_213_5);
        assert_rate(resolution, 78, 72, 1.414_213_5);
        assert_rate(resolution, 50, 60, 0.561_231);
        assert_rate(resolution, 71, 60, 2f32.powf(11.0 / 12.0));
    }

    #[test]
    fn test_covers_full_domain() {
        let report = extrapolate(&catalog_of(&[(64, 127)]));

        for pitch in 0..=SWEEP_END_PITCH {
            let entry = report.resolution.get(pitch).unwrap();
            assert_eq!(entry.root_pitch(), 64);
            assert!(entry.rate() > 0.0);
        }
        assert_eq!(report.resolution.len(), 129);
    }

    #[test]
    fn test_root_rate_is_exactly_one() {
        let report = extrapolate(&catalog_of(&[(21, 127), (45, 60), (45, 127), (100, 127)]));
        for root in [21, 45, 100] {
            assert_eq!(report.resolution.get(root).unwrap().rate(), 1.0);
        }
    }

    #[test]
    fn test_forward_and_backward_laws() {
        let report = extrapolate(&catalog_of(&[(40, 127), (55, 127)]));

        for pitch in 0..40u8 {
            let expected = 1.0 / 2f64.powf(f64::from(40 - pitch) / 12.0);
            assert_rate(&report.resolution, pitch, 40, expected as f32);
        }
        for pitch in 41..55u8 {
            let expected = 2f64.powf(f64::from(pitch - 40) / 12.0);
            assert_rate(&report.resolution, pitch, 40, expected as f32);
        }
        for pitch in 56..=SWEEP_END_PITCH {
            let expected = 2f64.powf(f64::from(pitch - 55) / 12.0);
            assert_rate(&report.resolution, pitch, 55, expected as f32);
        }
    }

    #[test]
    fn test_empty_catalog() {
        let report = extrapolate(&SampleCatalog::new());
        assert!(report.resolution.is_empty());
        assert_eq!(report.min_rate, None);
        assert_eq!(report.max_rate, None);
        assert_eq!(report.warning, None);
    }

    #[test]
    fn test_rate_warning_both() {
        // Pitch 0 is five octaves under 60 and pitch 128 is 56 semitones over 72.
        let report = extrapolate(&catalog_of(&[(60, 127), (72, 127)]));
        assert!(matches!(report.warning, Some(RateWarning::OutsideBoth { .. })));
        assert!((report.min_rate.unwrap() - 1.0 / 32.0).abs() < EPSILON);
    }

    #[test]
    fn test_rate_warning_thresholds() {
        // One root at 0: pitch 12 has rate exactly 2.0 and 13 goes above.
        let report = extrapolate(&catalog_of(&[(0, 127)]));
        assert!(matches!(report.warning, Some(RateWarning::AboveMaximum { .. })));

        // Roots every octave keep every rate inside [1.0, 2.0).
        let roots: Vec<(u8, u8)> = (0..=SWEEP_END_PITCH).step_by(12).map(|p| (p, 127)).collect();
        let report = extrapolate(&catalog_of(&roots));
        assert_eq!(report.warning, None);

        // A root a full octave above pitch 0 reaches exactly 0.5, which is still safe.
        let mut roots: Vec<(u8, u8)> = (12..=SWEEP_END_PITCH).step_by(12).map(|p| (p, 127)).collect();
        roots.push((127, 127));
        let report = extrapolate(&catalog_of(&roots));
        assert_eq!(report.min_rate, Some(0.5));
        assert_eq!(report.warning, None);
    }
}
