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

//! Sample descriptors and sample name parsing.

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

/// The highest valid MIDI pitch or velocity.
pub const MAX_MIDI_VALUE: u8 = 127;

/// Velocity assigned to samples whose name carries no velocity.
pub const DEFAULT_VELOCITY: u8 = 127;

/// Where the audio data for a sample lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    /// A resource compiled into the application, addressed by id.
    Embedded(u32),
    /// A file on disk.
    External(PathBuf),
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Embedded(id) => write!(f, "resource #{}", id),
            ResourceRef::External(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A recorded sample found at discovery time. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleDescriptor {
    pitch: u8,
    velocity: u8,
    source: ResourceRef,
}

/// A pitch or velocity outside of the MIDI range.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("sample {field} {value} is outside of the MIDI range 0-127")]
pub struct OutOfRangeError {
    pub field: &'static str,
    pub value: u32,
}

impl SampleDescriptor {
    /// Creates a new descriptor from values already known to be valid MIDI values.
    /// Use [`SampleDescriptor::try_new`] for anything unchecked.
    pub fn new(pitch: u8, velocity: u8, source: ResourceRef) -> Self {
        debug_assert!(pitch <= MAX_MIDI_VALUE, "pitch {} is not a MIDI value", pitch);
        debug_assert!(velocity <= MAX_MIDI_VALUE, "velocity {} is not a MIDI value", velocity);
        Self {
            pitch,
            velocity,
            source,
        }
    }

    /// Creates a descriptor from unchecked values, e.g. parsed from a file name.
    pub fn try_new(pitch: u32, velocity: u32, source: ResourceRef) -> Result<Self, OutOfRangeError> {
        let pitch = checked_midi_value("pitch", pitch)?;
        let velocity = checked_midi_value("velocity", velocity)?;
        Ok(Self {
            pitch,
            velocity,
            source,
        })
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn source(&self) -> &ResourceRef {
        &self.source
    }
}

fn checked_midi_value(field: &'static str, value: u32) -> Result<u8, OutOfRangeError> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= MAX_MIDI_VALUE)
        .ok_or(OutOfRangeError { field, value })
}

fn sample_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"m([0-9]+)(?:v([0-9]+))?").expect("valid sample name pattern"))
}

/// Parses `…m<pitch>(v<velocity>)?…` out of a sample name.
///
/// Returns the raw pitch and velocity; the velocity defaults to 127 when absent.
/// Range checking is left to [`SampleDescriptor::try_new`].
pub fn parse_sample_name(name: &str) -> Option<(u32, u32)> {
    let captures = sample_name_pattern().captures(name)?;
    let pitch = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let velocity = match captures.get(2) {
        Some(velocity) => velocity.as_str().parse::<u32>().ok()?,
        None => u32::from(DEFAULT_VELOCITY),
    };
    Some((pitch, velocity))
}
