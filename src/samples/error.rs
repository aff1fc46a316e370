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

use super::discovery::DiscoveryError;
use crate::config::ConfigError;
use crate::playback::PlaybackError;

/// Error types for the sample engine.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// Discovery found nothing for the instrument. It is unusable.
    #[error("No samples discovered for instrument {instrument}")]
    NoSamplesDiscovered { instrument: String },

    #[error("Unknown instrument {0}")]
    UnknownInstrument(String),

    /// No resolution entry for the pitch. Unreachable once resolution covered the pitch.
    #[error("Pitch {pitch} does not resolve to any root pitch")]
    PitchUnresolved { pitch: u8 },

    /// The root sample is still loading. Expected while progressive loading runs.
    #[error("Root pitch {root_pitch} for pitch {pitch} is not loaded yet")]
    NotLoadedYet { pitch: u8, root_pitch: u8 },

    #[error("Instruments cannot change once loading has started")]
    LoadingStarted,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SampleError {
    /// True for errors a caller should show as a pending key rather than a failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, SampleError::NotLoadedYet { .. })
    }
}
