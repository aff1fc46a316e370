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

//! The boundary to the audio playback primitive.
//!
//! The primitive is an asynchronous sample loader plus a polyphonic player.
//! A load request is submitted with [`PlaybackPrimitive::submit_load`]; the
//! primitive later reports exactly one [`LoadCompletion`] for it, which the
//! control thread hands back to the loader.

use crate::samples::SampleDescriptor;

pub mod memory;
pub mod mock;

pub use memory::MemoryPlayback;
pub use mock::MockPlayback;

/// Playback priority given to every note.
pub const NOTE_PRIORITY: i32 = 1;

/// Identifies a sample inside the primitive's sample pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleHandle(pub u32);

/// Identifies one playing stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

/// Reported by the primitive once a submitted load has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadCompletion {
    pub handle: SampleHandle,
    pub success: bool,
}

/// How many times a stream repeats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    /// Play once.
    #[default]
    Once,
    /// Repeat until stopped.
    Forever,
    /// Repeat the given number of extra times.
    Count(u16),
}

impl LoopMode {
    /// The loop count in the primitive's convention: 0 for once, -1 for forever.
    pub fn loop_count(self) -> i32 {
        match self {
            LoopMode::Once => 0,
            LoopMode::Forever => -1,
            LoopMode::Count(count) => i32::from(count),
        }
    }
}

/// Error types for the playback primitive.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Unknown sample handle {0:?}")]
    UnknownHandle(SampleHandle),

    #[error("Embedded resource {0} is not registered")]
    UnknownResource(u32),

    #[error("Load request rejected for {0}")]
    Rejected(String),

    #[error("Playback primitive has shut down")]
    Disconnected,
}

/// The asynchronous loader and polyphonic player the engine drives.
pub trait PlaybackPrimitive {
    /// Starts loading a sample. Exactly one completion is reported later for the returned handle.
    fn submit_load(&mut self, descriptor: &SampleDescriptor) -> Result<SampleHandle, PlaybackError>;

    /// Starts a stream for a loaded sample.
    fn play(
        &mut self,
        handle: SampleHandle,
        left_volume: f32,
        right_volume: f32,
        loop_count: i32,
        priority: i32,
        rate: f32,
    ) -> Result<StreamId, PlaybackError>;

    /// Stops a stream. Stopping an unknown or finished stream is a no-op.
    fn stop(&mut self, stream: StreamId);
}

/// Lets boxed primitives be used wherever a `PlaybackPrimitive` is expected.
impl PlaybackPrimitive for Box<dyn PlaybackPrimitive> {
    fn submit_load(&mut self, descriptor: &SampleDescriptor) -> Result<SampleHandle, PlaybackError> {
        (**self).submit_load(descriptor)
    }

    fn play(
        &mut self,
        handle: SampleHandle,
        left_volume: f32,
        right_volume: f32,
        loop_count: i32,
        priority: i32,
        rate: f32,
    ) -> Result<StreamId, PlaybackError> {
        (**self).play(handle, left_volume, right_volume, loop_count, priority, rate)
    }

    fn stop(&mut self, stream: StreamId) {
        (**self).stop(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_count() {
        assert_eq!(LoopMode::Once.loop_count(), 0);
        assert_eq!(LoopMode::Forever.loop_count(), -1);
        assert_eq!(LoopMode::Count(3).loop_count(), 3);
        assert_eq!(LoopMode::default(), LoopMode::Once);
    }
}
