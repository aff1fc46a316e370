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

//! A deterministic playback primitive. Doesn't actually play anything.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::{LoadCompletion, PlaybackError, PlaybackPrimitive, SampleHandle, StreamId};
use crate::samples::SampleDescriptor;

/// A call received by the mock.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackCall {
    Load {
        handle: SampleHandle,
        descriptor: SampleDescriptor,
    },
    Play {
        stream: StreamId,
        handle: SampleHandle,
        left_volume: f32,
        right_volume: f32,
        loop_count: i32,
        priority: i32,
        rate: f32,
    },
    Stop(StreamId),
}

/// Records every call and queues one completion per accepted load.
/// Completions are delivered only when the caller pops them.
#[derive(Debug, Default)]
pub struct MockPlayback {
    next_handle: u32,
    next_stream: u32,
    calls: Vec<PlaybackCall>,
    pending: VecDeque<LoadCompletion>,
    rejected: HashSet<(u8, u8)>,
    failing: HashSet<(u8, u8)>,
    loaded: HashSet<SampleHandle>,
    active_streams: HashSet<StreamId>,
}

impl MockPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `submit_load` return an error for this (pitch, velocity).
    pub fn reject_load(&mut self, pitch: u8, velocity: u8) {
        self.rejected.insert((pitch, velocity));
    }

    /// Makes the completion for this (pitch, velocity) report a failure.
    pub fn fail_load(&mut self, pitch: u8, velocity: u8) {
        self.failing.insert((pitch, velocity));
    }

    /// Pops the oldest undelivered completion.
    pub fn next_completion(&mut self) -> Option<LoadCompletion> {
        let completion = self.pending.pop_front()?;
        if completion.success {
            self.loaded.insert(completion.handle);
        }
        Some(completion)
    }

    /// Number of loads submitted but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn calls(&self) -> &[PlaybackCall] {
        &self.calls
    }

    /// The descriptors submitted for loading, in submission order.
    pub fn submitted(&self) -> Vec<&SampleDescriptor> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PlaybackCall::Load { descriptor, .. } => Some(descriptor),
                _ => None,
            })
            .collect()
    }

    pub fn active_streams(&self) -> &HashSet<StreamId> {
        &self.active_streams
    }
}

impl PlaybackPrimitive for MockPlayback {
    fn submit_load(&mut self, descriptor: &SampleDescriptor) -> Result<SampleHandle, PlaybackError> {
        let key = (descriptor.pitch(), descriptor.velocity());
        if self.rejected.contains(&key) {
            return Err(PlaybackError::Rejected(descriptor.source().to_string()));
        }

        self.next_handle += 1;
        let handle = SampleHandle(self.next_handle);
        self.calls.push(PlaybackCall::Load {
            handle,
            descriptor: descriptor.clone(),
        });
        self.pending.push_back(LoadCompletion {
            handle,
            success: !self.failing.contains(&key),
        });
        debug!(handle = handle.0, source = %descriptor.source(), "Mock load submitted");
        Ok(handle)
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
        if !self.loaded.contains(&handle) {
            return Err(PlaybackError::UnknownHandle(handle));
        }

        self.next_stream += 1;
        let stream = StreamId(self.next_stream);
        self.calls.push(PlaybackCall::Play {
            stream,
            handle,
            left_volume,
            right_volume,
            loop_count,
            priority,
            rate,
        });
        self.active_streams.insert(stream);
        Ok(stream)
    }

    fn stop(&mut self, stream: StreamId) {
        self.calls.push(PlaybackCall::Stop(stream));
        self.active_streams.remove(&stream);
    }
}
