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

//! An in-memory sample pool that decodes WAV files on a loader thread.
//!
//! Loads are decoded one request at a time on a single worker thread and
//! completions are reported through a channel that the control thread drains.
//! Mixing is not done here; streams are only tracked.

use std::collections::HashMap;
use std::error::Error;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use hound::{SampleFormat, WavReader};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::{LoadCompletion, PlaybackError, PlaybackPrimitive, SampleHandle, StreamId};
use crate::samples::{ResourceRef, SampleDescriptor};

/// Decoded audio for one sample.
#[derive(Clone, Debug)]
pub struct DecodedSample {
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl DecodedSample {
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.data.len() / usize::from(self.channel_count.max(1))
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// A stream started by [`MemoryPlayback::play`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveStream {
    pub handle: SampleHandle,
    pub left_volume: f32,
    pub right_volume: f32,
    pub loop_count: i32,
    pub priority: i32,
    pub rate: f32,
}

enum LoadSource {
    File(std::path::PathBuf),
    Bytes(Arc<[u8]>),
}

struct LoadRequest {
    handle: SampleHandle,
    source: LoadSource,
}

type SamplePool = Arc<RwLock<HashMap<SampleHandle, DecodedSample>>>;

/// Sample pool with a fixed stream capacity, backed by a decoding thread.
pub struct MemoryPlayback {
    requests: Option<Sender<LoadRequest>>,
    completions: Receiver<LoadCompletion>,
    samples: SamplePool,
    resources: HashMap<u32, Arc<[u8]>>,
    streams: HashMap<StreamId, ActiveStream>,
    /// Stream start order, oldest first.
    stream_order: Vec<StreamId>,
    max_streams: usize,
    next_handle: u32,
    next_stream: u32,
    worker: Option<thread::JoinHandle<()>>,
}

impl MemoryPlayback {
    /// Creates a pool that plays at most `max_streams` streams at once.
    pub fn new(max_streams: u32) -> Result<Self, Box<dyn Error>> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<LoadRequest>();
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
        let samples: SamplePool = Arc::new(RwLock::new(HashMap::new()));

        let worker = {
            let samples = samples.clone();
            thread::Builder::new()
                .name("sample-loader".to_string())
                .spawn(move || Self::load_worker(request_rx, completion_tx, samples))?
        };

        Ok(Self {
            requests: Some(request_tx),
            completions: completion_rx,
            samples,
            resources: HashMap::new(),
            streams: HashMap::new(),
            stream_order: Vec::new(),
            max_streams: usize::try_from(max_streams.max(1)).unwrap_or(usize::MAX),
            next_handle: 0,
            next_stream: 0,
            worker: Some(worker),
        })
    }

    /// Registers the bytes of an embedded resource.
    pub fn register_resource(&mut self, id: u32, bytes: impl Into<Arc<[u8]>>) {
        self.resources.insert(id, bytes.into());
    }

    /// The channel on which load completions arrive. Drain it on the control thread.
    pub fn completions(&self) -> &Receiver<LoadCompletion> {
        &self.completions
    }

    /// Returns a decoded sample, if its load has completed.
    pub fn sample(&self, handle: SampleHandle) -> Option<DecodedSample> {
        self.samples.read().get(&handle).cloned()
    }

    pub fn active_streams(&self) -> &HashMap<StreamId, ActiveStream> {
        &self.streams
    }

    /// Returns the total memory used by decoded samples.
    pub fn total_memory_usage(&self) -> usize {
        self.samples.read().values().map(|s| s.memory_size()).sum()
    }

    fn load_worker(requests: Receiver<LoadRequest>, completions: Sender<LoadCompletion>, samples: SamplePool) {
        for request in requests {
            let success = match decode(&request.source) {
                Ok(decoded) => {
                    debug!(
                        handle = request.handle.0,
                        channels = decoded.channel_count,
                        sample_rate = decoded.sample_rate,
                        frames = decoded.frame_count(),
                        "Sample decoded"
                    );
                    samples.write().insert(request.handle, decoded);
                    true
                }
                Err(e) => {
                    warn!(handle = request.handle.0, error = %e, "Failed to decode sample");
                    false
                }
            };

            if completions
                .send(LoadCompletion {
                    handle: request.handle,
                    success,
                })
                .is_err()
            {
                // The pool was dropped.
                break;
            }
        }
        debug!("Sample loader thread exiting");
    }
}

fn decode(source: &LoadSource) -> Result<DecodedSample, hound::Error> {
    match source {
        LoadSource::File(path) => decode_reader(WavReader::open(path)?),
        LoadSource::Bytes(bytes) => decode_reader(WavReader::new(Cursor::new(bytes.clone()))?),
    }
}

fn decode_reader<R: Read>(reader: WavReader<R>) -> Result<DecodedSample, hound::Error> {
    let spec = reader.spec();
    let data = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(DecodedSample {
        data: Arc::new(data),
        channel_count: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

impl PlaybackPrimitive for MemoryPlayback {
    fn submit_load(&mut self, descriptor: &SampleDescriptor) -> Result<SampleHandle, PlaybackError> {
        let source = match descriptor.source() {
            ResourceRef::Embedded(id) => LoadSource::Bytes(
                self.resources
                    .get(id)
                    .cloned()
                    .ok_or(PlaybackError::UnknownResource(*id))?,
            ),
            ResourceRef::External(path) => LoadSource::File(path.clone()),
        };

        self.next_handle += 1;
        let handle = SampleHandle(self.next_handle);
        let requests = self.requests.as_ref().ok_or(PlaybackError::Disconnected)?;
        requests
            .send(LoadRequest { handle, source })
            .map_err(|_| PlaybackError::Disconnected)?;

        debug!(handle = handle.0, source = %descriptor.source(), "Load submitted");
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
        if !self.samples.read().contains_key(&handle) {
            return Err(PlaybackError::UnknownHandle(handle));
        }

        // Steal the oldest stream once the pool is full.
        if self.streams.len() >= self.max_streams && !self.stream_order.is_empty() {
            let oldest = self.stream_order.remove(0);
            self.streams.remove(&oldest);
            info!(stream = oldest.0, max_streams = self.max_streams, "Stream limit reached, stealing oldest");
        }

        self.next_stream += 1;
        let stream = StreamId(self.next_stream);
        self.streams.insert(
            stream,
            ActiveStream {
                handle,
                left_volume,
                right_volume,
                loop_count,
                priority,
                rate,
            },
        );
        self.stream_order.push(stream);
        Ok(stream)
    }

    fn stop(&mut self, stream: StreamId) {
        if self.streams.remove(&stream).is_some() {
            self.stream_order.retain(|s| *s != stream);
        }
    }
}

impl Drop for MemoryPlayback {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Sample loader thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for MemoryPlayback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPlayback")
            .field("samples", &self.samples.read().len())
            .field("active_streams", &self.streams.len())
            .field("max_streams", &self.max_streams)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}
