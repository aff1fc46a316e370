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

//! Progressive sample loading.
//!
//! Samples are submitted to the playback primitive one at a time: the next
//! load is only submitted once the primitive reports completion of the
//! previous one. The load queue is a snapshot of the catalogs taken when the
//! loader is created: instruments in order, then pitch groups ascending, then
//! velocities ascending. The current position is a plain index cursor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::catalog::SampleCatalog;
use super::descriptor::SampleDescriptor;
use crate::playback::{LoadCompletion, PlaybackPrimitive, SampleHandle};

/// Stops a loading session from submitting further loads.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Where the loader is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Not started yet.
    Idle,
    /// One load is in flight.
    LoadingSample,
    /// Every queued sample has been processed.
    Done,
    /// Cancelled before the queue drained.
    Cancelled,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Done | LoadState::Cancelled)
    }
}

/// Position in the load queue: instrument, pitch group within it, velocity within the group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadCursor {
    pub instrument: usize,
    pub group: usize,
    pub velocity: usize,
}

/// A sample whose load completed successfully.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadedSample {
    /// Index of the instrument, as given to [`ProgressiveLoader::new`].
    pub instrument: usize,
    pub pitch: u8,
    pub velocity: u8,
    pub handle: SampleHandle,
}

/// The outcome of handing one completion to the loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadStep {
    /// The sample to add to the pool, if the completion was for the in-flight load and succeeded.
    pub loaded: Option<LoadedSample>,
    pub state: LoadState,
}

struct InstrumentQueue {
    instrument: usize,
    /// Pitch groups, ascending by pitch; each group ascending by velocity.
    groups: Vec<Vec<SampleDescriptor>>,
}

struct InFlight {
    instrument: usize,
    pitch: u8,
    velocity: u8,
    handle: SampleHandle,
}

/// Drives loading of every queued sample, one at a time.
pub struct ProgressiveLoader {
    queues: Vec<InstrumentQueue>,
    cursor: LoadCursor,
    state: LoadState,
    in_flight: Option<InFlight>,
    cancel_handle: CancelHandle,
    total: usize,
    loaded: usize,
    failed: usize,
}

impl ProgressiveLoader {
    /// Snapshots the catalogs to load. Each catalog is tagged with the index reported back
    /// in [`LoadedSample::instrument`].
    pub fn new<'a, I>(catalogs: I, cancel_handle: CancelHandle) -> Self
    where
        I: IntoIterator<Item = (usize, &'a SampleCatalog)>,
    {
        let queues: Vec<InstrumentQueue> = catalogs
            .into_iter()
            .map(|(instrument, catalog)| InstrumentQueue {
                instrument,
                groups: catalog
                    .groups()
                    .map(|(_, group)| {
                        let mut group = group.to_vec();
                        group.sort_by_key(SampleDescriptor::velocity);
                        group
                    })
                    .collect(),
            })
            .collect();
        let total = queues
            .iter()
            .flat_map(|q| q.groups.iter())
            .map(Vec::len)
            .sum();

        Self {
            queues,
            cursor: LoadCursor::default(),
            state: LoadState::Idle,
            in_flight: None,
            cancel_handle,
            total,
            loaded: 0,
            failed: 0,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn cursor(&self) -> LoadCursor {
        self.cursor
    }

    /// True once every queued sample has been processed.
    pub fn is_finished(&self) -> bool {
        self.state == LoadState::Done
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }

    /// Samples not processed yet, including the one in flight.
    pub fn remaining(&self) -> usize {
        self.total - self.loaded - self.failed
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Cancels loading. A load already in flight is still accepted when it completes.
    pub fn cancel(&mut self) {
        self.cancel_handle.cancel();
        if self.state == LoadState::Idle {
            self.state = LoadState::Cancelled;
        }
    }

    /// Submits the first sample. Does nothing if loading has already started.
    pub fn start<P>(&mut self, playback: &mut P) -> LoadState
    where
        P: PlaybackPrimitive + ?Sized,
    {
        if self.state != LoadState::Idle {
            warn!(state = ?self.state, "{}", self.start_refusal());
            return self.state;
        }

        info!(
            instruments = self.queues.len(),
            samples = self.total,
            "Starting progressive sample loading"
        );
        if self.total == 0 {
            warn!("No samples to load for any instrument");
        }
        self.advance(playback)
    }

    /// Why [`ProgressiveLoader::start`] did nothing.
    fn start_refusal(&self) -> &'static str {
        match self.state {
            LoadState::Cancelled if self.loaded + self.failed == 0 => "Loading cancelled before start",
            LoadState::Cancelled => "Loading was cancelled",
            LoadState::Done => "Loading already finished",
            LoadState::Idle | LoadState::LoadingSample => "Loading already started",
        }
    }

    /// Handles the completion of the in-flight load and submits the next sample.
    ///
    /// Completions for any other handle are ignored. A failed load is counted and skipped.
    pub fn on_load_complete<P>(&mut self, completion: LoadCompletion, playback: &mut P) -> LoadStep
    where
        P: PlaybackPrimitive + ?Sized,
    {
        let in_flight = match self.in_flight.take() {
            Some(in_flight) if in_flight.handle == completion.handle => in_flight,
            other => {
                self.in_flight = other;
                warn!(
                    handle = completion.handle.0,
                    state = ?self.state,
                    "Ignoring completion for a load that is not in flight"
                );
                return LoadStep {
                    loaded: None,
                    state: self.state,
                };
            }
        };

        let loaded = if completion.success {
            self.loaded += 1;
            Some(LoadedSample {
                instrument: in_flight.instrument,
                pitch: in_flight.pitch,
                velocity: in_flight.velocity,
                handle: in_flight.handle,
            })
        } else {
            self.failed += 1;
            warn!(
                pitch = in_flight.pitch,
                velocity = in_flight.velocity,
                "Sample failed to load, skipping"
            );
            None
        };

        self.cursor.velocity += 1;
        let state = self.advance(playback);
        LoadStep { loaded, state }
    }

    /// Moves the cursor forward until a load is submitted or the queue is exhausted.
    fn advance<P>(&mut self, playback: &mut P) -> LoadState
    where
        P: PlaybackPrimitive + ?Sized,
    {
        loop {
            if self.cancel_handle.is_cancelled() {
                info!(
                    loaded = self.loaded,
                    failed = self.failed,
                    remaining = self.remaining(),
                    "Sample loading cancelled"
                );
                self.state = LoadState::Cancelled;
                return self.state;
            }

            let Some(queue) = self.queues.get(self.cursor.instrument) else {
                info!(
                    loaded = self.loaded,
                    failed = self.failed,
                    "Finished loading samples"
                );
                self.state = LoadState::Done;
                return self.state;
            };
            let Some(group) = queue.groups.get(self.cursor.group) else {
                self.cursor = LoadCursor {
                    instrument: self.cursor.instrument + 1,
                    group: 0,
                    velocity: 0,
                };
                continue;
            };
            let Some(descriptor) = group.get(self.cursor.velocity) else {
                self.cursor.group += 1;
                self.cursor.velocity = 0;
                continue;
            };

            match playback.submit_load(descriptor) {
                Ok(handle) => {
                    debug!(
                        instrument = queue.instrument,
                        pitch = descriptor.pitch(),
                        velocity = descriptor.velocity(),
                        handle = handle.0,
                        "Loading sample"
                    );
                    self.in_flight = Some(InFlight {
                        instrument: queue.instrument,
                        pitch: descriptor.pitch(),
                        velocity: descriptor.velocity(),
                        handle,
                    });
                    self.state = LoadState::LoadingSample;
                    return self.state;
                }
                Err(e) => {
                    // No completion will arrive for a rejected request.
                    warn!(
                        pitch = descriptor.pitch(),
                        velocity = descriptor.velocity(),
                        error = %e,
                        "Load request rejected, skipping"
                    );
                    self.failed += 1;
                    self.cursor.velocity += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for ProgressiveLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressiveLoader")
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("total", &self.total)
            .field("loaded", &self.loaded)
            .field("failed", &self.failed)
            .finish()
    }
}
