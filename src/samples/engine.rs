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

//! Main sample engine that coordinates instruments, progressive loading, and playback.

use std::collections::HashSet;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::catalog::{DuplicatePolicy, SampleCatalog};
use super::discovery::{discover, DirectoryDiscovery, ManifestDiscovery, SampleDiscovery};
use super::error::SampleError;
use super::instrument::Instrument;
use super::limiter::LimitReport;
use super::loader::{CancelHandle, LoadState, ProgressiveLoader};
use super::resolver::Resolution;
use super::selector::{select_playback, PlaybackSelection, VelocitySettings};
use super::voice::{KeyId, VoiceManager};
use crate::config::{InstrumentSource, KeyboardConfig};
use crate::playback::{LoadCompletion, LoopMode, PlaybackPrimitive, StreamId, NOTE_PRIORITY};

/// Progress notifications for the key layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadEvent {
    /// A sample finished loading. Keys resolving to this root can now play.
    SampleLoaded {
        instrument: String,
        pitch: u8,
        velocity: u8,
    },
    /// Every queued sample has been processed.
    Finished { loaded: usize, failed: usize },
    Cancelled,
}

/// The sample engine owns every instrument and drives the playback primitive.
///
/// All calls happen on one control thread. Load completions reported by the
/// primitive must be handed to [`SampleEngine::on_load_complete`] on that thread.
pub struct SampleEngine<P: PlaybackPrimitive> {
    playback: P,
    instruments: Vec<Instrument>,
    loader: Option<ProgressiveLoader>,
    cancel_handle: CancelHandle,
    voices: VoiceManager,
    settings: VelocitySettings,
    duplicate_policy: DuplicatePolicy,
    loop_mode: LoopMode,
    subscribers: Mutex<Vec<Sender<LoadEvent>>>,
}

impl<P: PlaybackPrimitive> SampleEngine<P> {
    /// Creates an engine without instruments.
    pub fn new(playback: P, polyphony_count: u32, settings: VelocitySettings) -> Self {
        Self {
            playback,
            instruments: Vec::new(),
            loader: None,
            cancel_handle: CancelHandle::new(),
            voices: VoiceManager::new(polyphony_count),
            settings,
            duplicate_policy: DuplicatePolicy::default(),
            loop_mode: LoopMode::default(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Creates an engine and discovers every configured instrument.
    ///
    /// Visible pitch ranges, if configured, are applied to every instrument.
    pub fn from_config(playback: P, config: &KeyboardConfig) -> Result<Self, SampleError> {
        let mut engine = Self::new(playback, config.polyphony_count(), config.velocity_settings());
        engine.duplicate_policy = config.duplicate_policy();
        engine.voices.set_sustain(config.sustain());

        for instrument in config.instruments() {
            let discovery: Box<dyn SampleDiscovery> = match instrument.source()? {
                InstrumentSource::Directory(root) => Box::new(DirectoryDiscovery::new(root)),
                InstrumentSource::Manifest(path) => Box::new(ManifestDiscovery::from_file(path)?),
            };
            engine.add_instrument(instrument.name(), discovery.as_ref())?;
        }

        if let Some(visible_pitches) = config.visible_pitches() {
            engine.limit_all(&visible_pitches)?;
        }
        Ok(engine)
    }

    /// Discovers an instrument's samples and resolves its pitches.
    pub fn add_instrument(
        &mut self,
        name: &str,
        discovery: &dyn SampleDiscovery,
    ) -> Result<&Instrument, SampleError> {
        let catalog = discover(discovery, name, self.duplicate_policy)?;
        self.add_catalog(name, catalog)
    }

    /// Adds an instrument from an already built catalog. Replaces an instrument of the same name.
    pub fn add_catalog(&mut self, name: &str, catalog: SampleCatalog) -> Result<&Instrument, SampleError> {
        self.ensure_not_loading()?;
        let instrument = Instrument::new(name, catalog)?;

        let index = match self.instruments.iter().position(|i| i.name() == name) {
            Some(index) => {
                warn!(instrument = name, "Replacing instrument");
                self.instruments[index] = instrument;
                index
            }
            None => {
                self.instruments.push(instrument);
                self.instruments.len() - 1
            }
        };
        Ok(&self.instruments[index])
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn instrument(&self, name: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.name() == name)
    }

    /// Looks up how a pitch of an instrument is played.
    pub fn resolve(&self, instrument: &str, pitch: u8) -> Result<Resolution, SampleError> {
        self.find(instrument)?
            .resolve(pitch)
            .ok_or(SampleError::PitchUnresolved { pitch })
    }

    /// Restricts an instrument to the visible pitches. Only allowed before loading starts.
    pub fn limit_range(
        &mut self,
        instrument: &str,
        visible_pitches: &HashSet<u8>,
    ) -> Result<LimitReport, SampleError> {
        self.ensure_not_loading()?;
        let instrument = self
            .instruments
            .iter_mut()
            .find(|i| i.name() == instrument)
            .ok_or_else(|| SampleError::UnknownInstrument(instrument.to_string()))?;
        Ok(instrument.limit_range(visible_pitches))
    }

    /// Restricts every instrument to the visible pitches.
    pub fn limit_all(&mut self, visible_pitches: &HashSet<u8>) -> Result<Vec<LimitReport>, SampleError> {
        self.ensure_not_loading()?;
        let reports: Vec<LimitReport> = self
            .instruments
            .iter_mut()
            .map(|instrument| instrument.limit_range(visible_pitches))
            .collect();
        info!(
            instruments = reports.len(),
            removed_pitches = reports.iter().map(|r| r.removed_pitches.len()).sum::<usize>(),
            "Limited all instruments to the visible range"
        );
        Ok(reports)
    }

    /// Starts progressive loading of every instrument. Later calls only report the state.
    pub fn start_loading(&mut self) -> LoadState {
        if let Some(loader) = &self.loader {
            warn!(state = ?loader.state(), "Loading already started");
            return loader.state();
        }

        let mut loader = ProgressiveLoader::new(
            self.instruments
                .iter()
                .enumerate()
                .map(|(index, instrument)| (index, instrument.catalog())),
            self.cancel_handle.clone(),
        );
        let state = loader.start(&mut self.playback);
        self.loader = Some(loader);
        self.notify_terminal(LoadState::Idle, state);
        state
    }

    /// Hands a completion from the playback primitive to the loader.
    pub fn on_load_complete(&mut self, completion: LoadCompletion) -> LoadState {
        let Some(loader) = self.loader.as_mut() else {
            warn!(handle = completion.handle.0, "Load completion before loading started");
            return LoadState::Idle;
        };

        let previous = loader.state();
        let step = loader.on_load_complete(completion, &mut self.playback);
        if let Some(loaded) = step.loaded {
            if let Some(instrument) = self.instruments.get_mut(loaded.instrument) {
                instrument
                    .pool_mut()
                    .insert(loaded.pitch, loaded.velocity, loaded.handle);
                let name = instrument.name().to_string();
                self.send(LoadEvent::SampleLoaded {
                    instrument: name,
                    pitch: loaded.pitch,
                    velocity: loaded.velocity,
                });
            }
        }
        self.notify_terminal(previous, step.state);
        step.state
    }

    /// True once every sample of every instrument has been processed.
    pub fn is_fully_loaded(&self) -> bool {
        self.loader.as_ref().is_some_and(ProgressiveLoader::is_finished)
    }

    pub fn loading_state(&self) -> LoadState {
        self.loader.as_ref().map_or(LoadState::Idle, ProgressiveLoader::state)
    }

    /// The loader, once loading has started.
    pub fn loader(&self) -> Option<&ProgressiveLoader> {
        self.loader.as_ref()
    }

    /// Subscribes to loading progress events.
    ///
    /// Every subscriber receives every event sent after it subscribed. Dropping
    /// the receiver unsubscribes.
    pub fn load_events(&self) -> Receiver<LoadEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// A handle that stops loading from another owner, e.g. on shutdown.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Stops submitting loads. Samples already loaded stay playable.
    pub fn cancel_loading(&mut self) {
        match self.loader.as_mut() {
            Some(loader) => loader.cancel(),
            None => self.cancel_handle.cancel(),
        }
    }

    /// Selects what a pitch played at a pressure sounds like, without playing it.
    pub fn select_playback(
        &self,
        instrument: &str,
        pitch: u8,
        pressure: f32,
    ) -> Result<PlaybackSelection, SampleError> {
        let instrument = self.find(instrument)?;
        select_playback(
            instrument.resolution(),
            instrument.pool(),
            pitch,
            pressure,
            &self.settings,
        )
    }

    /// Plays a key. Any previous streams of the key stop after the new ones started.
    pub fn note_on(
        &mut self,
        instrument: &str,
        key: KeyId,
        pitch: u8,
        pressure: f32,
    ) -> Result<Vec<StreamId>, SampleError> {
        let selection = self.select_playback(instrument, pitch, pressure)?;

        let mut streams = Vec::with_capacity(selection.layers.len());
        for layer in &selection.layers {
            let result = self.playback.play(
                layer.handle,
                layer.volume,
                layer.volume,
                self.loop_mode.loop_count(),
                NOTE_PRIORITY,
                selection.rate,
            );
            match result {
                Ok(stream) => streams.push(stream),
                Err(e) => {
                    for stream in streams {
                        self.playback.stop(stream);
                    }
                    return Err(e.into());
                }
            }
        }

        for stream in self.voices.press(key, streams.clone()) {
            self.playback.stop(stream);
        }
        debug!(
            instrument,
            key = key.0,
            pitch,
            streams = streams.len(),
            "Note on"
        );
        Ok(streams)
    }

    /// Releases a key. Its streams keep playing while sustain is on.
    pub fn note_off(&mut self, key: KeyId) {
        let to_stop = self.voices.release(key);
        let stopped = to_stop.len();
        for stream in to_stop {
            self.playback.stop(stream);
        }
        debug!(key = key.0, stopped, "Note off");
    }

    /// Turns sustain on or off. Turning it off stops every released key.
    pub fn set_sustain(&mut self, sustain: bool) {
        for stream in self.voices.set_sustain(sustain) {
            self.playback.stop(stream);
        }
    }

    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
    }

    pub fn set_velocity_settings(&mut self, settings: VelocitySettings) {
        self.settings = settings;
    }

    pub fn velocity_settings(&self) -> &VelocitySettings {
        &self.settings
    }

    /// Stops all sample playback.
    pub fn stop_all(&mut self) {
        let to_stop = self.voices.clear();
        let stopped_count = to_stop.len();
        for stream in to_stop {
            self.playback.stop(stream);
        }

        if stopped_count > 0 {
            info!(stopped = stopped_count, "All samples stopped");
        }
    }

    /// Returns the number of keys currently sounding.
    pub fn active_voice_count(&self) -> usize {
        self.voices.active_count()
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    fn find(&self, instrument: &str) -> Result<&Instrument, SampleError> {
        self.instrument(instrument)
            .ok_or_else(|| SampleError::UnknownInstrument(instrument.to_string()))
    }

    fn ensure_not_loading(&self) -> Result<(), SampleError> {
        match self.loader {
            Some(_) => Err(SampleError::LoadingStarted),
            None => Ok(()),
        }
    }

    fn notify_terminal(&self, previous: LoadState, state: LoadState) {
        if previous == state {
            return;
        }
        match (state, &self.loader) {
            (LoadState::Done, Some(loader)) => self.send(LoadEvent::Finished {
                loaded: loader.loaded_count(),
                failed: loader.failed_count(),
            }),
            (LoadState::Cancelled, _) => self.send(LoadEvent::Cancelled),
            _ => {}
        }
    }

    fn send(&self, event: LoadEvent) {
        self.subscribers.lock().retain(|subscriber| match subscriber.send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!("Dropping disconnected load event subscriber");
                false
            }
        });
    }
}

impl<P: PlaybackPrimitive> std::fmt::Debug for SampleEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleEngine")
            .field("instruments", &self.instruments.len())
            .field("loading_state", &self.loading_state())
            .field("active_voices", &self.active_voice_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::mock::PlaybackCall;
    use crate::playback::MockPlayback;
    use crate::testutil::catalog_of;

    fn engine_with(catalogs: &[(&str, &[(u8, u8)])]) -> SampleEngine<MockPlayback> {
        let mut engine = SampleEngine::new(MockPlayback::new(), 8, VelocitySettings::default());
        for (name, samples) in catalogs {
            engine.add_catalog(name, catalog_of(samples)).unwrap();
        }
        engine
    }

    fn load_everything(engine: &mut SampleEngine<MockPlayback>) {
        engine.start_loading();
        while let Some(completion) = engine.playback_mut().next_completion() {
            engine.on_load_complete(completion);
        }
    }

    #[test]
    fn test_rejects_empty_instrument() {
        let mut engine = engine_with(&[]);
        let err = engine.add_catalog("empty", SampleCatalog::new()).unwrap_err();
        assert!(matches!(err, SampleError::NoSamplesDiscovered { .. }));
        assert!(engine.instruments().is_empty());
    }

    #[test]
    fn test_resolve() {
        let engine = engine_with(&[("piano", &[(60, 127), (72, 127)])]);

        let resolution = engine.resolve("piano", 78).unwrap();
        assert_eq!(resolution.root_pitch(), 72);
        assert!((resolution.rate() - 2f32.sqrt()).abs() < 1e-4);
        assert!(matches!(
            engine.resolve("organ", 60),
            Err(SampleError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn test_progressive_loading_events() {
        let mut engine = engine_with(&[("piano", &[(60, 127), (72, 127)]), ("marimba", &[(48, 100)])]);
        let events = engine.load_events();

        assert_eq!(engine.start_loading(), LoadState::LoadingSample);
        assert!(matches!(
            engine.select_playback("piano", 60, 1.0),
            Err(SampleError::NotLoadedYet { .. })
        ));

        let completion = engine.playback_mut().next_completion().unwrap();
        assert_eq!(engine.on_load_complete(completion), LoadState::LoadingSample);
        assert_eq!(
            events.try_recv().unwrap(),
            LoadEvent::SampleLoaded {
                instrument: "piano".to_string(),
                pitch: 60,
                velocity: 127
            }
        );
        assert!(engine.select_playback("piano", 62, 1.0).is_ok());
        assert!(!engine.is_fully_loaded());

        while let Some(completion) = engine.playback_mut().next_completion() {
            engine.on_load_complete(completion);
        }
        assert!(engine.is_fully_loaded());
        let remaining: Vec<LoadEvent> = events.try_iter().collect();
        assert_eq!(remaining.len(), 3);
        assert_eq!(remaining[2], LoadEvent::Finished { loaded: 3, failed: 0 });
    }

    #[test]
    fn test_every_subscriber_receives_every_event() {
        let mut engine = engine_with(&[("piano", &[(60, 127), (62, 127), (64, 127)])]);
        let ui = engine.load_events();
        let status = engine.load_events();
        load_everything(&mut engine);

        let ui: Vec<LoadEvent> = ui.try_iter().collect();
        let status: Vec<LoadEvent> = status.try_iter().collect();
        assert_eq!(ui.len(), 4);
        assert_eq!(ui, status);
        assert_eq!(ui[3], LoadEvent::Finished { loaded: 3, failed: 0 });
    }

    #[test]
    fn test_dropped_subscriber_is_removed() {
        let mut engine = engine_with(&[("piano", &[(60, 127), (62, 127)])]);
        let kept = engine.load_events();
        drop(engine.load_events());
        load_everything(&mut engine);

        assert_eq!(engine.subscribers.lock().len(), 1);
        assert_eq!(kept.try_iter().count(), 3);
    }

    #[test]
    fn test_events_without_subscribers_are_not_buffered() {
        let mut engine = engine_with(&[("piano", &[(60, 127)])]);
        load_everything(&mut engine);

        let late = engine.load_events();
        assert!(late.try_recv().is_err());
        assert!(engine.is_fully_loaded());
    }

    #[test]
    fn test_limit_range_before_loading() {
        let mut engine = engine_with(&[("piano", &[(48, 127), (60, 127), (72, 127)])]);
        let report = engine.limit_range("piano", &HashSet::from([60, 61, 62])).unwrap();
        assert_eq!(report.removed_pitches, vec![48, 72]);

        load_everything(&mut engine);
        assert_eq!(engine.playback().submitted().len(), 1);
        assert!(matches!(
            engine.limit_range("piano", &HashSet::from([60])),
            Err(SampleError::LoadingStarted)
        ));
        assert!(matches!(
            engine.add_catalog("organ", catalog_of(&[(60, 127)])),
            Err(SampleError::LoadingStarted)
        ));
    }

    #[test]
    fn test_note_on_plays_crossfade() {
        let mut engine = engine_with(&[("piano", &[(60, 40), (60, 100)])]);
        engine.set_velocity_settings(VelocitySettings {
            relative_velocity_range: true,
            ..Default::default()
        });
        load_everything(&mut engine);

        let streams = engine.note_on("piano", KeyId(1), 60, 0.5).unwrap();
        assert_eq!(streams.len(), 2);
        let plays: Vec<&PlaybackCall> = engine
            .playback()
            .calls()
            .iter()
            .filter(|c| matches!(c, PlaybackCall::Play { .. }))
            .collect();
        for call in plays {
            let PlaybackCall::Play {
                left_volume,
                right_volume,
                loop_count,
                priority,
                rate,
                ..
            } = call
            else {
                unreachable!();
            };
            assert!((left_volume - 0.5).abs() < 1e-5);
            assert_eq!(left_volume, right_volume);
            assert_eq!(*loop_count, 0);
            assert_eq!(*priority, NOTE_PRIORITY);
            assert_eq!(*rate, 1.0);
        }
    }

    #[test]
    fn test_repress_starts_new_before_stopping_old() {
        let mut engine = engine_with(&[("piano", &[(60, 127)])]);
        load_everything(&mut engine);

        let first = engine.note_on("piano", KeyId(1), 60, 1.0).unwrap();
        let second = engine.note_on("piano", KeyId(1), 60, 1.0).unwrap();

        let calls = engine.playback().calls();
        let tail = &calls[calls.len() - 2..];
        assert!(matches!(tail[0], PlaybackCall::Play { stream, .. } if stream == second[0]));
        assert_eq!(tail[1], PlaybackCall::Stop(first[0]));
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[test]
    fn test_note_off_and_sustain() {
        let mut engine = engine_with(&[("piano", &[(60, 127)])]);
        load_everything(&mut engine);

        engine.note_on("piano", KeyId(1), 60, 1.0).unwrap();
        engine.note_off(KeyId(1));
        assert!(engine.playback().active_streams().is_empty());

        engine.set_sustain(true);
        engine.note_on("piano", KeyId(1), 62, 1.0).unwrap();
        engine.note_off(KeyId(1));
        assert_eq!(engine.playback().active_streams().len(), 1);

        engine.set_sustain(false);
        assert!(engine.playback().active_streams().is_empty());
    }

    #[test]
    fn test_loop_mode() {
        let mut engine = engine_with(&[("piano", &[(60, 127)])]);
        load_everything(&mut engine);
        engine.set_loop_mode(LoopMode::Forever);

        engine.note_on("piano", KeyId(1), 60, 1.0).unwrap();
        assert!(engine
            .playback()
            .calls()
            .iter()
            .any(|c| matches!(c, PlaybackCall::Play { loop_count: -1, .. })));
    }

    #[test]
    fn test_note_on_before_load_is_silent() {
        let mut engine = engine_with(&[("piano", &[(60, 127)])]);
        engine.start_loading();

        let err = engine.note_on("piano", KeyId(1), 60, 1.0).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_stop_all() {
        let mut engine = engine_with(&[("piano", &[(60, 127)])]);
        load_everything(&mut engine);
        engine.note_on("piano", KeyId(1), 60, 1.0).unwrap();
        engine.note_on("piano", KeyId(2), 64, 1.0).unwrap();

        engine.stop_all();
        assert_eq!(engine.active_voice_count(), 0);
        assert!(engine.playback().active_streams().is_empty());
    }

    #[test]
    fn test_cancel_loading() {
        let mut engine = engine_with(&[("piano", &[(60, 127), (62, 127), (64, 127)])]);
        let events = engine.load_events();
        engine.start_loading();

        engine.cancel_handle().cancel();
        let completion = engine.playback_mut().next_completion().unwrap();
        assert_eq!(engine.on_load_complete(completion), LoadState::Cancelled);

        assert!(engine.select_playback("piano", 60, 1.0).is_ok());
        assert!(!engine.is_fully_loaded());
        assert_eq!(engine.playback().submitted().len(), 1);
        let events: Vec<LoadEvent> = events.try_iter().collect();
        assert_eq!(events.last(), Some(&LoadEvent::Cancelled));
    }

    #[test]
    fn test_cancel_before_start() {
        let mut engine = engine_with(&[("piano", &[(60, 127)])]);
        engine.cancel_loading();
        assert_eq!(engine.start_loading(), LoadState::Cancelled);
        assert!(engine.playback().submitted().is_empty());
    }
}
