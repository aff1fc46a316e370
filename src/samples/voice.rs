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

//! Voice management for pressed keys.
//!
//! Handles voice allocation, stealing, re-presses and sustain. The manager
//! never talks to the playback primitive itself: every call returns the
//! streams the caller must stop.

use tracing::{debug, warn};

use crate::playback::StreamId;

/// Identifies a key on the layout. Several keys may share a pitch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u32);

/// The streams started by one key press.
#[derive(Debug)]
struct Voice {
    /// Allocation order, used to find the oldest voice.
    id: u64,
    key: KeyId,
    /// Zero to two streams, one per velocity layer.
    streams: Vec<StreamId>,
    /// Released while sustain was on.
    released: bool,
}

/// Manages the voices of pressed (and sustained) keys.
pub struct VoiceManager {
    voices: Vec<Voice>,
    max_voices: u32,
    sustain: bool,
    next_voice_id: u64,
}

impl VoiceManager {
    /// Creates a new voice manager. At least one voice is always allowed.
    pub fn new(max_voices: u32) -> Self {
        Self {
            voices: Vec::new(),
            max_voices: max_voices.max(1),
            sustain: false,
            next_voice_id: 0,
        }
    }

    /// Records the streams just started for a key press.
    ///
    /// Returns the streams to stop: any previous voice of the same key, then
    /// the oldest voices if the polyphony limit is exceeded. The caller starts
    /// the new streams before stopping these so re-presses don't gap.
    pub fn press(&mut self, key: KeyId, streams: Vec<StreamId>) -> Vec<StreamId> {
        let mut to_stop = self.take_voices(|v| v.key == key);

        while self.voices.len() >= self.max_voices as usize {
            let Some(oldest) = self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.id)
                .map(|(index, _)| index)
            else {
                break;
            };
            let stolen = self.voices.remove(oldest);
            warn!(
                max_voices = self.max_voices,
                key = stolen.key.0,
                "Voice limit reached, stealing oldest"
            );
            to_stop.extend(stolen.streams);
        }

        self.next_voice_id += 1;
        self.voices.push(Voice {
            id: self.next_voice_id,
            key,
            streams,
            released: false,
        });
        to_stop
    }

    /// Handles a key release. Returns the streams to stop, none while sustain is on.
    pub fn release(&mut self, key: KeyId) -> Vec<StreamId> {
        if self.sustain {
            for voice in self.voices.iter_mut().filter(|v| v.key == key) {
                voice.released = true;
            }
            debug!(key = key.0, "Key released under sustain");
            return Vec::new();
        }
        self.take_voices(|v| v.key == key)
    }

    /// Turns sustain on or off. Turning it off returns the streams of keys released meanwhile.
    pub fn set_sustain(&mut self, sustain: bool) -> Vec<StreamId> {
        self.sustain = sustain;
        if sustain {
            return Vec::new();
        }
        self.take_voices(|v| v.released)
    }

    pub fn is_sustained(&self) -> bool {
        self.sustain
    }

    /// True if the key has a sounding voice.
    pub fn is_active(&self, key: KeyId) -> bool {
        self.voices.iter().any(|v| v.key == key)
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Clears all voices, returning every stream to stop.
    pub fn clear(&mut self) -> Vec<StreamId> {
        self.voices.drain(..).flat_map(|v| v.streams).collect()
    }

    fn take_voices<F>(&mut self, matches: F) -> Vec<StreamId>
    where
        F: Fn(&Voice) -> bool,
    {
        let mut streams = Vec::new();
        self.voices.retain_mut(|voice| {
            if matches(voice) {
                streams.append(&mut voice.streams);
                false
            } else {
                true
            }
        });
        streams
    }
}

impl std::fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceManager")
            .field("active_voices", &self.voices.len())
            .field("max_voices", &self.max_voices)
            .field("sustain", &self.sustain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streams(ids: &[u32]) -> Vec<StreamId> {
        ids.iter().copied().map(StreamId).collect()
    }

    #[test]
    fn test_press_and_release() {
        let mut manager = VoiceManager::new(8);

        assert!(manager.press(KeyId(1), streams(&[1, 2])).is_empty());
        assert!(manager.press(KeyId(2), streams(&[3])).is_empty());
        assert_eq!(manager.active_count(), 2);

        assert_eq!(manager.release(KeyId(1)), streams(&[1, 2]));
        assert!(!manager.is_active(KeyId(1)));
        assert!(manager.is_active(KeyId(2)));
        assert!(manager.release(KeyId(1)).is_empty());
    }

    #[test]
    fn test_repress_stops_previous_streams() {
        let mut manager = VoiceManager::new(8);
        manager.press(KeyId(1), streams(&[1]));

        let stopped = manager.press(KeyId(1), streams(&[2, 3]));
        assert_eq!(stopped, streams(&[1]));
        assert_eq!(manager.active_count(), 1);
        assert_eq!(manager.release(KeyId(1)), streams(&[2, 3]));
    }

    #[test]
    fn test_steals_oldest_voice() {
        let mut manager = VoiceManager::new(3);
        for key in 1..=3 {
            assert!(manager.press(KeyId(key), streams(&[key])).is_empty());
        }

        let stopped = manager.press(KeyId(4), streams(&[4]));
        assert_eq!(stopped, streams(&[1]));
        assert_eq!(manager.active_count(), 3);
        assert!(!manager.is_active(KeyId(1)));
    }

    #[test]
    fn test_repress_does_not_steal() {
        let mut manager = VoiceManager::new(2);
        manager.press(KeyId(1), streams(&[1]));
        manager.press(KeyId(2), streams(&[2]));

        // The key's own voice frees its slot first.
        let stopped = manager.press(KeyId(2), streams(&[3]));
        assert_eq!(stopped, streams(&[2]));
        assert!(manager.is_active(KeyId(1)));
    }

    #[test]
    fn test_sustain() {
        let mut manager = VoiceManager::new(8);
        assert!(manager.set_sustain(true).is_empty());
        assert!(manager.is_sustained());

        manager.press(KeyId(1), streams(&[1]));
        manager.press(KeyId(2), streams(&[2]));
        assert!(manager.release(KeyId(1)).is_empty());
        assert_eq!(manager.active_count(), 2);

        // Only the released key stops; the held key keeps sounding.
        assert_eq!(manager.set_sustain(false), streams(&[1]));
        assert_eq!(manager.active_count(), 1);
        assert_eq!(manager.release(KeyId(2)), streams(&[2]));
    }

    #[test]
    fn test_clear() {
        let mut manager = VoiceManager::new(8);
        manager.press(KeyId(1), streams(&[1, 2]));
        manager.press(KeyId(2), streams(&[3]));

        let mut stopped = manager.clear();
        stopped.sort();
        assert_eq!(stopped, streams(&[1, 2, 3]));
        assert_eq!(manager.active_count(), 0);
    }
}
