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
use std::f32::consts::PI;
use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::samples::{DuplicatePolicy, ResourceRef, SampleCatalog, SampleDescriptor};

/// A descriptor backed by an embedded resource whose id encodes the pitch and velocity.
pub fn descriptor(pitch: u8, velocity: u8) -> SampleDescriptor {
    SampleDescriptor::new(
        pitch,
        velocity,
        ResourceRef::Embedded(u32::from(pitch) * 1000 + u32::from(velocity)),
    )
}

/// A descriptor backed by a file.
pub fn file_descriptor(pitch: u8, velocity: u8, path: &str) -> SampleDescriptor {
    SampleDescriptor::new(pitch, velocity, ResourceRef::External(path.into()))
}

/// A catalog of embedded descriptors, one per (pitch, velocity) pair.
pub fn catalog_of(samples: &[(u8, u8)]) -> SampleCatalog {
    SampleCatalog::from_descriptors(
        samples.iter().map(|&(pitch, velocity)| descriptor(pitch, velocity)),
        DuplicatePolicy::LastWins,
    )
}

fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn sine(frame: u32, sample_rate: u32) -> i16 {
    let phase = 2.0 * PI * 440.0 * frame as f32 / sample_rate as f32;
    (phase.sin() * f32::from(i16::MAX) * 0.5) as i16
}

/// Writes a mono 16-bit sine WAV file.
pub fn write_wav(path: &Path, sample_rate: u32, frames: u32) {
    let mut writer = WavWriter::create(path, wav_spec(sample_rate)).unwrap();
    for frame in 0..frames {
        writer.write_sample(sine(frame, sample_rate)).unwrap();
    }
    writer.finalize().unwrap();
}

/// Encodes a mono 16-bit sine WAV in memory.
pub fn wav_bytes(sample_rate: u32, frames: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, wav_spec(sample_rate)).unwrap();
        for frame in 0..frames {
            writer.write_sample(sine(frame, sample_rate)).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
