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
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use hexsampler::config::KeyboardConfig;
use hexsampler::playback::{MemoryPlayback, MockPlayback, PlaybackPrimitive};
use hexsampler::samples::{
    discover, list_instruments, DirectoryDiscovery, DuplicatePolicy, Instrument, SampleEngine, SampleError,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Resolves and progressively loads keyboard instrument samples."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the instrument directories under a samples root.
    Instruments {
        /// The samples root on disk.
        path: PathBuf,
    },
    /// Lists the samples discovered for an instrument.
    Catalog {
        /// The samples root on disk.
        path: PathBuf,
        /// The instrument directory name.
        instrument: String,
    },
    /// Prints how each pitch of an instrument is played.
    Resolve {
        /// The samples root on disk.
        path: PathBuf,
        /// The instrument directory name.
        instrument: String,
        /// Only print this pitch.
        pitch: Option<u8>,
    },
    /// Loads a keyboard config against a simulated player and selects playback for notes.
    Simulate {
        /// The keyboard config file.
        config: PathBuf,
        /// Decode WAV files instead of simulating loads.
        #[arg(long)]
        decode: bool,
        /// Only play this instrument.
        #[arg(long)]
        instrument: Option<String>,
        /// A pitch to play. May be repeated.
        #[arg(long = "pitch")]
        pitches: Vec<u8>,
        /// The pressure for the pitch at the same position. Defaults to 1.0.
        #[arg(long = "pressure")]
        pressures: Vec<f32>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Instruments { path } => {
            let instruments = list_instruments(&path)?;

            if instruments.is_empty() {
                println!("No instruments found in {}.", path.display());
                return Ok(());
            }

            println!("Instruments (count: {}):", instruments.len());
            for instrument in instruments {
                println!("- {}", instrument);
            }
        }
        Commands::Catalog { path, instrument } => {
            let catalog = discover(&DirectoryDiscovery::new(path), &instrument, DuplicatePolicy::default())?;

            if catalog.is_empty() {
                return Err(SampleError::NoSamplesDiscovered { instrument }.into());
            }

            println!(
                "Samples for {} (pitches: {}, samples: {}):",
                instrument,
                catalog.pitch_count(),
                catalog.descriptor_count()
            );
            for (pitch, group) in catalog.groups() {
                let velocities: Vec<String> = group.iter().map(|d| d.velocity().to_string()).collect();
                println!("- m{}: velocities {}", pitch, velocities.join(", "));
            }
        }
        Commands::Resolve {
            path,
            instrument,
            pitch,
        } => {
            let catalog = discover(&DirectoryDiscovery::new(path), &instrument, DuplicatePolicy::default())?;
            let instrument = Instrument::new(&instrument, catalog)?;

            match pitch {
                Some(pitch) => {
                    let resolution = instrument
                        .resolve(pitch)
                        .ok_or(SampleError::PitchUnresolved { pitch })?;
                    println!(
                        "{} -> root {} at rate {:.4}",
                        pitch,
                        resolution.root_pitch(),
                        resolution.rate()
                    );
                }
                None => {
                    for (pitch, resolution) in instrument.resolution().iter() {
                        println!(
                            "{} -> root {} at rate {:.4}",
                            pitch,
                            resolution.root_pitch(),
                            resolution.rate()
                        );
                    }
                }
            }

            match instrument.rate_range() {
                Some((min_rate, max_rate)) => {
                    println!("\nExtrapolated rates: {:.4} to {:.4}", min_rate, max_rate)
                }
                None => println!("\nNo extrapolated pitches."),
            }
            if let Some(warning) = instrument.rate_warning() {
                println!("Warning: {}", warning);
            }
        }
        Commands::Simulate {
            config,
            decode,
            instrument,
            pitches,
            pressures,
        } => {
            let keyboard = KeyboardConfig::deserialize(&config)?;

            if decode {
                let playback = MemoryPlayback::new(keyboard.polyphony_count())?;
                let mut engine = SampleEngine::from_config(playback, &keyboard)?;
                let mut state = engine.start_loading();
                while !state.is_terminal() {
                    let completion = engine.playback().completions().recv()?;
                    state = engine.on_load_complete(completion);
                }
                print_selections(&engine, instrument, &pitches, &pressures);
            } else {
                let mut engine = SampleEngine::from_config(MockPlayback::new(), &keyboard)?;
                engine.start_loading();
                while let Some(completion) = engine.playback_mut().next_completion() {
                    engine.on_load_complete(completion);
                }
                print_selections(&engine, instrument, &pitches, &pressures);
            }
        }
    }

    Ok(())
}

/// Prints the playback selected for each requested pitch.
fn print_selections<P: PlaybackPrimitive>(
    engine: &SampleEngine<P>,
    instrument: Option<String>,
    pitches: &[u8],
    pressures: &[f32],
) {
    if let Some(loader) = engine.loader() {
        println!(
            "Loaded {} of {} samples ({} failed, state {:?}).",
            loader.loaded_count(),
            loader.total(),
            loader.failed_count(),
            loader.state()
        );
    }

    let names: Vec<String> = match instrument {
        Some(name) => vec![name],
        None => engine.instruments().iter().map(|i| i.name().to_string()).collect(),
    };
    for name in names {
        println!("\n{}:", name);
        for (index, &pitch) in pitches.iter().enumerate() {
            let pressure = pressures.get(index).copied().unwrap_or(1.0);
            match engine.select_playback(&name, pitch, pressure) {
                Ok(selection) => {
                    let layers: Vec<String> = selection
                        .layers
                        .iter()
                        .map(|l| format!("v{} at {:.2}", l.layer_velocity, l.volume))
                        .collect();
                    println!(
                        "- {} ({:.2}): root {} rate {:.4} velocity {} -> {}",
                        pitch,
                        pressure,
                        selection.root_pitch,
                        selection.rate,
                        selection.velocity,
                        layers.join(" + ")
                    );
                }
                Err(e) => println!("- {} ({:.2}): {}", pitch, pressure, e),
            }
        }
    }
}
