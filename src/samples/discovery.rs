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

//! Sample discovery: directory scans and declarative manifests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::catalog::{DuplicatePolicy, SampleCatalog};
use super::descriptor::{parse_sample_name, OutOfRangeError, ResourceRef, SampleDescriptor, DEFAULT_VELOCITY};

/// Error types for sample discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to parse manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("Manifest entry for pitch {pitch} must name exactly one of resource or path")]
    InvalidEntry { pitch: u32 },

    #[error(transparent)]
    OutOfRange(#[from] OutOfRangeError),
}

/// Something that can enumerate the recorded samples of an instrument.
pub trait SampleDiscovery {
    /// Lists the sample descriptors of the given instrument in discovery order.
    fn list_sample_descriptors(&self, instrument: &str) -> Result<Vec<SampleDescriptor>, DiscoveryError>;
}

/// Discovers an instrument by scanning `<root>/<instrument>/` for files named `…m<pitch>(v<velocity>)?….<ext>`.
#[derive(Clone, Debug)]
pub struct DirectoryDiscovery {
    root: PathBuf,
}

impl DirectoryDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SampleDiscovery for DirectoryDiscovery {
    fn list_sample_descriptors(&self, instrument: &str) -> Result<Vec<SampleDescriptor>, DiscoveryError> {
        let dir = self.root.join(instrument);
        if !dir.is_dir() {
            debug!(path = ?dir, "Instrument directory does not exist");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|source| DiscoveryError::Io {
            path: dir.clone(),
            source,
        })? {
            let entry = entry.map_err(|source| DiscoveryError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        // read_dir order is platform dependent.
        files.sort();

        let mut descriptors = Vec::new();
        for path in files {
            // Only names with an extension count as sample files.
            let (Some(name), Some(_)) = (path.file_name().and_then(|n| n.to_str()), path.extension()) else {
                continue;
            };
            let Some((pitch, velocity)) = parse_sample_name(name) else {
                debug!(file = name, "Ignoring file without a pitch in its name");
                continue;
            };
            match SampleDescriptor::try_new(pitch, velocity, ResourceRef::External(path.clone())) {
                Ok(descriptor) => {
                    debug!(
                        file = name,
                        pitch = descriptor.pitch(),
                        velocity = descriptor.velocity(),
                        "Found sample"
                    );
                    descriptors.push(descriptor);
                }
                Err(e) => warn!(file = name, error = %e, "Skipping sample"),
            }
        }

        Ok(descriptors)
    }
}

/// One entry of a sample manifest.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct ManifestEntry {
    /// The MIDI pitch of the recording.
    pitch: u32,

    /// The velocity the sample was recorded at (default: 127).
    velocity: Option<u32>,

    /// Id of an embedded resource.
    resource: Option<u32>,

    /// Path to an external file, relative to the manifest.
    path: Option<String>,
}

impl ManifestEntry {
    pub fn embedded(pitch: u32, velocity: Option<u32>, resource: u32) -> Self {
        Self {
            pitch,
            velocity,
            resource: Some(resource),
            path: None,
        }
    }

    pub fn external(pitch: u32, velocity: Option<u32>, path: &str) -> Self {
        Self {
            pitch,
            velocity,
            resource: None,
            path: Some(path.to_string()),
        }
    }
}

/// A static list of the samples of one instrument.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct SampleManifest {
    instrument: String,
    #[serde(default)]
    samples: Vec<ManifestEntry>,
}

impl SampleManifest {
    pub fn new(instrument: &str, samples: Vec<ManifestEntry>) -> Self {
        Self {
            instrument: instrument.to_string(),
            samples,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }
}

/// Discovers an instrument from a [`SampleManifest`].
#[derive(Clone, Debug)]
pub struct ManifestDiscovery {
    manifest: SampleManifest,
    base_path: PathBuf,
}

impl ManifestDiscovery {
    /// Creates a discovery over a manifest. Relative paths resolve against `base_path`.
    pub fn new(manifest: SampleManifest, base_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            base_path: base_path.into(),
        }
    }

    /// Reads a YAML manifest. Relative paths resolve against the manifest's directory.
    pub fn from_file(path: &Path) -> Result<Self, DiscoveryError> {
        let contents = fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: SampleManifest =
            serde_yml::from_str(&contents).map_err(|source| DiscoveryError::Manifest {
                path: path.to_path_buf(),
                source,
            })?;
        let base_path = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::new(manifest, base_path))
    }

    pub fn manifest(&self) -> &SampleManifest {
        &self.manifest
    }
}

impl SampleDiscovery for ManifestDiscovery {
    fn list_sample_descriptors(&self, instrument: &str) -> Result<Vec<SampleDescriptor>, DiscoveryError> {
        if self.manifest.instrument != instrument {
            debug!(
                instrument,
                manifest = self.manifest.instrument,
                "Manifest describes another instrument"
            );
            return Ok(Vec::new());
        }

        self.manifest
            .samples
            .iter()
            .map(|entry| {
                let source = match (&entry.resource, &entry.path) {
                    (Some(id), None) => ResourceRef::Embedded(*id),
                    (None, Some(path)) if Path::new(path).is_absolute() => ResourceRef::External(PathBuf::from(path)),
                    (None, Some(path)) => ResourceRef::External(self.base_path.join(path)),
                    _ => return Err(DiscoveryError::InvalidEntry { pitch: entry.pitch }),
                };
                let velocity = entry.velocity.unwrap_or(u32::from(DEFAULT_VELOCITY));
                Ok(SampleDescriptor::try_new(entry.pitch, velocity, source)?)
            })
            .collect()
    }
}

/// Discovers an instrument and builds its catalog.
///
/// Finding nothing is not an error here: the empty catalog is returned so the
/// caller can report the instrument as unusable.
pub fn discover(
    discovery: &dyn SampleDiscovery,
    instrument: &str,
    policy: DuplicatePolicy,
) -> Result<SampleCatalog, DiscoveryError> {
    let descriptors = discovery.list_sample_descriptors(instrument)?;
    let found = descriptors.len();
    let catalog = SampleCatalog::from_descriptors(descriptors, policy);

    info!(
        instrument,
        found,
        pitches = catalog.pitch_count(),
        samples = catalog.descriptor_count(),
        "Discovered samples"
    );

    Ok(catalog)
}

/// Lists the instrument directories under a root (the names of its subdirectories), sorted.
pub fn list_instruments(root: &Path) -> Result<Vec<String>, DiscoveryError> {
    let mut instruments = Vec::new();
    for entry in fs::read_dir(root).map_err(|source| DiscoveryError::Io {
        path: root.to_path_buf(),
        source,
    })? {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                instruments.push(name.to_string());
            }
        }
    }
    instruments.sort();
    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use tempfile::tempdir;

    use super::*;

    fn touch(path: &Path) {
        File::create(path).unwrap();
    }

    #[test]
    fn test_directory_discovery() {
        let dir = tempdir().unwrap();
        let instrument = dir.path().join("marimba");
        fs::create_dir(&instrument).unwrap();
        touch(&instrument.join("marimba_m72.wav"));
        touch(&instrument.join("marimba_m60v40.wav"));
        touch(&instrument.join("marimba_m60v100.wav"));
        touch(&instrument.join("notes.txt"));
        touch(&instrument.join("m61"));
        touch(&instrument.join("marimba_m200.wav"));
        fs::create_dir(instrument.join("m62v10.d")).unwrap();

        let discovery = DirectoryDiscovery::new(dir.path());
        let descriptors = discovery.list_sample_descriptors("marimba").unwrap();

        let pairs: Vec<(u8, u8)> = descriptors.iter().map(|d| (d.pitch(), d.velocity())).collect();
        assert_eq!(pairs, vec![(60, 100), (60, 40), (72, 127)]);
        assert_eq!(
            descriptors[2].source(),
            &ResourceRef::External(instrument.join("marimba_m72.wav"))
        );
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let discovery = DirectoryDiscovery::new(dir.path());

        let catalog = discover(&discovery, "nothing", DuplicatePolicy::LastWins).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_manifest_discovery() {
        let yaml = r#"
            instrument: piano
            samples:
              - { pitch: 60, velocity: 40, resource: 3 }
              - { pitch: 60, resource: 4 }
              - { pitch: 72, path: "pno_m72.wav" }
        "#;
        let manifest: SampleManifest = serde_yml::from_str(yaml).unwrap();
        let discovery = ManifestDiscovery::new(manifest, "/samples");

        let descriptors = discovery.list_sample_descriptors("piano").unwrap();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[0].source(), &ResourceRef::Embedded(3));
        assert_eq!(descriptors[0].velocity(), 40);
        assert_eq!(descriptors[1].velocity(), 127);
        assert_eq!(
            descriptors[2].source(),
            &ResourceRef::External(PathBuf::from("/samples/pno_m72.wav"))
        );

        assert!(discovery.list_sample_descriptors("organ").unwrap().is_empty());
    }

    #[test]
    fn test_manifest_built_in_code() {
        let manifest = SampleManifest::new(
            "piano",
            vec![
                ManifestEntry::external(48, Some(90), "low/m48.wav"),
                ManifestEntry::external(60, None, "/abs/m60.wav"),
                ManifestEntry::embedded(72, None, 9),
            ],
        );
        let discovery = ManifestDiscovery::new(manifest, "/samples");

        let descriptors = discovery.list_sample_descriptors("piano").unwrap();
        assert_eq!(
            descriptors[0].source(),
            &ResourceRef::External(PathBuf::from("/samples/low/m48.wav"))
        );
        assert_eq!(descriptors[0].velocity(), 90);
        assert_eq!(descriptors[1].source(), &ResourceRef::External(PathBuf::from("/abs/m60.wav")));
        assert_eq!(descriptors[1].velocity(), 127);
        assert_eq!(descriptors[2].source(), &ResourceRef::Embedded(9));
    }

    #[test]
    fn test_manifest_invalid_entries() {
        let both = SampleManifest::new("piano", vec![ManifestEntry {
            pitch: 60,
            velocity: None,
            resource: Some(1),
            path: Some("a.wav".to_string()),
        }]);
        let discovery = ManifestDiscovery::new(both, "");
        assert!(matches!(
            discovery.list_sample_descriptors("piano"),
            Err(DiscoveryError::InvalidEntry { pitch: 60 })
        ));

        let out_of_range = SampleManifest::new("piano", vec![ManifestEntry::embedded(130, None, 1)]);
        let discovery = ManifestDiscovery::new(out_of_range, "");
        assert!(matches!(
            discovery.list_sample_descriptors("piano"),
            Err(DiscoveryError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_manifest_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("piano.yaml");
        fs::write(&path, "instrument: piano\nsamples:\n  - { pitch: 48, path: m48.wav }\n").unwrap();

        let discovery = ManifestDiscovery::from_file(&path).unwrap();
        let descriptors = discovery.list_sample_descriptors("piano").unwrap();
        assert_eq!(
            descriptors[0].source(),
            &ResourceRef::External(dir.path().join("m48.wav"))
        );
    }

    #[test]
    fn test_unreadable_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "instrument: [piano\n").unwrap();

        let err = ManifestDiscovery::from_file(&path).unwrap_err();
        assert!(matches!(err, DiscoveryError::Manifest { path: p, .. } if p == path));
        assert!(matches!(
            ManifestDiscovery::from_file(&dir.path().join("missing.yaml")),
            Err(DiscoveryError::Io { .. })
        ));
    }

    #[test]
    fn test_list_instruments() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("piano")).unwrap();
        fs::create_dir(dir.path().join("marimba")).unwrap();
        touch(&dir.path().join("loose_m60.wav"));

        assert_eq!(list_instruments(dir.path()).unwrap(), vec!["marimba", "piano"]);
    }
}
