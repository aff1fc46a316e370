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
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Where an instrument's samples come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrumentSource<'a> {
    /// A root directory holding a `<name>/` folder of sample files.
    Directory(&'a Path),
    /// A YAML sample manifest.
    Manifest(&'a Path),
}

/// The configuration for one instrument.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct InstrumentConfig {
    /// The instrument name. Also the folder name under `directory`.
    name: String,

    /// Root directory to scan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory: Option<PathBuf>,

    /// Path to a sample manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    manifest: Option<PathBuf>,
}

impl InstrumentConfig {
    /// An instrument discovered by scanning `<directory>/<name>/`.
    pub fn directory(name: &str, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            directory: Some(directory.into()),
            manifest: None,
        }
    }

    /// An instrument read from a manifest.
    pub fn manifest(name: &str, manifest: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            directory: None,
            manifest: Some(manifest.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the source. Exactly one of `directory` and `manifest` must be set.
    pub fn source(&self) -> Result<InstrumentSource<'_>, ConfigError> {
        match (&self.directory, &self.manifest) {
            (Some(directory), None) => Ok(InstrumentSource::Directory(directory)),
            (None, Some(manifest)) => Ok(InstrumentSource::Manifest(manifest)),
            (Some(_), Some(_)) => Err(ConfigError::Invalid(format!(
                "instrument {} has both a directory and a manifest",
                self.name
            ))),
            (None, None) => Err(ConfigError::Invalid(format!(
                "instrument {} needs a directory or a manifest",
                self.name
            ))),
        }
    }

    /// Makes relative paths relative to `base_path`.
    pub(super) fn resolve_paths(&mut self, base_path: &Path) {
        for path in [&mut self.directory, &mut self.manifest].into_iter().flatten() {
            if path.is_relative() {
                *path = base_path.join(&*path);
            }
        }
    }
}
