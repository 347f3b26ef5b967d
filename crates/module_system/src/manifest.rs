//! Module manifests and the packages that carry them.
//!
//! A module package is a gzip-compressed tar archive holding the manifest
//! (`module.json` by default), an optional `updater.json` and the module's
//! compiled code.

use crate::coordinate::Coordinate;
use crate::error::ModuleSystemError;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_MANIFEST_FILE_NAME: &str = "module.json";
pub const UPDATER_FILE_NAME: &str = "updater.json";
pub const PACKAGE_SUFFIX: &str = ".tar.gz";

fn default_reloadable() -> bool {
    true
}

/// Declared metadata of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    #[serde(rename = "main")]
    pub entry_point: String,
    #[serde(rename = "depend", default)]
    pub module_dependencies: BTreeSet<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Coordinate>,
    #[serde(default = "default_reloadable")]
    pub reloadable: bool,
    /// Version of the module itself, compared against the updater's
    /// repository when an update check runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ModuleManifest {
    pub fn new(name: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_point: entry_point.into(),
            module_dependencies: BTreeSet::new(),
            repositories: Vec::new(),
            dependencies: Vec::new(),
            reloadable: true,
            version: None,
        }
    }

    pub fn depends_on(mut self, module: impl Into<String>) -> Self {
        self.module_dependencies.insert(module.into());
        self
    }
}

impl AsRef<ModuleManifest> for ModuleManifest {
    fn as_ref(&self) -> &ModuleManifest {
        self
    }
}

/// Where a module's updates are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterDescriptor {
    #[serde(rename = "groupId")]
    pub group: String,
    #[serde(rename = "artifactId")]
    pub artifact: String,
    pub repository: String,
}

/// A manifest together with the package it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedManifest {
    pub package_path: PathBuf,
    pub manifest: ModuleManifest,
    pub updater: Option<UpdaterDescriptor>,
}

impl AsRef<ModuleManifest> for PackagedManifest {
    fn as_ref(&self) -> &ModuleManifest {
        &self.manifest
    }
}

/// Reads one entry out of a package. `Ok(None)` when the entry is absent.
pub fn read_package_entry(package: &Path, entry_name: &str) -> Result<Option<Vec<u8>>, ModuleSystemError> {
    let file = File::open(package)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        let relative = entry_path.strip_prefix(".").unwrap_or(&entry_path);
        if relative == Path::new(entry_name) {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            return Ok(Some(contents));
        }
    }
    Ok(None)
}

/// Extracts a whole package into `destination`.
pub fn unpack_package(package: &Path, destination: &Path) -> Result<(), ModuleSystemError> {
    let file = File::open(package)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.unpack(destination)?;
    Ok(())
}

/// Loads the manifest stored under `manifest_file_name` inside a package.
pub fn load_manifest(package: &Path, manifest_file_name: &str) -> Result<ModuleManifest, ModuleSystemError> {
    if !package.is_file() {
        return Err(ModuleSystemError::ManifestNotFound(package.to_path_buf()));
    }

    let invalid = |reason: String| ModuleSystemError::ManifestInvalid {
        package: package.to_path_buf(),
        entry: manifest_file_name.to_string(),
        reason,
    };

    let contents = read_package_entry(package, manifest_file_name)
        .map_err(|e| invalid(format!("unreadable package archive: {e}")))?
        .ok_or_else(|| ModuleSystemError::ManifestMissing {
            package: package.to_path_buf(),
            entry: manifest_file_name.to_string(),
        })?;

    let manifest: ModuleManifest =
        serde_json::from_slice(&contents).map_err(|e| invalid(e.to_string()))?;
    if manifest.name.trim().is_empty() {
        return Err(invalid("name must not be empty".to_string()));
    }
    if manifest.entry_point.trim().is_empty() {
        return Err(invalid("main must not be empty".to_string()));
    }
    Ok(manifest)
}

/// Reads manifests and updater descriptors out of module packages.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    manifest_file_name: String,
    updatable_modules: HashSet<String>,
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MANIFEST_FILE_NAME, std::iter::empty::<String>())
    }
}

impl ManifestLoader {
    pub fn new<I, S>(manifest_file_name: impl Into<String>, updatable_modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            manifest_file_name: manifest_file_name.into(),
            updatable_modules: updatable_modules.into_iter().map(Into::into).collect(),
        }
    }

    pub fn manifest_file_name(&self) -> &str {
        &self.manifest_file_name
    }

    pub fn load_manifest(&self, package: &Path) -> Result<ModuleManifest, ModuleSystemError> {
        load_manifest(package, &self.manifest_file_name)
    }

    /// Loads the updater descriptor for allow-listed modules.
    ///
    /// Never fails: an absent or unreadable descriptor yields `None`.
    pub fn load_updater(&self, package: &Path, module_name: &str) -> Option<UpdaterDescriptor> {
        if !self.updatable_modules.contains(module_name) {
            return None;
        }
        match read_package_entry(package, UPDATER_FILE_NAME) {
            Ok(Some(contents)) => match serde_json::from_slice(&contents) {
                Ok(updater) => Some(updater),
                Err(e) => {
                    warn!(
                        "Ignoring invalid {} in {}: {}",
                        UPDATER_FILE_NAME,
                        package.display(),
                        e
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!("No updater for {}: {}", module_name, e);
                None
            }
        }
    }

    pub fn load_package(&self, package: &Path) -> Result<PackagedManifest, ModuleSystemError> {
        let manifest = self.load_manifest(package)?;
        let updater = self.load_updater(package, &manifest.name);
        Ok(PackagedManifest {
            package_path: package.to_path_buf(),
            manifest,
            updater,
        })
    }

    /// Lists every package in `modules_dir`, sorted by path.
    ///
    /// A missing directory holds no packages.
    pub fn discover_packages(&self, modules_dir: &Path) -> Result<Vec<PathBuf>, ModuleSystemError> {
        if !modules_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut packages: Vec<PathBuf> = std::fs::read_dir(modules_dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.ends_with(PACKAGE_SUFFIX))
            })
            .collect();
        packages.sort();
        Ok(packages)
    }
}
