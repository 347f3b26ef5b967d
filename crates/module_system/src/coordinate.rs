//! Library coordinates and the on-disk artifact cache layout.
//!
//! A [`Coordinate`] names an external library by `(group, artifact, version)`.
//! Every coordinate maps deterministically onto three cache-relative paths
//! (see [`ResolvedArtifact`]) and onto the same relative layout below each
//! remote repository URL, which is what makes offline re-resolution from the
//! cache possible.

use crate::error::ModuleSystemError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sentinel version used when only the `(group, artifact)` part of a
/// coordinate is meaningful, e.g. to locate latest-version metadata.
pub const UNKNOWN_VERSION: &str = "UNKNOWN";

/// File name of the latest-version metadata document.
pub const METADATA_FILE_NAME: &str = "maven-metadata.xml";

/// Extension of cached descriptor documents.
pub const DESCRIPTOR_EXTENSION: &str = "pom";

/// Identifies an external library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(rename = "groupId", alias = "group")]
    pub group: String,
    #[serde(rename = "artifactId", alias = "artifact")]
    pub artifact: String,
    pub version: String,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }

    /// Coordinate whose version is not resolved yet.
    pub fn unresolved(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self::new(group, artifact, UNKNOWN_VERSION)
    }

    pub fn is_unresolved(&self) -> bool {
        self.version == UNKNOWN_VERSION
    }

    /// The `(group, artifact)` pair used to arbitrate version conflicts.
    pub fn key(&self) -> (&str, &str) {
        (&self.group, &self.artifact)
    }

    /// Relative directory of this library, `org/example/lib`.
    fn library_path(&self) -> PathBuf {
        let mut path: PathBuf = self.group.split('.').collect();
        path.push(&self.artifact);
        path
    }

    /// Computes the artifact paths for this coordinate.
    pub fn resolve(&self, extension: &str) -> ResolvedArtifact {
        let library = self.library_path();
        let version_dir = library.join(&self.version);
        let file_stem = format!("{}-{}", self.artifact, self.version);

        ResolvedArtifact {
            coordinate: self.clone(),
            binary: version_dir.join(format!("{file_stem}.{extension}")),
            descriptor: version_dir.join(format!("{file_stem}.{DESCRIPTOR_EXTENSION}")),
            latest_metadata: library.join(METADATA_FILE_NAME),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// A coordinate together with its cache-relative file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub coordinate: Coordinate,
    /// `group/artifact/version/artifact-version.<ext>`
    pub binary: PathBuf,
    /// `group/artifact/version/artifact-version.pom`
    pub descriptor: PathBuf,
    /// `group/artifact/maven-metadata.xml`
    pub latest_metadata: PathBuf,
}

impl ResolvedArtifact {
    pub fn binary_url(&self, repository: &str) -> String {
        repository_url(repository, &self.binary)
    }

    pub fn descriptor_url(&self, repository: &str) -> String {
        repository_url(repository, &self.descriptor)
    }

    pub fn latest_metadata_url(&self, repository: &str) -> String {
        repository_url(repository, &self.latest_metadata)
    }
}

fn repository_url(repository: &str, relative: &Path) -> String {
    let relative = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", repository.trim_end_matches('/'), relative)
}

/// Local artifact cache rooted at a directory.
///
/// The cache is append-only: files are created when absent and never
/// overwritten, so concurrent writers cannot corrupt an entry.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    extension: String,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn artifact(&self, coordinate: &Coordinate) -> ResolvedArtifact {
        coordinate.resolve(&self.extension)
    }

    pub fn binary_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.root.join(self.artifact(coordinate).binary)
    }

    pub fn descriptor_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.root.join(self.artifact(coordinate).descriptor)
    }

    pub fn latest_metadata_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.root.join(self.artifact(coordinate).latest_metadata)
    }

    pub fn has_binary(&self, coordinate: &Coordinate) -> bool {
        self.binary_path(coordinate).is_file()
    }

    /// Reads the cached descriptor, `None` when it was never stored.
    pub fn read_descriptor(&self, coordinate: &Coordinate) -> Option<String> {
        std::fs::read_to_string(self.descriptor_path(coordinate)).ok()
    }

    /// Reads the cached latest-version metadata, `None` when absent.
    pub fn read_latest_metadata(&self, coordinate: &Coordinate) -> Option<String> {
        std::fs::read_to_string(self.latest_metadata_path(coordinate)).ok()
    }

    /// Writes `contents` to `path` unless a file already exists there.
    ///
    /// Returns `Ok(false)` when the file was already present.
    pub fn store(&self, path: &Path, contents: &[u8]) -> Result<bool, ModuleSystemError> {
        if path.exists() {
            return Ok(false);
        }
        let parent = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent)?;

        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        staged.write_all(contents)?;
        staged.flush()?;
        match staged.persist_noclobber(path) {
            Ok(_) => Ok(true),
            // Lost the race against another writer; their copy stands.
            Err(_) if path.exists() => Ok(false),
            Err(err) => Err(ModuleSystemError::Io(err.error)),
        }
    }
}
