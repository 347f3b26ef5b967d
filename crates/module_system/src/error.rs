//! Error types for the module system.

use std::path::PathBuf;
use thiserror::Error;

/// Dependency-check failures raised while validating a module manifest
/// against the set of known manifests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleLoadError {
    #[error("Module {module} depends on itself")]
    SelfDependency { module: String },

    #[error("Failed to load module {module}: module dependencies are missing: {}", missing.join(", "))]
    MissingDependencies { module: String, missing: Vec<String> },

    #[error("Module {module}: circular dependency detected: {}", chain.join(", "))]
    CircularDependency { module: String, chain: Vec<String> },
}

impl ModuleLoadError {
    /// Name of the module the check failed for.
    pub fn module(&self) -> &str {
        match self {
            ModuleLoadError::SelfDependency { module }
            | ModuleLoadError::MissingDependencies { module, .. }
            | ModuleLoadError::CircularDependency { module, .. } => module,
        }
    }
}

#[derive(Error, Debug)]
pub enum ModuleSystemError {
    #[error("Malformed version: {0}")]
    MalformedVersion(String),

    #[error("Module package not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("{}: no '{entry}' found", package.display())]
    ManifestMissing { package: PathBuf, entry: String },

    #[error("{}: invalid '{entry}': {reason}", package.display())]
    ManifestInvalid {
        package: PathBuf,
        entry: String,
        reason: String,
    },

    #[error(transparent)]
    DependencyCheck(#[from] ModuleLoadError),

    #[error("Module {} is already loaded", .0.display())]
    DuplicatePackage(PathBuf),

    #[error("Duplicate module name {0}")]
    DuplicateName(String),

    #[error("Failed to download dependency {0}")]
    ArtifactUnavailable(String),

    #[error("Failed to load module from {}: {source}", package.display())]
    LoadFailed {
        package: PathBuf,
        #[source]
        source: Box<ModuleSystemError>,
    },

    #[error("Cannot unload module that is not loaded: {0}")]
    NotLoaded(String),

    #[error("Type not found in any loaded module: {0}")]
    TypeNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Descriptor error: {0}")]
    Descriptor(String),

    #[error("Library loading error: {0}")]
    Library(String),

    #[error("Module hook error: {0}")]
    Hook(String),

    #[error("Update error: {0}")]
    Update(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModuleSystemError {
    fn from(err: serde_json::Error) -> Self {
        ModuleSystemError::Serialization(err.to_string())
    }
}

impl ModuleSystemError {
    /// Wraps a lower-level failure with the package it happened for.
    pub fn load_failed(package: impl Into<PathBuf>, source: ModuleSystemError) -> Self {
        ModuleSystemError::LoadFailed {
            package: package.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost cause, looking through `LoadFailed` wrappers.
    pub fn root_cause(&self) -> &ModuleSystemError {
        match self {
            ModuleSystemError::LoadFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
