//! Transitive resolution, download and installation of library dependencies.
//!
//! Resolution runs in two passes over the declared roots. The network pass
//! expands every root that is not cached yet by fetching descriptors from the
//! configured repositories, and downloads the deduplicated result into the
//! cache. The offline pass then expands every root again from the cached
//! descriptor copies, and that result is what gets installed into the shared
//! boundary. A host without network access therefore resolves exactly what
//! an earlier online run cached.

use crate::boundary::BoundaryProvider;
use crate::coordinate::{ArtifactCache, Coordinate};
use crate::descriptor::{parse_latest_version, DeclaredDependency, LibraryDescriptor, PLACEHOLDER_PREFIX};
use crate::error::ModuleSystemError;
use crate::manifest::ModuleManifest;
use crate::repository::RepositoryTransport;
use crate::version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_REPOSITORY: &str = "https://repo1.maven.org/maven2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Root of the local artifact cache.
    pub cache_dir: PathBuf,
    /// Repositories every resolution starts with, in lookup order.
    pub repositories: Vec<String>,
    /// Libraries the host needs before anything else is resolved.
    pub bootstrap: Vec<Coordinate>,
    /// Resolve from the cache only.
    pub offline: bool,
    /// File extension of library binaries.
    pub artifact_extension: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("dependencies"),
            repositories: vec![DEFAULT_REPOSITORY.to_string()],
            bootstrap: Vec::new(),
            offline: false,
            artifact_extension: std::env::consts::DLL_EXTENSION.to_string(),
        }
    }
}

/// Keeps one coordinate per `(group, artifact)`, the one with the highest
/// version. On a tie the first occurrence wins. Groups keep the order in
/// which they were first seen.
pub fn deduplicate(coordinates: &[Coordinate]) -> Result<Vec<Coordinate>, ModuleSystemError> {
    let mut winners: Vec<Coordinate> = Vec::new();
    for candidate in coordinates {
        match winners.iter_mut().find(|winner| winner.key() == candidate.key()) {
            Some(winner) => {
                if winner.version != candidate.version
                    && version::compare(&candidate.version, &winner.version)? == Ordering::Greater
                {
                    *winner = candidate.clone();
                }
            }
            None => winners.push(candidate.clone()),
        }
    }
    Ok(winners)
}

pub struct DependencyResolver {
    cache: ArtifactCache,
    transport: Arc<dyn RepositoryTransport>,
    boundaries: Arc<dyn BoundaryProvider>,
    repositories: Vec<String>,
    dependencies: Vec<Coordinate>,
    bootstrap: Vec<Coordinate>,
    installed: HashSet<Coordinate>,
    offline: bool,
}

impl DependencyResolver {
    pub fn new(
        config: &ResolverConfig,
        transport: Arc<dyn RepositoryTransport>,
        boundaries: Arc<dyn BoundaryProvider>,
    ) -> Self {
        let mut resolver = Self {
            cache: ArtifactCache::new(&config.cache_dir, &config.artifact_extension),
            transport,
            boundaries,
            repositories: Vec::new(),
            dependencies: Vec::new(),
            bootstrap: config.bootstrap.clone(),
            installed: HashSet::new(),
            offline: config.offline,
        };
        resolver.add_repositories(config.repositories.iter().cloned());
        resolver
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    pub fn dependencies(&self) -> &[Coordinate] {
        &self.dependencies
    }

    pub fn is_installed(&self, coordinate: &Coordinate) -> bool {
        self.installed.contains(coordinate)
    }

    pub fn installed_count(&self) -> usize {
        self.installed.len()
    }

    /// Adds repositories to the end of the lookup order, skipping known ones.
    pub fn add_repositories<I, S>(&mut self, repositories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for repository in repositories {
            let repository = repository.into();
            if !self.repositories.contains(&repository) {
                self.repositories.push(repository);
            }
        }
    }

    pub fn add_dependencies<I>(&mut self, dependencies: I)
    where
        I: IntoIterator<Item = Coordinate>,
    {
        for dependency in dependencies {
            if !self.dependencies.contains(&dependency) {
                self.dependencies.push(dependency);
            }
        }
    }

    /// Expands `roots` into their transitive runtime dependencies.
    ///
    /// The result holds the expanded roots followed by every dependency
    /// found, in discovery order and possibly with duplicates. With
    /// `use_network` descriptors come from the repositories and roots that
    /// are already cached are skipped; otherwise descriptors come from the
    /// cache and every root is expanded.
    pub fn resolve_transitive_closure(&self, roots: &[Coordinate], use_network: bool) -> Vec<Coordinate> {
        let mut pass = ClosurePass {
            resolver: self,
            use_network,
            searched: HashSet::new(),
            found: Vec::new(),
        };
        for root in roots {
            if use_network && self.cache.has_binary(root) {
                continue;
            }
            pass.found.push(root.clone());
            pass.expand(root);
        }
        pass.found
    }

    /// Downloads every coordinate whose binary is not cached yet.
    ///
    /// Repositories are tried in order until one serves the binary. Failures
    /// are logged and never returned; a coordinate no repository serves
    /// simply stays absent from the cache.
    pub fn download_all(&self, coordinates: &[Coordinate]) {
        if self.offline {
            return;
        }
        for coordinate in coordinates {
            if self.cache.has_binary(coordinate) {
                continue;
            }
            if !self.download(coordinate) {
                warn!("Failed to download {} from any repository", coordinate);
            }
        }
    }

    fn download(&self, coordinate: &Coordinate) -> bool {
        let artifact = self.cache.artifact(coordinate);
        for repository in &self.repositories {
            let bytes = match self.transport.fetch(&artifact.binary_url(repository)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("{} not available from {}: {}", coordinate, repository, e);
                    continue;
                }
            };
            if let Err(e) = self.cache.store(&self.cache.binary_path(coordinate), &bytes) {
                warn!("Failed to cache {}: {}", coordinate, e);
                continue;
            }
            if let Ok(descriptor) = self.transport.fetch(&artifact.descriptor_url(repository)) {
                if let Err(e) = self.cache.store(&self.cache.descriptor_path(coordinate), &descriptor) {
                    warn!("Failed to cache descriptor of {}: {}", coordinate, e);
                }
            }
            if let Ok(metadata) = self.transport.fetch(&artifact.latest_metadata_url(repository)) {
                if let Err(e) = self
                    .cache
                    .store(&self.cache.latest_metadata_path(coordinate), &metadata)
                {
                    warn!("Failed to cache metadata of {}: {}", coordinate, e);
                }
            }
            info!("📥 Downloaded dependency {} from {}", coordinate, repository);
            return true;
        }
        false
    }

    /// Installs every coordinate into the shared boundary, downloading
    /// binaries that are not cached yet.
    pub fn install_all(&mut self, coordinates: &[Coordinate]) -> Result<(), ModuleSystemError> {
        for coordinate in coordinates {
            if self.installed.contains(coordinate) {
                continue;
            }
            if !self.cache.has_binary(coordinate) {
                self.download_all(std::slice::from_ref(coordinate));
            }
            if !self.cache.has_binary(coordinate) {
                return Err(ModuleSystemError::ArtifactUnavailable(coordinate.to_string()));
            }
            self.boundaries
                .admit_shared(coordinate, &self.cache.binary_path(coordinate))?;
            self.installed.insert(coordinate.clone());
            debug!("Installed dependency {}", coordinate);
        }
        Ok(())
    }

    /// Installs the bootstrap libraries unless all of them are present.
    ///
    /// The set comes from `ResolverConfig::bootstrap` and is empty by
    /// default: descriptor and metadata parsing are compiled into this crate,
    /// so a host only lists libraries here that must be shared before any
    /// module is resolved.
    pub fn ensure_bootstrap(&mut self) -> Result<(), ModuleSystemError> {
        if self
            .bootstrap
            .iter()
            .all(|coordinate| self.boundaries.is_shared(coordinate))
        {
            return Ok(());
        }
        info!("🔧 Installing {} bootstrap libraries", self.bootstrap.len());
        let bootstrap = self.bootstrap.clone();
        self.install_all(&bootstrap)
    }

    /// Resolves, downloads and installs every dependency added through
    /// [`add_dependencies`](Self::add_dependencies).
    pub fn install_dependencies(&mut self) -> Result<(), ModuleSystemError> {
        let roots = self.dependencies.clone();
        self.resolve_and_install(&roots)
    }

    /// Resolves the closure of `roots`, downloads what is missing and
    /// installs the deduplicated result. Nothing about `roots` is kept
    /// beyond the installed set.
    pub fn resolve_and_install(&mut self, roots: &[Coordinate]) -> Result<(), ModuleSystemError> {
        self.ensure_bootstrap()?;
        if roots.is_empty() {
            return Ok(());
        }

        if !self.offline {
            let searched = deduplicate(&self.resolve_transitive_closure(roots, true))?;
            self.download_all(&searched);
        }

        let resolved = deduplicate(&self.resolve_transitive_closure(roots, false))?;
        info!("📦 Installing {} library dependencies", resolved.len());
        self.install_all(&resolved)
    }

    /// Installs the libraries one module declares, using the repositories
    /// it declares in addition to the configured ones.
    ///
    /// Only the closure of this manifest's dependencies is resolved, so a
    /// library that failed for one module never fails another.
    pub fn install_required(&mut self, manifest: &ModuleManifest) -> Result<(), ModuleSystemError> {
        self.add_repositories(manifest.repositories.iter().cloned());
        self.resolve_and_install(&manifest.dependencies)
    }

    fn fetch_descriptor(&self, coordinate: &Coordinate, use_network: bool) -> Option<String> {
        if !use_network {
            return self.cache.read_descriptor(coordinate);
        }
        let artifact = self.cache.artifact(coordinate);
        self.repositories
            .iter()
            .find_map(|repository| self.transport.fetch_text(&artifact.descriptor_url(repository)).ok())
    }

    fn latest_version(&self, group: &str, artifact: &str, use_network: bool) -> Option<String> {
        let unresolved = Coordinate::unresolved(group, artifact);
        if !use_network {
            let metadata = self.cache.read_latest_metadata(&unresolved)?;
            if metadata.trim().is_empty() {
                return None;
            }
            return parse_latest_version(&metadata).ok().flatten();
        }

        let artifact = self.cache.artifact(&unresolved);
        self.repositories.iter().find_map(|repository| {
            let metadata = self
                .transport
                .fetch_text(&artifact.latest_metadata_url(repository))
                .ok()?;
            parse_latest_version(&metadata).ok().flatten()
        })
    }
}

/// State of one closure expansion.
struct ClosurePass<'r> {
    resolver: &'r DependencyResolver,
    use_network: bool,
    searched: HashSet<Coordinate>,
    found: Vec<Coordinate>,
}

impl ClosurePass<'_> {
    fn expand(&mut self, coordinate: &Coordinate) {
        if !self.searched.insert(coordinate.clone()) {
            return;
        }
        if self.use_network {
            info!("🔍 Searching dependencies of {}", coordinate);
        }

        let Some(xml) = self.resolver.fetch_descriptor(coordinate, self.use_network) else {
            return;
        };
        let descriptor = match LibraryDescriptor::parse(&xml) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Ignoring descriptor of {}: {}", coordinate, e);
                return;
            }
        };

        for declared in descriptor
            .dependencies
            .iter()
            .filter(|declared| declared.is_runtime_required())
        {
            if declared.has_unresolved_coordinate() {
                continue;
            }
            let Some(version) = self.version_of(&descriptor, declared) else {
                continue;
            };
            let dependency = Coordinate::new(&declared.group, &declared.artifact, version);
            self.found.push(dependency.clone());
            self.expand(&dependency);
        }
    }

    fn version_of(&self, descriptor: &LibraryDescriptor, declared: &DeclaredDependency) -> Option<String> {
        if let Some(parent) = descriptor
            .parent
            .as_ref()
            .filter(|parent| parent.group == declared.group)
        {
            return Some(parent.version.clone()).filter(|version| !version.is_empty());
        }
        match declared.version.as_deref() {
            None => self
                .resolver
                .latest_version(&declared.group, &declared.artifact, self.use_network),
            Some(version) if version.contains(PLACEHOLDER_PREFIX) => descriptor.resolve_placeholder(version),
            Some(version) => Some(version.to_string()),
        }
    }
}
