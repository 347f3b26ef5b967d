//! The module registry: known manifests, loaded modules and their lifecycle.
//!
//! Every mutating operation runs under one registry-wide lock. Hooks and
//! listeners are invoked with that lock held and must not call back into the
//! registry.

use crate::boundary::{BoundaryProvider, IsolationBoundary, TypeHandle};
use crate::error::{ModuleLoadError, ModuleSystemError};
use crate::events::{EventBus, ModuleEvent, ModuleInfo, ModuleListener};
use crate::manifest::{ManifestLoader, ModuleManifest, PackagedManifest, UpdaterDescriptor, DEFAULT_MANIFEST_FILE_NAME};
use crate::module::{guarded_hook, Module};
use crate::order::compute_load_order;
use crate::properties::SharedStateCollection;
use crate::repository::RepositoryTransport;
use crate::resolver::{DependencyResolver, ResolverConfig};
use crate::updater::ModuleUpdater;
use crate::validator;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Callback receiving non-fatal failures of batch operations.
///
/// Returning the error makes it fatal for the operation that reported it.
pub type FailureHandler = dyn Fn(ModuleSystemError) -> Result<(), ModuleSystemError> + Send + Sync;

fn rethrow(failure: ModuleSystemError) -> Result<(), ModuleSystemError> {
    Err(failure)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory scanned for module packages.
    pub modules_dir: PathBuf,
    /// Name of the manifest entry inside a package.
    pub manifest_file_name: String,
    /// Modules allowed to carry an updater descriptor.
    pub updatable_modules: Vec<String>,
    /// Install available updates before loading.
    pub install_updates: bool,
    pub resolver: ResolverConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            modules_dir: PathBuf::from("modules"),
            manifest_file_name: DEFAULT_MANIFEST_FILE_NAME.to_string(),
            updatable_modules: Vec::new(),
            install_updates: false,
            resolver: ResolverConfig::default(),
        }
    }
}

struct LoadedModule {
    // Dropped before the boundary its code lives in.
    instance: Box<dyn Module>,
    boundary: Box<dyn IsolationBoundary>,
    info: ModuleInfo,
    manifest: ModuleManifest,
    updater: Option<UpdaterDescriptor>,
}

impl LoadedModule {
    fn packaged(&self) -> PackagedManifest {
        PackagedManifest {
            package_path: self.info.package_path.clone(),
            manifest: self.manifest.clone(),
            updater: self.updater.clone(),
        }
    }

    /// Drops the instance and releases its boundary.
    fn release(self) -> Result<(), ModuleSystemError> {
        let LoadedModule { instance, boundary, .. } = self;
        drop(instance);
        boundary.release()
    }
}

#[derive(Default)]
struct RegistryState {
    known: Vec<PackagedManifest>,
    loaded: Vec<LoadedModule>,
}

impl RegistryState {
    fn is_package_loaded(&self, package: &Path) -> bool {
        self.loaded.iter().any(|module| module.info.package_path == package)
    }

    fn is_name_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|module| module.info.name == name)
    }

    /// Registers a manifest, replacing any entry with the same package path
    /// or module name.
    fn register_known(&mut self, packaged: &PackagedManifest) {
        self.known.retain(|known| {
            known.package_path != packaged.package_path && known.manifest.name != packaged.manifest.name
        });
        self.known.push(packaged.clone());
    }
}

pub struct ModuleRegistry {
    state: Mutex<RegistryState>,
    resolver: Mutex<DependencyResolver>,
    boundaries: Arc<dyn BoundaryProvider>,
    transport: Arc<dyn RepositoryTransport>,
    loader: ManifestLoader,
    config: RegistryConfig,
    events: EventBus,
    shared_state: RwLock<Vec<Arc<dyn SharedStateCollection>>>,
    failure_handler: Box<FailureHandler>,
}

impl ModuleRegistry {
    /// Creates a registry whose failure handler rethrows every failure.
    pub fn new(
        config: RegistryConfig,
        boundaries: Arc<dyn BoundaryProvider>,
        transport: Arc<dyn RepositoryTransport>,
    ) -> Self {
        let resolver = DependencyResolver::new(&config.resolver, Arc::clone(&transport), Arc::clone(&boundaries));
        let loader = ManifestLoader::new(&config.manifest_file_name, config.updatable_modules.iter().cloned());
        Self {
            state: Mutex::new(RegistryState::default()),
            resolver: Mutex::new(resolver),
            boundaries,
            transport,
            loader,
            config,
            events: EventBus::new(),
            shared_state: RwLock::new(Vec::new()),
            failure_handler: Box::new(rethrow),
        }
    }

    pub fn with_failure_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ModuleSystemError) -> Result<(), ModuleSystemError> + Send + Sync + 'static,
    {
        self.failure_handler = Box::new(handler);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn subscribe(&self, listener: Arc<dyn ModuleListener>) {
        self.events.subscribe(listener);
    }

    /// Tracks a shared-state collection that is reset after every unload.
    pub fn track_shared_state(&self, collection: Arc<dyn SharedStateCollection>) {
        self.shared_state.write().push(collection);
    }

    fn report_failure(&self, failure: ModuleSystemError) -> Result<(), ModuleSystemError> {
        (self.failure_handler)(failure)
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Loads one module from an already read manifest.
    pub fn load_module(&self, packaged: PackagedManifest) -> Result<ModuleInfo, ModuleSystemError> {
        let mut state = self.state.lock();
        self.load_locked(&mut state, packaged, self.config.install_updates)
    }

    /// Reads the package at `package` and loads the module it contains.
    pub fn load_module_from_path(&self, package: &Path) -> Result<ModuleInfo, ModuleSystemError> {
        let mut state = self.state.lock();
        if state.is_package_loaded(package) {
            return Err(ModuleSystemError::DuplicatePackage(package.to_path_buf()));
        }
        let packaged = self.loader.load_package(package)?;
        self.load_locked(&mut state, packaged, self.config.install_updates)
    }

    /// Discovers every package in the modules directory and loads the ones
    /// that are not loaded yet, dependencies first.
    ///
    /// Unreadable packages and manifests failing validation go to the
    /// failure handler. A dependency missing from the validated set aborts
    /// the whole pass.
    pub fn load_all_unloaded(&self) -> Result<(), ModuleSystemError> {
        let mut state = self.state.lock();
        self.load_all_unloaded_locked(&mut state)
    }

    fn load_all_unloaded_locked(&self, state: &mut RegistryState) -> Result<(), ModuleSystemError> {
        let mut discovered: Vec<PackagedManifest> = Vec::new();
        for package in self.loader.discover_packages(&self.config.modules_dir)? {
            match self.loader.load_package(&package) {
                Ok(packaged) => {
                    if discovered.iter().any(|other| other.manifest.name == packaged.manifest.name) {
                        self.report_failure(ModuleSystemError::DuplicateName(packaged.manifest.name))?;
                    } else {
                        discovered.push(packaged);
                    }
                }
                Err(e) => self.report_failure(e)?,
            }
        }

        // Every loaded module stays known, whatever its package now holds.
        let loaded: Vec<PackagedManifest> = state.loaded.iter().map(LoadedModule::packaged).collect();
        let mut known = loaded.clone();
        for packaged in discovered {
            match loaded.iter().find(|other| other.manifest.name == packaged.manifest.name) {
                Some(other) if other.package_path == packaged.package_path => {}
                Some(_) => self.report_failure(ModuleSystemError::DuplicateName(packaged.manifest.name))?,
                None => known.push(packaged),
            }
        }
        state.known = known;

        let mut failures = Vec::new();
        let valid = validator::validate_all(&state.known, |failure| failures.push(failure));
        for failure in failures {
            self.report_failure(failure.into())?;
        }

        let order = compute_load_order(&valid)?;
        info!("📋 Module load order: {}", order.iter().map(|p| p.manifest.name.as_str()).collect::<Vec<_>>().join(", "));

        for packaged in order {
            match self.load_locked(state, packaged, self.config.install_updates) {
                Ok(_) | Err(ModuleSystemError::DuplicatePackage(_)) => {}
                Err(e) => {
                    error!("❌ {}", e);
                    self.report_failure(e)?;
                }
            }
        }
        Ok(())
    }

    fn check_not_loaded(state: &RegistryState, packaged: &PackagedManifest) -> Result<(), ModuleSystemError> {
        if state.is_package_loaded(&packaged.package_path) {
            return Err(ModuleSystemError::DuplicatePackage(packaged.package_path.clone()));
        }
        if state.is_name_loaded(&packaged.manifest.name) {
            return Err(ModuleSystemError::DuplicateName(packaged.manifest.name.clone()));
        }
        Ok(())
    }

    fn load_locked(
        &self,
        state: &mut RegistryState,
        packaged: PackagedManifest,
        install_updates: bool,
    ) -> Result<ModuleInfo, ModuleSystemError> {
        Self::check_not_loaded(state, &packaged)?;
        let package = packaged.package_path.clone();
        self.load_checked(state, packaged, install_updates)
            .map_err(|e| ModuleSystemError::load_failed(package, e))
    }

    fn load_checked(
        &self,
        state: &mut RegistryState,
        packaged: PackagedManifest,
        install_updates: bool,
    ) -> Result<ModuleInfo, ModuleSystemError> {
        state.register_known(&packaged);
        validator::validate(&packaged.manifest, &state.known)?;

        if install_updates {
            if let Some(updated) = self.try_update(&packaged) {
                Self::check_not_loaded(state, &updated)?;
                return self.load_checked(state, updated, false);
            }
        }

        let unloaded: Vec<String> = packaged
            .manifest
            .module_dependencies
            .iter()
            .filter(|name| !state.is_name_loaded(name))
            .cloned()
            .collect();
        if !unloaded.is_empty() {
            return Err(ModuleLoadError::MissingDependencies {
                module: packaged.manifest.name.clone(),
                missing: unloaded,
            }
            .into());
        }

        self.resolver.lock().install_required(&packaged.manifest)?;

        let PackagedManifest {
            package_path,
            manifest,
            updater,
        } = packaged;
        let boundary = self.boundaries.create_boundary(&manifest.name, &package_path)?;
        let instance = match boundary.instantiate(&manifest.entry_point) {
            Ok(instance) => instance,
            Err(e) => {
                if let Err(release_error) = boundary.release() {
                    warn!("Failed to release boundary of {}: {}", manifest.name, release_error);
                }
                return Err(e);
            }
        };

        let info = ModuleInfo {
            id: Uuid::new_v4(),
            name: manifest.name.clone(),
            package_path,
        };
        state.loaded.push(LoadedModule {
            instance,
            boundary,
            info: info.clone(),
            manifest,
            updater,
        });

        let enabled = match state.loaded.last_mut() {
            Some(module) => guarded_hook(&info.name, "enable", || module.instance.enable()),
            None => Ok(()),
        };
        if let Err(e) = enabled {
            if let Some(module) = state.loaded.pop() {
                if let Err(release_error) = module.release() {
                    warn!("Failed to release boundary of {}: {}", info.name, release_error);
                }
            }
            return Err(e);
        }

        info!("✅ Loaded module {} from {}", info.name, info.package_path.display());
        self.events.emit(ModuleEvent::Loaded(info.clone()));
        Ok(info)
    }

    /// Installs an available update and re-reads the package.
    ///
    /// Update failures are logged; the module then loads as it is.
    fn try_update(&self, packaged: &PackagedManifest) -> Option<PackagedManifest> {
        let descriptor = packaged.updater.clone()?;
        let name = &packaged.manifest.name;
        let updater = ModuleUpdater::new(Arc::clone(&self.transport), descriptor, packaged.manifest.version.clone());

        match updater.is_update_available() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!("Failed to check for updates of {}: {}", name, e);
                return None;
            }
        }

        info!("⬆️ Updating module {}...", name);
        let updated = updater
            .perform_update(&packaged.package_path)
            .and_then(|_| self.loader.load_package(&packaged.package_path));
        match updated {
            Ok(updated) => {
                info!("⬆️ Updated module {}", name);
                Some(updated)
            }
            Err(e) => {
                warn!("Failed to update module {}: {}", name, e);
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Unloading
    // ------------------------------------------------------------------------

    /// Disables and unloads one module.
    ///
    /// The unload always completes. A failing disable hook is passed to the
    /// failure handler, and an error it returns is returned here after the
    /// module is gone.
    pub fn unload_module(&self, module: &ModuleInfo) -> Result<(), ModuleSystemError> {
        let mut state = self.state.lock();
        self.unload_locked(&mut state, module.id)
    }

    fn unload_locked(&self, state: &mut RegistryState, id: Uuid) -> Result<(), ModuleSystemError> {
        let index = state
            .loaded
            .iter()
            .position(|module| module.info.id == id)
            .ok_or_else(|| ModuleSystemError::NotLoaded(id.to_string()))?;

        let info = state.loaded[index].info.clone();
        let mut deferred = None;

        let disabled = {
            let module = &mut state.loaded[index];
            guarded_hook(&info.name, "disable", || module.instance.disable())
        };
        if let Err(e) = disabled {
            error!("❌ Failed to disable module {}: {}", info.name, e);
            if let Err(e) = self.report_failure(e) {
                deferred = Some(e);
            }
        }

        self.events.release_owned_by(&info);
        let module = state.loaded.remove(index);
        if let Err(e) = module.release() {
            error!("❌ Failed to release boundary of {}: {}", info.name, e);
            if let Err(e) = self.report_failure(e) {
                deferred.get_or_insert(e);
            }
        }

        info!("🛑 Unloaded module {}", info.name);
        self.events.emit(ModuleEvent::Unloaded(info));
        self.reset_shared_state();

        match deferred {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn reset_shared_state(&self) {
        for collection in self.shared_state.read().iter() {
            collection.reset_cached_properties();
        }
    }

    /// Unloads every module selected by `filter`, most recently loaded
    /// first. Returns the first error after all of them are unloaded.
    fn unload_where<F>(&self, state: &mut RegistryState, selects: F) -> Result<(), ModuleSystemError>
    where
        F: Fn(&LoadedModule) -> bool,
    {
        let selected: Vec<Uuid> = state
            .loaded
            .iter()
            .rev()
            .filter(|module| selects(*module))
            .map(|module| module.info.id)
            .collect();

        let mut first_error = None;
        for id in selected {
            if let Err(e) = self.unload_locked(state, id) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn unload_all(&self) -> Result<(), ModuleSystemError> {
        let mut state = self.state.lock();
        self.unload_where(&mut state, |_| true)
    }

    /// Unloads the modules whose manifest and instance both allow reloading.
    pub fn unload_all_reloadable(&self) -> Result<(), ModuleSystemError> {
        let mut state = self.state.lock();
        self.unload_where(&mut state, |module| {
            module.manifest.reloadable && module.instance.is_reloadable()
        })
    }

    /// Unloads a module and loads it again from a fresh read of its package.
    pub fn reload_module(&self, module: &ModuleInfo) -> Result<ModuleInfo, ModuleSystemError> {
        let mut state = self.state.lock();
        let package = state
            .loaded
            .iter()
            .find(|loaded| loaded.info.id == module.id)
            .map(|loaded| loaded.info.package_path.clone())
            .ok_or_else(|| ModuleSystemError::NotLoaded(module.name.clone()))?;

        self.unload_locked(&mut state, module.id)?;
        let packaged = self.loader.load_package(&package)?;
        self.load_locked(&mut state, packaged, self.config.install_updates)
    }

    pub fn reload_all_reloadable(&self) -> Result<(), ModuleSystemError> {
        let mut state = self.state.lock();
        self.unload_where(&mut state, |module| {
            module.manifest.reloadable && module.instance.is_reloadable()
        })?;
        self.load_all_unloaded_locked(&mut state)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Finds `name` in the boundaries of the loaded modules, in load order.
    pub fn resolve_type_name(&self, name: &str) -> Result<TypeHandle, ModuleSystemError> {
        let state = self.state.lock();
        state
            .loaded
            .iter()
            .find_map(|module| module.boundary.find_type(name).ok())
            .ok_or_else(|| ModuleSystemError::TypeNotFound(name.to_string()))
    }

    /// Like [`resolve_type_name`](Self::resolve_type_name), falling back to
    /// the libraries of the shared boundary when no module has the type.
    pub fn resolve_type_name_or_shared(&self, name: &str) -> Result<TypeHandle, ModuleSystemError> {
        match self.resolve_type_name(name) {
            Err(ModuleSystemError::TypeNotFound(_)) => self.boundaries.find_shared_type(name),
            found => found,
        }
    }

    /// Loaded modules in load order.
    pub fn loaded_modules(&self) -> Vec<ModuleInfo> {
        self.state.lock().loaded.iter().map(|module| module.info.clone()).collect()
    }

    pub fn module_by_name(&self, name: &str) -> Option<ModuleInfo> {
        self.state
            .lock()
            .loaded
            .iter()
            .find(|module| module.info.name == name)
            .map(|module| module.info.clone())
    }

    pub fn manifest_of(&self, name: &str) -> Option<ModuleManifest> {
        self.state
            .lock()
            .loaded
            .iter()
            .find(|module| module.info.name == name)
            .map(|module| module.manifest.clone())
    }

    pub fn known_manifests(&self) -> Vec<PackagedManifest> {
        self.state.lock().known.clone()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state.lock().is_name_loaded(name)
    }
}
