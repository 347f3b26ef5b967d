//! Isolation boundaries for module code.
//!
//! Every loaded module owns exactly one [`IsolationBoundary`]. Libraries
//! installed by the dependency resolver live in a single shared boundary that
//! module boundaries are layered over. Cross-module type lookup is always an
//! explicit query through the registry, so releasing one boundary never
//! invalidates another.

use crate::coordinate::Coordinate;
use crate::error::ModuleSystemError;
use crate::manifest;
use crate::module::{Module, ModuleFactory, NativeModuleConstructor};
use dashmap::DashMap;
use libloading::{Library, Symbol};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// A type (or exported symbol) found inside a module boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHandle {
    pub module: String,
    pub name: String,
}

/// Code-loading scope of a single module.
pub trait IsolationBoundary: Send + Sync {
    fn module_name(&self) -> &str;

    /// Resolves the entry point and constructs the module instance.
    fn instantiate(&self, entry_point: &str) -> Result<Box<dyn Module>, ModuleSystemError>;

    /// Looks up a type visible inside this boundary only.
    fn find_type(&self, name: &str) -> Result<TypeHandle, ModuleSystemError>;

    /// Releases the boundary. Every instance created through it must have
    /// been dropped before.
    fn release(self: Box<Self>) -> Result<(), ModuleSystemError>;
}

/// Creates module boundaries and owns the shared library boundary.
pub trait BoundaryProvider: Send + Sync {
    /// Admits an installed library into the shared boundary. Admission is
    /// permanent for the lifetime of the process.
    fn admit_shared(&self, coordinate: &Coordinate, binary: &Path) -> Result<(), ModuleSystemError>;

    fn is_shared(&self, coordinate: &Coordinate) -> bool;

    /// Looks up a type among the libraries admitted into the shared boundary.
    fn find_shared_type(&self, name: &str) -> Result<TypeHandle, ModuleSystemError>;

    /// Creates a boundary scoped to the module's own package, with the shared
    /// boundary as its parent.
    fn create_boundary(
        &self,
        module_name: &str,
        package_path: &Path,
    ) -> Result<Box<dyn IsolationBoundary>, ModuleSystemError>;
}

// ============================================================================
// Native boundaries
// ============================================================================

/// Libraries admitted into the process-wide shared boundary.
#[derive(Default)]
pub struct SharedLibraries {
    libraries: DashMap<Coordinate, Library>,
}

impl SharedLibraries {
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.libraries.contains_key(coordinate)
    }

    /// Finds the first admitted library exporting `name`.
    pub fn find_symbol(&self, name: &str) -> Option<Coordinate> {
        self.libraries.iter().find_map(|entry| {
            let exported = unsafe { entry.value().get::<*const ()>(name.as_bytes()).is_ok() };
            exported.then(|| entry.key().clone())
        })
    }

    fn admit(&self, coordinate: &Coordinate, binary: &Path) -> Result<(), ModuleSystemError> {
        if self.contains(coordinate) {
            return Ok(());
        }
        let library = open_shared(binary).map_err(|e| {
            ModuleSystemError::Library(format!("Failed to admit {coordinate}: {e}"))
        })?;
        self.libraries.insert(coordinate.clone(), library);
        Ok(())
    }
}

/// Opens a library so its symbols satisfy later module libraries.
#[cfg(unix)]
fn open_shared(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
    let library = unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL)? };
    Ok(library.into())
}

#[cfg(not(unix))]
fn open_shared(path: &Path) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

/// Boundary provider backed by dynamically loaded shared libraries.
///
/// Module packages are extracted below `work_dir`, one fresh directory per
/// load, and the first shared library found in the package is opened as the
/// module's boundary.
pub struct NativeBoundaries {
    shared: Arc<SharedLibraries>,
    work_dir: PathBuf,
}

impl NativeBoundaries {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(SharedLibraries::default()),
            work_dir: work_dir.into(),
        }
    }

    pub fn shared(&self) -> &Arc<SharedLibraries> {
        &self.shared
    }

    fn find_library(dir: &Path) -> Result<Option<PathBuf>, ModuleSystemError> {
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&current)?
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .collect();
            entries.sort();
            for path in entries {
                if path.is_dir() {
                    pending.push(path);
                } else if path
                    .extension()
                    .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
                {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }

    fn open_module_library(package_path: &Path, extracted_dir: &Path) -> Result<Library, ModuleSystemError> {
        manifest::unpack_package(package_path, extracted_dir)?;

        let library_path = Self::find_library(extracted_dir)?.ok_or_else(|| {
            ModuleSystemError::Library(format!(
                "{}: package contains no .{} library",
                package_path.display(),
                std::env::consts::DLL_EXTENSION
            ))
        })?;

        unsafe {
            Library::new(&library_path).map_err(|e| {
                ModuleSystemError::Library(format!(
                    "Failed to load library {}: {}",
                    library_path.display(),
                    e
                ))
            })
        }
    }
}

impl BoundaryProvider for NativeBoundaries {
    fn admit_shared(&self, coordinate: &Coordinate, binary: &Path) -> Result<(), ModuleSystemError> {
        self.shared.admit(coordinate, binary)?;
        debug!("📚 Admitted {} into the shared boundary", coordinate);
        Ok(())
    }

    fn is_shared(&self, coordinate: &Coordinate) -> bool {
        self.shared.contains(coordinate)
    }

    fn find_shared_type(&self, name: &str) -> Result<TypeHandle, ModuleSystemError> {
        let coordinate = self
            .shared
            .find_symbol(name)
            .ok_or_else(|| ModuleSystemError::TypeNotFound(name.to_string()))?;
        Ok(TypeHandle {
            module: coordinate.to_string(),
            name: name.to_string(),
        })
    }

    fn create_boundary(
        &self,
        module_name: &str,
        package_path: &Path,
    ) -> Result<Box<dyn IsolationBoundary>, ModuleSystemError> {
        let extracted_dir = self
            .work_dir
            .join(format!("{}-{}", module_name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&extracted_dir)?;

        let library = match Self::open_module_library(package_path, &extracted_dir) {
            Ok(library) => library,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&extracted_dir) {
                    warn!("Failed to remove {}: {}", extracted_dir.display(), cleanup);
                }
                return Err(e);
            }
        };
        info!("🔄 Opened boundary for {} from {}", module_name, package_path.display());

        Ok(Box::new(NativeBoundary {
            module_name: module_name.to_string(),
            library,
            extracted_dir,
            _shared: Arc::clone(&self.shared),
        }))
    }
}

struct NativeBoundary {
    module_name: String,
    library: Library,
    extracted_dir: PathBuf,
    // Keeps the parent boundary alive for as long as the child exists.
    _shared: Arc<SharedLibraries>,
}

impl IsolationBoundary for NativeBoundary {
    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn instantiate(&self, entry_point: &str) -> Result<Box<dyn Module>, ModuleSystemError> {
        let constructor: Symbol<NativeModuleConstructor> = unsafe {
            self.library.get(entry_point.as_bytes()).map_err(|e| {
                ModuleSystemError::Library(format!(
                    "Module {} does not export '{}': {}",
                    self.module_name, entry_point, e
                ))
            })?
        };

        let module_ptr = unsafe { constructor() };
        if module_ptr.is_null() {
            return Err(ModuleSystemError::Library(format!(
                "Entry point '{}' of module {} returned null",
                entry_point, self.module_name
            )));
        }
        Ok(unsafe { Box::from_raw(module_ptr) })
    }

    fn find_type(&self, name: &str) -> Result<TypeHandle, ModuleSystemError> {
        unsafe {
            self.library
                .get::<*const ()>(name.as_bytes())
                .map_err(|e| ModuleSystemError::TypeNotFound(format!("{name}: {e}")))?;
        }
        Ok(TypeHandle {
            module: self.module_name.clone(),
            name: name.to_string(),
        })
    }

    fn release(self: Box<Self>) -> Result<(), ModuleSystemError> {
        let NativeBoundary {
            module_name,
            library,
            extracted_dir,
            ..
        } = *self;

        library.close().map_err(|e| {
            ModuleSystemError::Library(format!("Failed to close library of {module_name}: {e}"))
        })?;
        if let Err(e) = std::fs::remove_dir_all(&extracted_dir) {
            warn!(
                "Failed to remove extracted package {}: {}",
                extracted_dir.display(),
                e
            );
        }
        info!("📚 Released boundary of {}", module_name);
        Ok(())
    }
}

// ============================================================================
// Static boundaries
// ============================================================================

struct StaticEntry {
    factory: ModuleFactory,
    types: Vec<String>,
}

/// Boundary provider for modules compiled into the host.
///
/// Entry points are looked up in a catalog of factory functions; each entry
/// declares the type names its module exposes.
#[derive(Default)]
pub struct StaticBoundaries {
    catalog: Arc<HashMap<String, StaticEntry>>,
    shared: DashMap<Coordinate, PathBuf>,
    shared_types: HashMap<String, Coordinate>,
    live: Arc<AtomicUsize>,
}

impl StaticBoundaries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `entry_point`, exposing `types`.
    pub fn with_module(mut self, entry_point: &str, factory: ModuleFactory, types: &[&str]) -> Self {
        let mut catalog: HashMap<String, StaticEntry> = match Arc::try_unwrap(self.catalog) {
            Ok(catalog) => catalog,
            Err(shared) => shared
                .iter()
                .map(|(name, entry)| {
                    (
                        name.clone(),
                        StaticEntry {
                            factory: entry.factory,
                            types: entry.types.clone(),
                        },
                    )
                })
                .collect(),
        };
        catalog.insert(
            entry_point.to_string(),
            StaticEntry {
                factory,
                types: types.iter().map(|t| t.to_string()).collect(),
            },
        );
        self.catalog = Arc::new(catalog);
        self
    }

    /// Declares that the library `coordinate` provides `type_name` once it
    /// is admitted into the shared boundary.
    pub fn with_shared_type(mut self, type_name: &str, coordinate: Coordinate) -> Self {
        self.shared_types.insert(type_name.to_string(), coordinate);
        self
    }

    /// Number of boundaries created and not yet released.
    pub fn live_boundaries(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Binary paths admitted into the shared boundary, by coordinate.
    pub fn shared_binary(&self, coordinate: &Coordinate) -> Option<PathBuf> {
        self.shared.get(coordinate).map(|path| path.value().clone())
    }

    pub fn shared_count(&self) -> usize {
        self.shared.len()
    }
}

impl BoundaryProvider for StaticBoundaries {
    fn admit_shared(&self, coordinate: &Coordinate, binary: &Path) -> Result<(), ModuleSystemError> {
        self.shared
            .entry(coordinate.clone())
            .or_insert_with(|| binary.to_path_buf());
        Ok(())
    }

    fn is_shared(&self, coordinate: &Coordinate) -> bool {
        self.shared.contains_key(coordinate)
    }

    fn find_shared_type(&self, name: &str) -> Result<TypeHandle, ModuleSystemError> {
        match self.shared_types.get(name) {
            Some(coordinate) if self.is_shared(coordinate) => Ok(TypeHandle {
                module: coordinate.to_string(),
                name: name.to_string(),
            }),
            _ => Err(ModuleSystemError::TypeNotFound(name.to_string())),
        }
    }

    fn create_boundary(
        &self,
        module_name: &str,
        _package_path: &Path,
    ) -> Result<Box<dyn IsolationBoundary>, ModuleSystemError> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticBoundary {
            module_name: module_name.to_string(),
            catalog: Arc::clone(&self.catalog),
            entry_point: OnceLock::new(),
            live: Arc::clone(&self.live),
        }))
    }
}

struct StaticBoundary {
    module_name: String,
    catalog: Arc<HashMap<String, StaticEntry>>,
    entry_point: OnceLock<String>,
    live: Arc<AtomicUsize>,
}

impl IsolationBoundary for StaticBoundary {
    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn instantiate(&self, entry_point: &str) -> Result<Box<dyn Module>, ModuleSystemError> {
        let entry = self.catalog.get(entry_point).ok_or_else(|| {
            ModuleSystemError::Library(format!(
                "Module {} has no entry point '{}'",
                self.module_name, entry_point
            ))
        })?;
        let _ = self.entry_point.set(entry_point.to_string());
        Ok((entry.factory)())
    }

    fn find_type(&self, name: &str) -> Result<TypeHandle, ModuleSystemError> {
        let exposes = self
            .entry_point
            .get()
            .and_then(|entry_point| self.catalog.get(entry_point))
            .is_some_and(|entry| entry.types.iter().any(|t| t == name));
        if !exposes {
            return Err(ModuleSystemError::TypeNotFound(name.to_string()));
        }
        Ok(TypeHandle {
            module: self.module_name.clone(),
            name: name.to_string(),
        })
    }

    fn release(self: Box<Self>) -> Result<(), ModuleSystemError> {
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
