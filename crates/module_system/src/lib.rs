//! # Module System
//!
//! Discovery, dependency resolution and lifecycle management for modules
//! loaded into a host process.
//!
//! ## Architecture
//!
//! - **Libraries**: modules declare external libraries by coordinate. The
//!   [`DependencyResolver`] expands them transitively from repository
//!   descriptors, keeps the highest version of each library, caches the
//!   binaries locally and admits them into a shared boundary.
//! - **Modules**: the [`ModuleRegistry`] reads manifests out of module
//!   packages, validates their inter-module dependencies, orders them so
//!   dependencies load first, and gives each module its own
//!   [`IsolationBoundary`] layered over the shared one.
//! - **Lifecycle**: modules implement [`Module`]. `enable` runs after a
//!   module is registered, `disable` before its boundary is released.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use module_system::{HttpTransport, ModuleRegistry, NativeBoundaries, RegistryConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), module_system::ModuleSystemError> {
//! let registry = ModuleRegistry::new(
//!     RegistryConfig::default(),
//!     Arc::new(NativeBoundaries::new(".modules")),
//!     Arc::new(HttpTransport::new()?),
//! );
//! registry.load_all_unloaded()?;
//! # Ok(())
//! # }
//! ```

pub mod boundary;
pub mod coordinate;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod manifest;
pub mod module;
pub mod order;
pub mod properties;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod updater;
pub mod validator;
pub mod version;

pub use boundary::{BoundaryProvider, IsolationBoundary, NativeBoundaries, StaticBoundaries, TypeHandle};
pub use coordinate::{ArtifactCache, Coordinate, ResolvedArtifact};
pub use error::{ModuleLoadError, ModuleSystemError};
pub use events::{EventBus, ModuleEvent, ModuleInfo, ModuleListener};
pub use manifest::{ManifestLoader, ModuleManifest, PackagedManifest, UpdaterDescriptor};
pub use module::{Module, ModuleFactory, NativeModuleConstructor};
#[doc(hidden)]
pub use module::NullModule;
pub use order::compute_load_order;
pub use properties::{DescribeFields, FieldDescriptor, PropertyHolder, SharedProperty, SharedStateCollection, TypeTag};
pub use registry::{ModuleRegistry, RegistryConfig};
pub use repository::{HttpTransport, InMemoryTransport, RepositoryTransport};
pub use resolver::{deduplicate, DependencyResolver, ResolverConfig};
pub use updater::ModuleUpdater;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, ModuleSystemError>;

/// Version of the module system, for compatibility checks by hosts.
pub const MODULE_SYSTEM_VERSION: &str = env!("CARGO_PKG_VERSION");
