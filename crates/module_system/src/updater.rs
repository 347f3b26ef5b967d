//! Self-update of module packages.

use crate::coordinate::Coordinate;
use crate::descriptor::parse_latest_version;
use crate::error::ModuleSystemError;
use crate::manifest::{UpdaterDescriptor, PACKAGE_SUFFIX};
use crate::repository::RepositoryTransport;
use crate::version;
use std::cmp::Ordering;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Checks a module's update repository and replaces its package.
pub struct ModuleUpdater {
    transport: Arc<dyn RepositoryTransport>,
    descriptor: UpdaterDescriptor,
    current_version: Option<String>,
}

impl ModuleUpdater {
    pub fn new(
        transport: Arc<dyn RepositoryTransport>,
        descriptor: UpdaterDescriptor,
        current_version: Option<String>,
    ) -> Self {
        Self {
            transport,
            descriptor,
            current_version,
        }
    }

    fn package_extension() -> &'static str {
        PACKAGE_SUFFIX.trim_start_matches('.')
    }

    /// Latest version published in the update repository.
    pub fn latest_version(&self) -> Result<Option<String>, ModuleSystemError> {
        let url = Coordinate::unresolved(&self.descriptor.group, &self.descriptor.artifact)
            .resolve(Self::package_extension())
            .latest_metadata_url(&self.descriptor.repository);
        let metadata = self.transport.fetch_text(&url)?;
        parse_latest_version(&metadata)
    }

    /// Whether the repository holds a newer version than the installed one.
    ///
    /// A module that does not declare its own version is never updated.
    pub fn is_update_available(&self) -> Result<bool, ModuleSystemError> {
        let Some(current) = self.current_version.as_deref() else {
            return Ok(false);
        };
        let Some(latest) = self.latest_version()? else {
            return Ok(false);
        };
        Ok(version::compare(&latest, current)? == Ordering::Greater)
    }

    /// Downloads the latest package and atomically replaces `package_path`.
    ///
    /// Returns the version that was installed.
    pub fn perform_update(&self, package_path: &Path) -> Result<String, ModuleSystemError> {
        let latest = self.latest_version()?.ok_or_else(|| {
            ModuleSystemError::Update(format!(
                "{}:{} has no published version",
                self.descriptor.group, self.descriptor.artifact
            ))
        })?;
        let url = Coordinate::new(&self.descriptor.group, &self.descriptor.artifact, &latest)
            .resolve(Self::package_extension())
            .binary_url(&self.descriptor.repository);
        let bytes = self.transport.fetch(&url)?;

        let parent = package_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        staged.write_all(&bytes)?;
        staged.flush()?;
        staged.persist(package_path).map_err(|e| {
            ModuleSystemError::Update(format!(
                "Failed to replace {}: {}",
                package_path.display(),
                e.error
            ))
        })?;

        info!(
            "⬆️ Updated {} to version {}",
            package_path.display(),
            latest
        );
        Ok(latest)
    }
}
