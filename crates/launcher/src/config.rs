//! Configuration management for the module launcher.
//!
//! This module handles loading, validation, and conversion of launcher
//! configuration from TOML files and command-line arguments.

use module_system::resolver::DEFAULT_REPOSITORY;
use module_system::manifest::DEFAULT_MANIFEST_FILE_NAME;
use module_system::{Coordinate, RegistryConfig, ResolverConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Log levels accepted by [`AppConfig::validate`].
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Module discovery and lifecycle settings
    #[serde(default)]
    pub modules: ModuleSettings,
    /// External library resolution settings
    #[serde(default)]
    pub dependencies: DependencySettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Module discovery settings.
///
/// Controls where packages are found, how their manifest is named and which
/// modules may update themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Directory scanned for `*.tar.gz` module packages
    pub directory: String,
    /// Name of the manifest entry inside each package
    pub manifest_file_name: String,
    /// Directory native module packages are extracted into
    pub work_directory: String,
    /// Modules whose updater descriptor is honored
    pub updatable: Vec<String>,
    /// Whether available updates are installed before loading
    pub install_updates: bool,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            directory: "modules".to_string(),
            manifest_file_name: DEFAULT_MANIFEST_FILE_NAME.to_string(),
            work_directory: ".modules".to_string(),
            updatable: Vec::new(),
            install_updates: false,
        }
    }
}

/// External library resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencySettings {
    /// Root of the local library cache
    pub cache_directory: String,
    /// Repository base URLs, in lookup order
    pub repositories: Vec<String>,
    /// Libraries installed before any module is loaded
    pub bootstrap: Vec<Coordinate>,
    /// Whether to resolve from the local cache only
    pub offline: bool,
    /// Per-request timeout in seconds (None waits indefinitely)
    pub request_timeout_secs: Option<u64>,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            cache_directory: "dependencies".to_string(),
            repositories: vec![DEFAULT_REPOSITORY.to_string()],
            bootstrap: Vec::new(),
            offline: false,
            request_timeout_secs: Some(30),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, creating a default one if missing.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded configuration, or an error if the file could not be read,
    /// parsed or created.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Request timeout for repository downloads.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.dependencies.request_timeout_secs.map(Duration::from_secs)
    }

    /// Converts the file configuration into the registry's configuration.
    pub fn to_registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            modules_dir: PathBuf::from(&self.modules.directory),
            manifest_file_name: self.modules.manifest_file_name.clone(),
            updatable_modules: self.modules.updatable.clone(),
            install_updates: self.modules.install_updates,
            resolver: ResolverConfig {
                cache_dir: PathBuf::from(&self.dependencies.cache_directory),
                repositories: self.dependencies.repositories.clone(),
                bootstrap: self.dependencies.bootstrap.clone(),
                offline: self.dependencies.offline,
                ..ResolverConfig::default()
            },
        }
    }

    /// Validates the configuration settings.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error message describing
    /// the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.modules.directory.is_empty() {
            return Err("Module directory cannot be empty".to_string());
        }

        if self.modules.work_directory.is_empty() {
            return Err("Module work directory cannot be empty".to_string());
        }

        if self.modules.manifest_file_name.is_empty() {
            return Err("Manifest file name cannot be empty".to_string());
        }

        if self.dependencies.cache_directory.is_empty() {
            return Err("Dependency cache directory cannot be empty".to_string());
        }

        if !self.dependencies.offline && self.dependencies.repositories.is_empty() {
            return Err("At least one repository is required unless running offline".to_string());
        }

        if let Some(url) = self
            .dependencies
            .repositories
            .iter()
            .find(|url| !(url.starts_with("http://") || url.starts_with("https://")))
        {
            return Err(format!("Invalid repository URL: {url}"));
        }

        if self.dependencies.request_timeout_secs == Some(0) {
            return Err("dependencies.request_timeout_secs must be greater than 0".to_string());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
