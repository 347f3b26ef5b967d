//! Main application logic and lifecycle management.
//!
//! The `Application` drives a [`ModuleRegistry`]: it loads every module found
//! in the configured directory, waits for a termination signal, then unloads
//! everything in reverse load order. Registry calls block on file and network
//! I/O, so they run on tokio's blocking pool.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals::wait_for_shutdown_signal};
use module_system::{HttpTransport, ModuleRegistry, ModuleSystemError, NativeBoundaries};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main application struct.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        apply_overrides(&mut config, args);

        let app = Self::from_config(config)?;
        info!("✅ Configuration loaded and validated successfully");
        display_banner();
        Ok(app)
    }

    /// Creates an application from an already merged configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Builds the registry and loads every module that is not loaded yet.
    ///
    /// Failures of individual modules are logged and skipped; only a failure
    /// of the whole pass (such as a dependency missing from the validated
    /// set) is returned.
    pub async fn start(&self) -> Result<Arc<ModuleRegistry>, Box<dyn std::error::Error>> {
        let registry_config = self.config.to_registry_config();
        let work_dir = PathBuf::from(&self.config.modules.work_directory);
        let timeout = self.config.request_timeout();

        let registry = tokio::task::spawn_blocking(move || -> Result<Arc<ModuleRegistry>, ModuleSystemError> {
            // The blocking HTTP client must be created off the async runtime.
            let transport = Arc::new(HttpTransport::with_timeout(timeout)?);
            let registry = ModuleRegistry::new(registry_config, Arc::new(NativeBoundaries::new(work_dir)), transport)
                .with_failure_handler(log_failure);
            let registry = Arc::new(registry);
            registry.load_all_unloaded()?;
            Ok(registry)
        })
        .await??;

        let loaded = registry.loaded_modules();
        info!("🧩 {} module(s) loaded", loaded.len());
        for module in &loaded {
            info!("  - {} ({})", module.name, module.package_path.display());
        }
        Ok(registry)
    }

    /// Unloads every module and drops the registry on the blocking pool.
    pub async fn shutdown(registry: Arc<ModuleRegistry>) -> Result<(), Box<dyn std::error::Error>> {
        tokio::task::spawn_blocking(move || {
            let result = registry.unload_all();
            drop(registry);
            result
        })
        .await??;
        info!("✅ All modules unloaded");
        Ok(())
    }

    /// Runs the application until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting module launcher");
        self.log_configuration_summary();

        let registry = self.start().await?;
        info!("✅ Launcher is now running, press Ctrl+C to stop");

        wait_for_shutdown_signal().await?;

        if let Err(e) = Self::shutdown(registry).await {
            error!("❌ Error while unloading modules: {e}");
            return Err(e);
        }
        info!("👋 Launcher stopped");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  - Modules: {}", self.config.modules.directory);
        info!("  - Work directory: {}", self.config.modules.work_directory);
        info!("  - Library cache: {}", self.config.dependencies.cache_directory);
        if self.config.dependencies.offline {
            info!("  - Repositories: offline");
        } else {
            info!("  - Repositories: {}", self.config.dependencies.repositories.join(", "));
        }
        if !self.config.modules.updatable.is_empty() {
            info!(
                "  - Updatable: {} (install: {})",
                self.config.modules.updatable.join(", "),
                self.config.modules.install_updates
            );
        }
    }
}

/// Applies command-line overrides on top of the file configuration.
fn apply_overrides(config: &mut AppConfig, args: CliArgs) {
    if let Some(modules_dir) = args.modules_dir {
        config.modules.directory = modules_dir.to_string_lossy().to_string();
    }

    if let Some(cache_dir) = args.cache_dir {
        config.dependencies.cache_directory = cache_dir.to_string_lossy().to_string();
    }

    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }

    if args.json_logs {
        config.logging.json_format = true;
    }

    if args.offline {
        config.dependencies.offline = true;
    }

    if args.install_updates {
        config.modules.install_updates = true;
    }
}

fn log_failure(failure: ModuleSystemError) -> Result<(), ModuleSystemError> {
    warn!("⚠️ Skipping module: {}", failure);
    Ok(())
}
