//! # Module Launcher
//!
//! Host process for packaged modules. It loads every module package found in
//! the configured directory, resolves the external libraries they declare,
//! and unloads everything again on shutdown.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! launcher
//!
//! # Specify custom configuration
//! launcher --config production.toml
//!
//! # Override specific settings
//! launcher --modules /opt/modules --cache /var/cache/libs --log-level debug
//!
//! # Resolve libraries from the local cache only
//! launcher --offline
//! ```
//!
//! ## Configuration
//!
//! The launcher loads configuration from a TOML file (default:
//! `launcher.toml`). If the file doesn't exist, a default configuration will
//! be created.
//!
//! ## Signal Handling
//!
//! Modules are unloaded on SIGINT (Ctrl+C) and SIGTERM (Unix systems).

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Entry point of the launcher binary.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging settings are needed before the application is built.
    let config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    let mut logging_settings = config.logging;
    if let Some(level) = &args.log_level {
        logging_settings.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging_settings, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use app::Application as LauncherApplication;
pub use cli::CliArgs as LauncherArgs;
pub use config::{AppConfig as LauncherConfig, DependencySettings, LoggingSettings, ModuleSettings};
