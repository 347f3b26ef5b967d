//! Logging system setup and configuration.
//!
//! Installs the tracing subscriber with either human-readable or JSON output.

use crate::config::LoggingSettings;
use tracing::{info, Subscriber};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system with the specified configuration.
///
/// `RUST_LOG` takes precedence over the configured level when it is set.
///
/// # Arguments
///
/// * `config` - Logging configuration from the config file
/// * `json_format` - Whether to force JSON output format (CLI override)
///
/// # Returns
///
/// `Ok(())` if logging was set up successfully, or an error if a global
/// subscriber was already installed.
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    // Exactly one of the two layers is present.
    let use_json = json_format || config.json_format;
    let json_layer = use_json.then(|| base_layer().json());
    let human_layer = (!use_json).then(|| base_layer().with_ansi(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(human_layer)
        .try_init()?;

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Formatting shared by the human-readable and JSON output.
fn base_layer<S>() -> fmt::Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(true)
        .with_thread_names(true)
}

/// Displays the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🧩 MODULE LAUNCHER 🧩         ║");
    info!("║                 v{:<24}║", version);
    info!("║                                          ║");
    info!("║  📦 Packaged Modules                     ║");
    info!("║  🔗 Transitive Library Resolution        ║");
    info!("║  🔄 Hot Reload                           ║");
    info!("║                                          ║");
    info!("║  module_system v{:<25}║", module_system::MODULE_SYSTEM_VERSION);
    info!("╚══════════════════════════════════════════╝");
}
