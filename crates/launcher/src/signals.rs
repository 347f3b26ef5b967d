//! Signal handling for graceful shutdown.

use tokio::signal;
use tracing::info;

/// Waits until the process is asked to terminate.
///
/// Listens for SIGINT and SIGTERM on Unix and Ctrl+C on Windows.
///
/// # Returns
///
/// `Ok(())` when a shutdown signal is received, or an error if the signal
/// handlers could not be installed.
pub async fn wait_for_shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    info!("📡 Received shutdown signal - unloading modules");
    Ok(())
}
