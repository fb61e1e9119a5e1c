// speakersheet - component fragment server
//
// Serves the markup/styles/script files that widgets fetch at render time,
// and the JSON collections behind remote-search comboboxes.

use anyhow::{Context, Result};
use speakersheet::{cli, config::Config, logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI commands first (config --show, --reset, --path)
    if cli::handle_cli() {
        return Ok(());
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let config = Config::from_env().context("Failed to load configuration")?;

    // Keep the guard alive so file logs flush on exit
    let _file_guard = logging::init(&config.logging)?;

    tracing::info!(
        version = speakersheet::config::VERSION,
        origin = %config.origin,
        "Starting speakersheet"
    );

    // Oneshot: signalled once on Ctrl+C
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server_config = config.clone();
    let mut server_handle =
        tokio::spawn(async move { server::start_server(&server_config, shutdown_rx).await });

    tokio::select! {
        result = &mut server_handle => {
            // Server exited on its own, most likely a bind failure
            return result.context("Server task panicked")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
        }
    }

    tracing::info!("Shutting down...");

    // If the send fails, the server has already stopped
    let _ = shutdown_tx.send(());
    server_handle.await.context("Server task panicked")??;

    tracing::info!("Shutdown complete");
    Ok(())
}
