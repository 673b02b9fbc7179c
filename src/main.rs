//! selection-hotkeyd: global hotkey daemon for text selections
//!
//! This daemon runs as a LaunchAgent and provides:
//! - Global hotkey detection via CGEventTap
//! - Selection capture from the focused application
//! - Custom action hotkeys (⌘1..⌘5) while enabled
//!
//! Captured selections are logged; a host embedding the library registers
//! its own consumers instead.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "selection-hotkeyd starting"
    );

    run().await
}

#[cfg(target_os = "macos")]
async fn run() -> Result<()> {
    use selection_hotkeyd::lifecycle::ShutdownSignal;
    use selection_hotkeyd::platform::macos;
    use selection_hotkeyd::{Config, HotkeyService};
    use tracing::warn;

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.settings_path, "configuration loaded");

    if !macos::is_trusted() {
        warn!("accessibility permission not granted - hotkeys will retry until it is");
    }

    let shutdown = ShutdownSignal::new();
    let (service, ui_loop) = HotkeyService::new(config, macos::platform());

    service.on_popup_hotkey(|payload| {
        info!(
            chars = payload.plain.chars().count(),
            html = payload.html.is_some(),
            rtf = payload.rtf.is_some(),
            text = %payload.plain,
            "selection captured"
        );
    });
    service.on_custom_action_hotkey(|index| {
        info!(index, "custom action hotkey");
    });

    service.start();
    info!(
        shortcut = %service.popup_shortcut(),
        mode = %service.press_mode(),
        state = %service.interceptor_state(),
        "daemon initialized, entering main loop"
    );

    // Consumers run here, on the main task
    tokio::select! {
        _ = ui_loop.run() => {
            info!("UI loop exited");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");
    service.stop();
    drop(service);

    info!("selection-hotkeyd stopped");
    Ok(())
}

#[cfg(not(target_os = "macos"))]
async fn run() -> Result<()> {
    anyhow::bail!("selection-hotkeyd supports macOS only")
}
