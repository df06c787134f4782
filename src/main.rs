//! # Alphonse UI Runtime - Headless Entry Point
//!
//! Runs the island runtime against a live backend without a browser: the
//! presence panel streams over SSE (or polls), renders go to the log and the
//! process exits cleanly on SIGINT/SIGTERM.
//!
//! ## Startup Sequence:
//! 1. Load `.env`, set up tracing
//! 2. Load and validate configuration
//! 3. Wire the HTTP adapters to the runtime's event channel
//! 4. Announce the page load and run until shutdown

use alphonse_ui_runtime::http::{ConsoleHost, HttpUploader, SsePushSource};
use alphonse_ui_runtime::runtime::channel;
use alphonse_ui_runtime::voice::NoCapture;
use alphonse_ui_runtime::{
    MountController, Ports, Runtime, RuntimeConfig, RuntimeEvent, RuntimeHandle,
};
use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = RuntimeConfig::load()?;
    config.validate()?;

    info!("Starting alphonse-ui-runtime v{}", env!("CARGO_PKG_VERSION"));
    info!(base_url = %config.server.base_url, "Configuration loaded");

    let (handle, events) = channel();
    let client = reqwest::Client::new();
    let base_url = config.server.base_url.clone();

    let selectors = config
        .island_specs()
        .into_iter()
        .map(|spec| spec.selector);
    let host = ConsoleHost::new(
        client.clone(),
        base_url.clone(),
        config.regions.swap_container.clone(),
        selectors,
    )
    .with_region(
        config.voice.timeline_region.clone(),
        config.regions.timeline_path.clone(),
    );

    let controller = MountController::new(
        &config,
        Ports {
            host: Box::new(host),
            source: Box::new(SsePushSource::new(client.clone(), base_url.clone(), handle.clone())),
            // No microphone without a browser.
            devices: Box::new(NoCapture),
            uploader: Box::new(HttpUploader::new(client, base_url, handle.clone())),
        },
    );
    let runtime = Runtime::new(controller, events);

    setup_signal_handlers(handle.clone());
    handle.send(RuntimeEvent::PageLoaded);
    drop(handle);

    let stats = runtime.run().await;
    let summary = serde_json::to_string(&stats)?;
    info!(
        stats = %summary,
        upload_failure_rate = stats.upload_failure_rate(),
        "Runtime stopped"
    );
    Ok(())
}

/// Initialize the tracing (logging) system.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "alphonse_ui_runtime=info")
/// - If not set, defaults to "alphonse_ui_runtime=debug"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alphonse_ui_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Turn SIGTERM/SIGINT into a page unload.
fn setup_signal_handlers(handle: RuntimeHandle) {
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT");
            }
        }

        handle.send(RuntimeEvent::Unload);
    });
}
