//! obs-mask-hotkeys: toggle OBS mask sources from global hotkeys
//!
//! On startup the daemon:
//! - Loads the mask list from a YAML config file
//! - Connects to the OBS WebSocket server
//! - Finds the scene holding each mask's source and reads its visibility
//! - Registers one global hotkey per mask
//!
//! Each hotkey press flips its mask's scene item in OBS.

mod config;
mod hotkey;
mod lifecycle;
mod mask;
mod obs;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::hotkey::{Binding, HotkeyListener};
use crate::lifecycle::ShutdownSignal;
use crate::mask::{Controller, Resolver};
use crate::obs::ObsClient;

#[derive(Parser, Debug)]
#[command(name = "obs-mask-hotkeys", version, about)]
struct Args {
    /// Path to the configuration file (defaults to conf.yaml)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: Option<PathBuf>,

    /// Only trust a configured scene if it actually contains the source
    #[arg(long)]
    verify_scene_hints: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "obs-mask-hotkeys starting");

    // Load configuration
    let config_path = args.file.unwrap_or_else(|| {
        info!(path = DEFAULT_CONFIG_PATH, "no -f specified, using default config");
        PathBuf::from(DEFAULT_CONFIG_PATH)
    });
    let config = Config::load(&config_path)?;
    info!(path = %config_path.display(), masks = config.masks.len(), "configuration loaded");

    // Connect to OBS
    let url = config.obs.websocket_url()?;
    let client = ObsClient::connect(&url, config.obs.password.as_deref())
        .await
        .with_context(|| format!("failed to connect to OBS at {url}"))?;

    let resolver = Resolver::new(config.verify_scene_hints || args.verify_scene_hints);
    let controller = Controller::new(client, resolver);

    // Sync initial visibility from OBS, one mask at a time
    controller.log_scenes().await;
    let masks = config.active_masks();
    controller.sync_masks(&masks).await;

    // Register hotkeys
    let mut listener = HotkeyListener::new().context("hotkeys unavailable")?;
    let synced = controller.mask_names().await;

    for mask in masks.iter().filter(|m| synced.contains(&m.name)) {
        let binding = match Binding::from_config(mask) {
            Ok(binding) => binding,
            Err(e) => {
                warn!(mask = %mask.name, error = %e, "invalid hotkey, skipping");
                continue;
            }
        };

        let mut presses = match listener.register(&binding) {
            Ok(rx) => rx,
            Err(e) => {
                warn!(mask = %mask.name, error = %e, "failed to register hotkey, skipping");
                continue;
            }
        };

        let controller = controller.clone();
        let name = mask.name.clone();
        tokio::spawn(async move {
            while presses.recv().await.is_some() {
                info!(mask = %name, "hotkey triggered");
                let outcome = controller.toggle(&name).await;
                debug!(mask = %name, ?outcome, "toggle finished");
            }
        });

        info!(hotkey = %binding, mask = %mask.name, "registered hotkey");
    }

    if listener.is_empty() {
        warn!("no hotkeys registered, nothing to do until shutdown");
    }

    match listener.start() {
        Ok(()) => info!(bindings = listener.len(), "hotkey listeners started, press Ctrl+C to exit"),
        Err(e) => error!(error = %e, "failed to start hotkey listener"),
    }

    ShutdownSignal::new().wait().await;

    info!("shutting down...");
    listener.stop();
    info!("obs-mask-hotkeys stopped");

    Ok(())
}
