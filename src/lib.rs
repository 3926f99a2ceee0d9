//! Unattended kiosk controller: each trigger press weighs and photographs
//! the order, optionally has a vision service check its contents, and
//! uploads the result, while a local dashboard serves the latest reading.

pub mod capture;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod hardware;
pub mod reading;
pub mod state;
pub mod upload;
pub mod vision;

use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureController, Kiosk, ShutdownReason};
use crate::config::{Config, Mode};
use crate::hardware::sim::{LogLed, SimCamera, SimScale, StdinButton};
use crate::state::StateStore;
use crate::upload::BackendClient;
use crate::vision::{Analyzer, OpenAiVision};

/// What the desk simulator pretends sits on the platform.
const SIM_TARGET_GRAMS: f64 = 247.0;
const SIM_JITTER_GRAMS: f64 = 2.5;

/// Wires the store, dashboard, devices and capture loop together and runs
/// until a termination signal or the failure policy ends it.
pub async fn run(config: Config, mode: Mode) -> Result<ShutdownReason> {
    let config = Arc::new(config);
    let store = StateStore::new();
    let cancel_token = CancellationToken::new();

    // Bind before the loop starts; a taken port is a setup failure, not
    // something to discover mid-operation.
    let listener = dashboard::bind(&config.dashboard.listen_addr).await?;
    tokio::spawn({
        let store = store.clone();
        let token = cancel_token.clone();
        async move {
            if let Err(err) = dashboard::serve(listener, store, token).await {
                warn!("dashboard server stopped with an error: {err}");
            }
        }
    });

    let backend = BackendClient::new(
        config.backend_url(mode).to_string(),
        config.device.serial.clone(),
        config.upload.key.clone(),
        config.upload.timeout_secs,
    )?;

    let kiosk = Kiosk {
        button: Arc::new(StdinButton::new()),
        scale: Arc::new(SimScale::targeting_grams(
            &config.scale,
            SIM_TARGET_GRAMS,
            SIM_JITTER_GRAMS,
        )),
        camera: Arc::new(SimCamera::new()),
        red_led: Arc::new(LogLed::new("red")),
        green_led: Arc::new(LogLed::new("green")),
        analyzer: build_analyzer(&config),
        backend: Arc::new(backend),
    };
    info!(
        "devices ready in {} mode, uploads go to {}",
        mode.as_str(),
        config.backend_url(mode),
    );

    let mut controller = CaptureController::new();
    controller.start(kiosk, store, Arc::clone(&config), cancel_token.clone())?;

    // Ctrl-c flips the same token the loop and the dashboard listen on.
    tokio::spawn({
        let token = cancel_token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("termination signal received");
                    token.cancel();
                }
                Err(err) => warn!("cannot listen for the termination signal: {err}"),
            }
        }
    });

    let reason = controller.wait().await?;
    // The loop is gone either way; take the dashboard down with it.
    cancel_token.cancel();
    Ok(reason)
}

/// Analysis is strictly best-effort: a missing key or a client that will
/// not build downgrades the kiosk to weigh-and-photograph, never stops it.
fn build_analyzer(config: &Config) -> Option<Arc<dyn Analyzer>> {
    if !config.analysis.enabled {
        return None;
    }
    let Some(api_key) = config.analysis.api_key.clone() else {
        warn!("analysis enabled but no API key available, running without it");
        return None;
    };
    match OpenAiVision::new(&config.analysis, api_key) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            warn!("cannot build the vision client, running without analysis: {err}");
            None
        }
    }
}
