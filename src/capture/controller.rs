//! Owns the capture loop task: spawned on start, cancelled and joined on
//! stop.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::state::StateStore;

use super::loop_worker::{capture_loop, Kiosk, ShutdownReason};

#[derive(Default)]
pub struct CaptureController {
    handle: Option<JoinHandle<ShutdownReason>>,
    cancel_token: Option<CancellationToken>,
}

impl CaptureController {
    pub fn new() -> CaptureController {
        CaptureController::default()
    }

    pub fn start(
        &mut self,
        kiosk: Kiosk,
        store: StateStore,
        config: Arc<Config>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("capture loop already running");
        }
        info!("starting capture loop for device '{}'", config.device.serial);
        self.cancel_token = Some(cancel_token.clone());
        self.handle = Some(tokio::spawn(capture_loop(kiosk, store, config, cancel_token)));
        Ok(())
    }

    /// Waits for the loop to end on its own, either cancelled from outside
    /// or stopped by the failure policy.
    pub async fn wait(&mut self) -> Result<ShutdownReason> {
        let handle = self.handle.take().context("capture loop not running")?;
        handle.await.context("capture loop task failed")
    }

    /// Cancels the loop and waits for its teardown to finish.
    pub async fn stop(&mut self) -> Result<ShutdownReason> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.wait().await
    }
}
