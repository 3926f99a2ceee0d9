//! The capture loop: one trigger press, one reading.
//!
//! Each cycle runs weight sampling and image capture concurrently, feeds
//! the frame to the analyzer once it exists, commits whatever survived to
//! the store in one step, and uploads complete readings. The loop itself
//! decides when the kiosk has failed enough to give up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::hardware::{Button, Camera, Scale, StatusLed};
use crate::reading::{CycleOutcome, Reading};
use crate::state::{CycleErrors, StateStore};
use crate::upload::{Backend, UploadReading};
use crate::vision::Analyzer;

use super::image::capture_image;
use super::weight::acquire_weight;

/// Everything one loop instance drives. All trait objects, so the same
/// loop runs on the unit, on a desk, and under test.
pub struct Kiosk {
    pub button: Arc<dyn Button>,
    pub scale: Arc<dyn Scale>,
    pub camera: Arc<dyn Camera>,
    pub red_led: Arc<dyn StatusLed>,
    pub green_led: Arc<dyn StatusLed>,
    /// Absent when analysis is disabled or no API key is available.
    pub analyzer: Option<Arc<dyn Analyzer>>,
    pub backend: Arc<dyn Backend>,
}

/// Why the capture loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Cancellation was requested from outside; clean exit.
    Cancelled,
    /// Too many consecutive failed cycles; the kiosk wants an operator
    /// restart and the process should exit nonzero.
    FailurePolicy,
}

pub async fn capture_loop(
    kiosk: Kiosk,
    store: StateStore,
    config: Arc<Config>,
    cancel_token: CancellationToken,
) -> ShutdownReason {
    let mut consecutive_failures: u32 = 0;

    let reason = loop {
        info!("idle, waiting for the trigger");
        tokio::select! {
            _ = kiosk.button.wait_for_active() => {}
            _ = cancel_token.cancelled() => break ShutdownReason::Cancelled,
        }
        // Wait out the release too, so one long press is one cycle.
        tokio::select! {
            _ = kiosk.button.wait_for_inactive() => {}
            _ = cancel_token.cancelled() => break ShutdownReason::Cancelled,
        }
        debug!("trigger consumed, starting a cycle");

        let cycle = run_cycle(&kiosk, &store, &config);
        tokio::pin!(cycle);
        let outcome = tokio::select! {
            outcome = &mut cycle => Some(outcome),
            _ = cancel_token.cancelled() => {
                let grace = Duration::from_millis(config.capture.shutdown_grace_millis);
                info!("shutdown requested, giving the cycle {}ms to finish", grace.as_millis());
                match timeout(grace, &mut cycle).await {
                    Ok(outcome) => Some(outcome),
                    Err(_) => {
                        warn!("cycle missed the shutdown grace period, abandoning it uncommitted");
                        None
                    }
                }
            }
        };
        let Some(outcome) = outcome else {
            break ShutdownReason::Cancelled;
        };
        store.record_outcome(outcome);

        if cancel_token.is_cancelled() {
            break ShutdownReason::Cancelled;
        }

        match outcome {
            CycleOutcome::Failure => {
                consecutive_failures += 1;
                warn!(
                    "cycle failed, {consecutive_failures}/{} consecutive",
                    config.capture.max_consecutive_failures,
                );
                if consecutive_failures >= config.capture.max_consecutive_failures {
                    error!("consecutive failure limit reached, stopping for an operator restart");
                    break ShutdownReason::FailurePolicy;
                }
            }
            CycleOutcome::Success | CycleOutcome::Partial => {
                consecutive_failures = 0;
                kiosk.green_led.set(true);
                let hold = Duration::from_millis(config.capture.success_hold_millis);
                tokio::select! {
                    _ = tokio::time::sleep(hold) => {}
                    _ = cancel_token.cancelled() => {}
                }
                kiosk.green_led.set(false);
                if cancel_token.is_cancelled() {
                    break ShutdownReason::Cancelled;
                }
            }
        }
    };

    // Single teardown point, so the camera handle is released exactly once
    // no matter which way the loop ended.
    kiosk.green_led.set(false);
    kiosk.red_led.set(false);
    kiosk.camera.release();
    match reason {
        ShutdownReason::Cancelled => info!("capture loop stopped cleanly"),
        ShutdownReason::FailurePolicy => error!("capture loop stopped by the failure policy"),
    }
    reason
}

/// One trigger press end to end: acquire, commit, upload.
async fn run_cycle(kiosk: &Kiosk, store: &StateStore, config: &Config) -> CycleOutcome {
    let captured_at = Utc::now();
    let started = Instant::now();
    kiosk.red_led.set(true);

    // Weight and image run as real tasks, not just joined futures: a panic
    // in one driver is contained to its field instead of taking the whole
    // cycle down with it.
    let weight_task = tokio::spawn({
        let scale = Arc::clone(&kiosk.scale);
        let cfg = config.scale.clone();
        async move { acquire_weight(scale.as_ref(), &cfg).await }
    });
    let image_task = tokio::spawn({
        let camera = Arc::clone(&kiosk.camera);
        let analyzer = kiosk.analyzer.clone();
        let warmup_frames = config.camera.warmup_frames;
        async move {
            let frame = capture_image(camera.as_ref(), warmup_frames).await;
            // Analysis runs strictly on this cycle's frame: no frame, no
            // vision call.
            let analysis = match (&frame, &analyzer) {
                (Ok(frame), Some(analyzer)) => Some(analyzer.analyze(frame).await),
                _ => None,
            };
            (frame, analysis)
        }
    });

    let mut errors = CycleErrors::default();

    let weight = match weight_task.await {
        Ok(Ok(grams)) => {
            info!("weight: {grams:.1} g");
            Some(grams)
        }
        Ok(Err(err)) => {
            warn!("weight acquisition failed: {err}");
            errors.weight = Some(err.to_string());
            None
        }
        Err(err) => {
            error!("weight task panicked: {err}");
            errors.weight = Some(format!("weight task panicked: {err}"));
            None
        }
    };

    let (image, analysis) = match image_task.await {
        Ok((frame, analysis)) => {
            let image = match frame {
                Ok(bytes) => {
                    info!("image: {} bytes", bytes.len());
                    Some(Arc::new(bytes))
                }
                Err(err) => {
                    warn!("image acquisition failed: {err}");
                    errors.camera = Some(err.to_string());
                    None
                }
            };
            let analysis = match analysis {
                Some(Ok(verdicts)) => {
                    info!("analysis: verdicts for {} items", verdicts.len());
                    Some(verdicts)
                }
                Some(Err(err)) => {
                    warn!("analysis failed: {err}");
                    errors.analysis = Some(err.to_string());
                    None
                }
                None => None,
            };
            (image, analysis)
        }
        Err(err) => {
            error!("image task panicked: {err}");
            errors.camera = Some(format!("image task panicked: {err}"));
            (None, None)
        }
    };
    kiosk.red_led.set(false);

    let reading = Reading {
        weight,
        image,
        analysis,
        captured_at,
    };
    let outcome = reading.outcome(kiosk.analyzer.is_some());

    if reading.is_empty() {
        warn!("cycle produced neither weight nor image, nothing to commit");
        debug!("cycle done in {}ms ({outcome:?})", started.elapsed().as_millis());
        return outcome;
    }

    store.commit(&reading, &errors);

    if let (Some(path), Some(image)) = (&config.camera.save_path, &reading.image) {
        let path = path.clone();
        let image = Arc::clone(image);
        tokio::spawn(async move {
            if let Err(err) = tokio::fs::write(&path, image.as_ref()).await {
                warn!("could not save frame to {path}: {err}");
            }
        });
    }

    // Upload wants the full pair; a half reading stays local only.
    if let (Some(weight), Some(image)) = (reading.weight, &reading.image) {
        let payload = UploadReading {
            weight,
            image: Arc::clone(image),
            captured_at,
        };
        match kiosk.backend.upload(&payload).await {
            Ok(()) => info!("reading uploaded"),
            Err(err) => {
                warn!("upload failed, reading stays local: {err}");
                store.record_upload_failure();
            }
        }
    }

    debug!("cycle done in {}ms ({outcome:?})", started.elapsed().as_millis());
    outcome
}
