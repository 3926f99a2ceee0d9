//! Simulated devices for running the kiosk on a desk.
//!
//! The scale jitters around a target weight, the camera renders a moving
//! gradient and encodes it as JPEG, and the button fires on Enter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use log::{debug, warn};
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::config::ScaleConfig;
use crate::error::{CameraError, SensorError};
use crate::hardware::{Button, Camera, Scale, StatusLed};

const SIM_FRAME_WIDTH: u32 = 320;
const SIM_FRAME_HEIGHT: u32 = 240;
const JPEG_QUALITY: u8 = 80;

/// Emits raw readings that calibrate to roughly `grams` under the given
/// scale config, so the rest of the pipeline sees plausible numbers.
pub struct SimScale {
    raw_center: f64,
    raw_jitter: f64,
}

impl SimScale {
    pub fn targeting_grams(cfg: &ScaleConfig, grams: f64, jitter_grams: f64) -> SimScale {
        SimScale {
            raw_center: grams / cfg.gain + cfg.offset,
            raw_jitter: jitter_grams / cfg.gain,
        }
    }
}

#[async_trait]
impl Scale for SimScale {
    async fn read_raw(&self) -> Result<f64, SensorError> {
        let noise = {
            let mut rng = rand::thread_rng();
            rng.gen_range(-1.0..=1.0) * self.raw_jitter
        };
        Ok(self.raw_center + noise)
    }
}

/// Renders a gradient frame that drifts with a frame counter, so warmup
/// frames and keeper frames are visibly distinct images.
pub struct SimCamera {
    frames: AtomicU64,
    released: AtomicBool,
}

impl SimCamera {
    pub fn new() -> SimCamera {
        SimCamera {
            frames: AtomicU64::new(0),
            released: AtomicBool::new(false),
        }
    }

    fn render(frame: u64) -> Result<Vec<u8>, CameraError> {
        let shift = (frame % 256) as u8;
        let mut rgb = RgbImage::new(SIM_FRAME_WIDTH, SIM_FRAME_HEIGHT);
        for (x, y, pixel) in rgb.enumerate_pixels_mut() {
            *pixel = Rgb([
                (x % 256) as u8,
                (y % 256) as u8,
                shift.wrapping_add((x / 2 % 256) as u8),
            ]);
        }
        let mut encoded = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
        rgb.write_with_encoder(encoder)
            .map_err(|err| CameraError::GrabFailed(format!("jpeg encode: {err}")))?;
        Ok(encoded)
    }
}

impl Default for SimCamera {
    fn default() -> Self {
        SimCamera::new()
    }
}

#[async_trait]
impl Camera for SimCamera {
    async fn grab_frame(&self) -> Result<Vec<u8>, CameraError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(CameraError::GrabFailed("camera released".into()));
        }
        let frame = self.frames.fetch_add(1, Ordering::SeqCst);
        // Real capture backends block, so the encoder runs off the async
        // threads the same way a driver would.
        match tokio::task::spawn_blocking(move || SimCamera::render(frame)).await {
            Ok(result) => result,
            Err(err) => Err(CameraError::GrabFailed(format!("encoder worker: {err}"))),
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!("sim camera released after {} frames", self.frames.load(Ordering::SeqCst));
        }
    }
}

/// Treats one line on stdin as one button press.
pub struct StdinButton {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinButton {
    pub fn new() -> StdinButton {
        StdinButton {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for StdinButton {
    fn default() -> Self {
        StdinButton::new()
    }
}

#[async_trait]
impl Button for StdinButton {
    async fn wait_for_active(&self) {
        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                // stdin closed: no more presses will ever arrive, idle until
                // the loop is cancelled from outside.
                drop(lines);
                std::future::pending::<()>().await;
            }
            Err(err) => {
                warn!("stdin button read failed: {err}");
                drop(lines);
                std::future::pending::<()>().await;
            }
        }
    }

    async fn wait_for_inactive(&self) {
        // A line is a momentary press; it is already inactive.
    }
}

/// Logs state changes instead of driving a GPIO pin.
pub struct LogLed {
    name: &'static str,
}

impl LogLed {
    pub fn new(name: &'static str) -> LogLed {
        LogLed { name }
    }
}

impl StatusLed for LogLed {
    fn set(&self, on: bool) {
        debug!("led {}: {}", self.name, if on { "on" } else { "off" });
    }
}
