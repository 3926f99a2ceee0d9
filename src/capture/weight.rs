//! Weight acquisition: median-of-N sampling over the scale driver.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::config::ScaleConfig;
use crate::error::SensorError;
use crate::hardware::Scale;

/// Samples the scale `cfg.samples` times, keeps the median of whatever
/// succeeded, and calibrates it to grams. The median makes one hand-bump
/// or spike harmless; a majority of samples must survive for the result
/// to count at all.
pub async fn acquire_weight(scale: &dyn Scale, cfg: &ScaleConfig) -> Result<f64, SensorError> {
    let started = Instant::now();
    let period = Duration::from_millis(cfg.sample_period_millis);
    let mut readings = Vec::with_capacity(cfg.samples);

    for n in 0..cfg.samples {
        match scale.read_raw().await {
            Ok(raw) => readings.push(raw),
            Err(err) => warn!("scale sample {}/{} failed: {err}", n + 1, cfg.samples),
        }
        if n + 1 < cfg.samples {
            tokio::time::sleep(period).await;
        }
    }

    if readings.len() * 2 <= cfg.samples {
        return Err(SensorError::TooFewSamples {
            got: readings.len(),
            want: cfg.samples,
        });
    }

    readings.sort_unstable_by(f64::total_cmp);
    let median = readings[readings.len() / 2];
    let grams = (median - cfg.offset) * cfg.gain;
    debug!(
        "weight settled on {grams:.1} g from {}/{} samples in {}ms",
        readings.len(),
        cfg.samples,
        started.elapsed().as_millis(),
    );
    Ok(grams)
}
