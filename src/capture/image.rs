//! Image acquisition: discard warmup frames, keep exactly one.

use log::{debug, warn};
use tokio::time::Instant;

use crate::error::CameraError;
use crate::hardware::Camera;

/// Grabs and discards `warmup_frames` frames so auto-exposure settles and
/// any stale buffered frame is flushed, then returns the next frame. A
/// failed warmup grab is logged and skipped; only the keeper frame decides
/// success.
pub async fn capture_image(camera: &dyn Camera, warmup_frames: u32) -> Result<Vec<u8>, CameraError> {
    let started = Instant::now();

    for n in 0..warmup_frames {
        if let Err(err) = camera.grab_frame().await {
            warn!("warmup frame {}/{warmup_frames} failed: {err}", n + 1);
        }
    }

    let frame = camera.grab_frame().await?;
    if frame.is_empty() {
        return Err(CameraError::EmptyFrame);
    }
    debug!(
        "captured {} byte frame after {warmup_frames} warmup frames in {}ms",
        frame.len(),
        started.elapsed().as_millis(),
    );
    Ok(frame)
}
